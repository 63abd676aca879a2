use std::process::ExitCode;

fn main() -> ExitCode {
    shopbrain_cli::run()
}
