pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::commands::plan::PlanArgs;

#[derive(Debug, Parser)]
#[command(
    name = "shopbrain",
    about = "Shopbrain operator CLI",
    long_about = "Inspect configuration, check downstream readiness, and dry-run query routing.",
    after_help = "Examples:\n  shopbrain doctor --json\n  shopbrain config\n  \
                  shopbrain plan \"black jeans I searched for in the last 10 mins\" --user-id 42"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and check language model and backend reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Route a query through the configured model and print the validated plan")]
    Plan {
        #[arg(help = "Natural-language shopping query")]
        query: String,
        #[arg(long, help = "User id placed in the user context")]
        user_id: Option<String>,
        #[arg(long, help = "Additional user context as a JSON object")]
        context: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Plan { query, user_id, context } => {
            commands::plan::run(&PlanArgs { query, user_id, context })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
