use std::time::Duration;

use serde::Serialize;
use shopbrain_core::config::{AppConfig, LlmProvider, LoadOptions};

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const LLM_CHECK: &str = "llm_reachability";
const BACKEND_CHECK: &str = "backend_reachability";

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 5 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(check_reachability(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in [LLM_CHECK, BACKEND_CHECK] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_reachability(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return [LLM_CHECK, BACKEND_CHECK]
                .into_iter()
                .map(|name| DoctorCheck {
                    name,
                    status: CheckStatus::Fail,
                    details: format!("failed to initialize async runtime: {error}"),
                })
                .collect();
        }
    };

    runtime.block_on(async {
        let llm = probe(LLM_CHECK, &llm_probe_url(config), config.llm.timeout_secs).await;
        let backend =
            probe(BACKEND_CHECK, &config.backend.base_url, config.backend.timeout_secs).await;
        vec![llm, backend]
    })
}

fn llm_probe_url(config: &AppConfig) -> String {
    let base_url = config.llm.base_url.trim_end_matches('/');
    match config.llm.provider {
        LlmProvider::Ollama => format!("{base_url}/api/tags"),
        LlmProvider::OpenAi => format!("{base_url}/v1/models"),
    }
}

/// Any HTTP answer counts as reachable; only transport failures fail the check.
async fn probe(name: &'static str, url: &str, timeout_secs: u64) -> DoctorCheck {
    let client =
        match reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs)).build() {
            Ok(client) => client,
            Err(error) => {
                return DoctorCheck {
                    name,
                    status: CheckStatus::Fail,
                    details: format!("failed to build http client: {error}"),
                };
            }
        };

    match client.get(url).send().await {
        Ok(response) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("`{url}` answered HTTP {}", response.status().as_u16()),
        },
        Err(error) => DoctorCheck {
            name,
            status: CheckStatus::Fail,
            details: format!("`{url}` unreachable: {error}"),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
