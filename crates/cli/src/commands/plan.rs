use serde_json::{json, Value};
use shopbrain_agent::{build_llm_client, IntentClassifier, LlmRouter};
use shopbrain_core::config::{AppConfig, LoadOptions};
use shopbrain_core::{build_user_event_query, PlanIntent, UserContext};

use crate::commands::CommandResult;

const COMMAND: &str = "plan";

#[derive(Debug, Clone, Default)]
pub struct PlanArgs {
    pub query: String,
    pub user_id: Option<String>,
    /// JSON object merged into the user context before `user_id` is applied.
    pub context: Option<String>,
}

pub fn run(args: &PlanArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2);
        }
    };

    let user_context = match build_user_context(args) {
        Ok(user_context) => user_context,
        Err(message) => return CommandResult::failure(COMMAND, "invalid_input", message, 3),
    };

    let client = match build_llm_client(&config.llm) {
        Ok(client) => client,
        Err(error) => return CommandResult::failure(COMMAND, "llm_client", error.to_string(), 4),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                4,
            );
        }
    };

    let router = LlmRouter::new(client);
    runtime.block_on(plan_with(&router, &args.query, &user_context))
}

/// Classifies `query` and reports the plan. Unlike the server, a classification failure is
/// reported as an error instead of falling back, since the point is to inspect the router.
pub async fn plan_with(
    classifier: &dyn IntentClassifier,
    query: &str,
    user_context: &UserContext,
) -> CommandResult {
    let query = query.trim();
    if query.is_empty() {
        return CommandResult::failure(COMMAND, "invalid_input", "query must not be empty", 3);
    }

    let plan = match classifier.classify(query, user_context).await {
        Ok(plan) => plan,
        Err(error) => return CommandResult::failure(COMMAND, error.kind(), error.to_string(), 4),
    };

    let structured_query = match plan.intent() {
        PlanIntent::UserBehavior(intent) => {
            serde_json::to_value(build_user_event_query(intent, user_context)).ok()
        }
        PlanIntent::Orders(_) | PlanIntent::GenericSearch(_) => None,
    };

    let data = json!({
        "plan": plan.to_value(),
        "structured_query": structured_query,
    });
    CommandResult::success_with_data(COMMAND, format!("routed to {}", plan.route()), Some(data))
}

pub fn build_user_context(args: &PlanArgs) -> Result<UserContext, String> {
    let mut user_context = match args.context.as_deref().map(str::trim) {
        None | Some("") => UserContext::new(),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err("--context must be a JSON object".to_string()),
            Err(error) => return Err(format!("--context is not valid JSON: {error}")),
        },
    };

    if let Some(user_id) = args.user_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        user_context.insert("user_id".to_string(), Value::String(user_id.to_string()));
    }

    Ok(user_context)
}
