//! Query classification.
//!
//! The routing policy lives entirely in [`ROUTER_SYSTEM_PROMPT`]; code only assembles the prompt
//! and validates what comes back. Model output is never trusted: it must contain a JSON object,
//! deserialize into the wire plan, and pass the one-of validation in
//! [`shopbrain_core::SearchPlan`].

use std::sync::Arc;

use async_trait::async_trait;
use shopbrain_core::{PlanShapeError, RawSearchPlan, SearchPlan, UserContext};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm::{LlmClient, LlmError, LlmRequest};

const MAX_LLM_OUTPUT_LOG_CHARS: usize = 4_000;

pub const ROUTER_SYSTEM_PROMPT: &str = r#"You are the Search Router for an e-commerce AI brain.
Your job is to interpret the user's natural language query and decide which specialist should handle it: generic product search, user behavior (event logs), or orders (purchases and usual items).

You MUST return a single JSON object with this shape:
{
  "route": "generic_search" | "user_behavior" | "orders",
  "generic": null | {"route": "generic_search", "normalized_query": string},
  "user_behavior": null | {
    "route": "user_behavior",
    "action": "view" | "search" | "add_to_cart" | "purchase" | "unknown",
    "product_category": null | string,
    "attributes": {string: string},
    "time_window": null | string
  },
  "orders": null | {
    "route": "orders",
    "purpose": "view_history" | "reorder_usual" | "add_usual_to_cart" | "unknown",
    "product_category": null | string
  },
  "rationale": string
}
Exactly one of "generic", "user_behavior" or "orders" must be non-null, and it must be the one named by "route".

Routing guidance:
- If the query refers to 'I', 'my', 'last X minutes/hours/days', or behavior such as 'I viewed', 'I searched', 'things I looked at', choose route='user_behavior'.
- If the query is about order history, cart, or usual orders, choose route='orders'.
- Otherwise, choose route='generic_search' and put a clear, concise rewrite of the query in normalized_query.

When route='user_behavior':
- action should be one of 'view', 'search', 'add_to_cart', 'purchase', or 'unknown'.
- product_category should be a concise category like 'jeans', 'noodles', etc.
- attributes can include filters like {"color": "black", "size": "32"}.
- time_window should be shorthand like '10m', '1h', '24h', '7d'.

Example:
Query: 'show me all the black jeans I searched for in the last 10 mins'
{"route": "user_behavior", "generic": null, "user_behavior": {"route": "user_behavior", "action": "search", "product_category": "jeans", "attributes": {"color": "black"}, "time_window": "10m"}, "orders": null, "rationale": "first-person search history within a relative time window"}"#;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("router output did not contain a JSON object")]
    MissingJson,
    #[error("router output is not a valid search plan: {0}")]
    Malformed(String),
    #[error(transparent)]
    Shape(#[from] PlanShapeError),
}

impl ClassificationError {
    /// Stable label for logs and fallback rationales.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Llm(LlmError::Timeout) => "llm_timeout",
            Self::Llm(_) => "llm_unavailable",
            Self::MissingJson => "missing_json",
            Self::Malformed(_) => "malformed_plan",
            Self::Shape(_) => "inconsistent_plan",
        }
    }
}

/// Turns a query into a routing decision. Implementations may be non-deterministic; callers only
/// rely on getting either a validated plan or an error.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        query: &str,
        user_context: &UserContext,
    ) -> Result<SearchPlan, ClassificationError>;
}

pub struct LlmRouter<C: LlmClient = Arc<dyn LlmClient>> {
    client: C,
}

impl<C: LlmClient> LlmRouter<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn build_prompt(&self, query: &str, user_context: &UserContext) -> LlmRequest {
        let context_json = serde_json::to_string(user_context).unwrap_or_else(|_| "{}".to_string());
        LlmRequest {
            system: ROUTER_SYSTEM_PROMPT.to_string(),
            user: format!(
                "User query: {query}\nUser context (JSON): {context_json}\n\n\
                 Return ONLY the JSON for the search plan, no extra commentary."
            ),
        }
    }
}

#[async_trait]
impl<C: LlmClient> IntentClassifier for LlmRouter<C> {
    async fn classify(
        &self,
        query: &str,
        user_context: &UserContext,
    ) -> Result<SearchPlan, ClassificationError> {
        let request = self.build_prompt(query, user_context);
        info!(
            event_name = "agent.router.request",
            model = %self.client.model(),
            query_len = query.len(),
            context_keys = user_context.len(),
            "router request prepared"
        );

        let output = self.client.complete(request).await?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                event_name = "agent.router.raw_output",
                llm_output = %truncate_for_log(&output, MAX_LLM_OUTPUT_LOG_CHARS),
                "router raw llm output"
            );
        }

        let plan = parse_plan(&output).map_err(|error| {
            warn!(
                event_name = "agent.router.unusable_output",
                error_kind = error.kind(),
                llm_output = %truncate_for_log(&output, MAX_LLM_OUTPUT_LOG_CHARS),
                "router output rejected"
            );
            error
        })?;
        info!(
            event_name = "agent.router.plan",
            route = %plan.route(),
            rationale = %truncate_for_log(plan.rationale(), 200),
            "router produced plan"
        );
        Ok(plan)
    }
}

/// Extracts the outermost JSON object from model output and validates it as a plan.
pub fn parse_plan(output: &str) -> Result<SearchPlan, ClassificationError> {
    let json = extract_json(output).ok_or(ClassificationError::MissingJson)?;
    let raw = serde_json::from_str::<RawSearchPlan>(json)
        .map_err(|error| ClassificationError::Malformed(error.to_string()))?;
    Ok(SearchPlan::try_from(raw)?)
}

fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={char_count}]"));
    preview
}
