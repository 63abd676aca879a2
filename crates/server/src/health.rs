use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use shopbrain_core::config::AppConfig;

#[derive(Clone)]
pub struct HealthState {
    llm_detail: String,
    backend_detail: String,
}

impl HealthState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            llm_detail: format!(
                "{} model `{}` at {}",
                config.llm.provider.as_str(),
                config.llm.model,
                config.llm.base_url
            ),
            backend_detail: format!("analytics endpoint {}", config.backend.analytics_query_url()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub llm: HealthCheck,
    pub backend: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Readiness only: the process is up and its clients are configured. Downstream reachability is
/// the job of `shopbrain doctor`.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "shopbrain-server runtime initialized".to_string(),
        },
        llm: HealthCheck { status: "configured", detail: state.llm_detail },
        backend: HealthCheck { status: "configured", detail: state.backend_detail },
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
