//! Text-to-API boundary with the Body.
//!
//! The Brain never builds SQL. It posts a [`StructuredQuery`] to the Body's internal analytics
//! endpoint and gets rows back.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use shopbrain_core::config::BackendConfig;
use shopbrain_core::{ApplicationError, StructuredQuery, UserContext};
use thiserror::Error;
use tracing::{debug, error, warn};

/// The one failure kind for calls into the Body. The message distinguishes transport failures from
/// error statuses; the underlying cause is logged where it happens and never carried outward.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ServiceError {
    message: String,
}

impl ServiceError {
    pub fn unavailable() -> Self {
        Self { message: "Analytics service unavailable".to_string() }
    }

    pub fn status(status: u16) -> Self {
        Self { message: format!("Analytics service error (status {status})") }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ServiceError> for ApplicationError {
    fn from(value: ServiceError) -> Self {
        ApplicationError::Upstream(value.message)
    }
}

#[async_trait]
pub trait AnalyticsBackend: Send + Sync {
    async fn run_query(
        &self,
        query: &StructuredQuery,
        user_context: &UserContext,
    ) -> Result<Vec<Value>, ServiceError>;
}

#[derive(Serialize)]
struct AnalyticsPayload<'a> {
    query: &'a StructuredQuery,
    user_context: &'a UserContext,
}

pub struct HttpAnalyticsClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpAnalyticsClient {
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let http =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self { http, endpoint: config.analytics_query_url() })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalyticsBackend for HttpAnalyticsClient {
    async fn run_query(
        &self,
        query: &StructuredQuery,
        user_context: &UserContext,
    ) -> Result<Vec<Value>, ServiceError> {
        let payload = AnalyticsPayload { query, user_context };

        let response =
            self.http.post(&self.endpoint).json(&payload).send().await.map_err(|source| {
                error!(
                    event_name = "agent.analytics.request_failed",
                    endpoint = %self.endpoint,
                    timeout = source.is_timeout(),
                    error = %source,
                    "error calling analytics service"
                );
                ServiceError::unavailable()
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(
                event_name = "agent.analytics.error_status",
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "analytics service returned an error status"
            );
            return Err(ServiceError::status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|source| {
            error!(
                event_name = "agent.analytics.body_failed",
                endpoint = %self.endpoint,
                error = %source,
                "analytics response body could not be read"
            );
            ServiceError::unavailable()
        })?;

        let items = match serde_json::from_slice::<Value>(&body) {
            Ok(value) => normalize_response(value),
            Err(source) => {
                warn!(
                    event_name = "agent.analytics.unexpected_shape",
                    error = %source,
                    "analytics response is not JSON"
                );
                Vec::new()
            }
        };
        debug!(event_name = "agent.analytics.items", item_count = items.len(), "fetched events");
        Ok(items)
    }
}

/// `{"events": [...]}` yields the events, a bare array yields itself, anything else is logged and
/// read as no results.
pub fn normalize_response(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("events") {
            Some(Value::Array(events)) => events,
            Some(other) => {
                warn!(
                    event_name = "agent.analytics.unexpected_shape",
                    events_type = json_type(&other),
                    "analytics `events` field is not a list"
                );
                Vec::new()
            }
            None => {
                warn!(
                    event_name = "agent.analytics.unexpected_shape",
                    keys = ?map.keys().collect::<Vec<_>>(),
                    "analytics response has no `events` field"
                );
                Vec::new()
            }
        },
        other => {
            warn!(
                event_name = "agent.analytics.unexpected_shape",
                body_type = json_type(&other),
                "unexpected analytics response shape"
            );
            Vec::new()
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
