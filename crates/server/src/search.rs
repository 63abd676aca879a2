//! Public HTTP surface of the brain.
//!
//! - `GET  /`                    - welcome message
//! - `POST /api/v1/search`       - classify and dispatch a natural-language query
//! - `POST /api/v1/user-events`  - acknowledge a storefront behavior event

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shopbrain_agent::{SearchOutcome, SearchRuntime};
use shopbrain_core::{ApplicationError, InterfaceError, UserContext};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct SearchState {
    runtime: Arc<SearchRuntime>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub user_context: Option<UserContext>,
}

#[derive(Debug, Deserialize)]
pub struct UserEvent {
    pub topic: String,
    pub message: EventMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    pub event_type: String,
    pub category_id: i64,
    pub category_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub correlation_id: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub fn router(runtime: Arc<SearchRuntime>) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/api/v1/search", post(search))
        .route("/api/v1/user-events", post(user_event))
        .with_state(SearchState { runtime })
        .layer(CatchPanicLayer::custom(panic_response))
}

async fn welcome() -> Json<Value> {
    Json(json!({"message": "Welcome to the Agentic AI SDK!"}))
}

async fn search(
    State(state): State<SearchState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchOutcome>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let span = info_span!("search_request", correlation_id = %correlation_id);
    let user_context = request.user_context.unwrap_or_default();

    async move {
        info!(
            event_name = "server.search.received",
            correlation_id = %correlation_id,
            query_len = request.query.len(),
            context_keys = user_context.len(),
            "search request received"
        );

        match state.runtime.handle(&request.query, &user_context).await {
            Ok(outcome) => {
                info!(
                    event_name = "server.search.completed",
                    correlation_id = %correlation_id,
                    source = outcome.source.as_str(),
                    item_count = outcome.items.len(),
                    fallback = outcome.fallback,
                    "search request completed"
                );
                Ok(Json(outcome))
            }
            Err(failure) => Err(error_response(failure.into(), &correlation_id)),
        }
    }
    .instrument(span)
    .await
}

async fn user_event(Json(event): Json<UserEvent>) -> Json<Value> {
    info!(
        event_name = "server.user_event.received",
        topic = %event.topic,
        event_type = %event.message.event_type,
        category_id = event.message.category_id,
        category_name = %event.message.category_name,
        occurred_at = %event.message.timestamp.to_rfc3339(),
        "user event received"
    );
    Json(json!({"status": "success", "event_received": event.message.event_type}))
}

/// Maps a failure to its HTTP status and a body that carries only the fixed user-safe message.
fn error_response(failure: ApplicationError, correlation_id: &str) -> ApiError {
    let interface = failure.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!(
            event_name = "server.search.failed",
            correlation_id = %interface.correlation_id(),
            status = status.as_u16(),
            error = %interface,
            "search request failed"
        );
    } else {
        warn!(
            event_name = "server.search.rejected",
            correlation_id = %interface.correlation_id(),
            status = status.as_u16(),
            error = %interface,
            "search request rejected"
        );
    }

    let body = ErrorBody {
        error: interface.user_message(),
        correlation_id: interface.correlation_id().to_string(),
    };
    (status, Json(body))
}

/// A panicking handler still answers with the generic 500 body instead of dropping the connection.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "non-string panic payload".to_string()
    };

    let correlation_id = Uuid::new_v4().to_string();
    error!(
        event_name = "server.search.panicked",
        correlation_id = %correlation_id,
        panic = %detail,
        "request handler panicked"
    );

    let interface = ApplicationError::Internal(detail).into_interface(correlation_id.as_str());
    let body = ErrorBody {
        error: interface.user_message(),
        correlation_id: interface.correlation_id().to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
