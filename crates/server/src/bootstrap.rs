use std::sync::Arc;

use shopbrain_agent::{build_llm_client, HttpAnalyticsClient, LlmError, LlmRouter, SearchRuntime};
use shopbrain_core::config::{AppConfig, ConfigError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<SearchRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("language model client setup failed: {0}")]
    LlmClient(#[source] LlmError),
    #[error("analytics client setup failed: {0}")]
    AnalyticsClient(#[source] reqwest::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let llm = build_llm_client(&config.llm).map_err(BootstrapError::LlmClient)?;
    info!(
        event_name = "system.bootstrap.llm_ready",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        base_url = %config.llm.base_url,
        "language model client configured"
    );

    let analytics =
        HttpAnalyticsClient::new(&config.backend).map_err(BootstrapError::AnalyticsClient)?;
    info!(
        event_name = "system.bootstrap.backend_ready",
        correlation_id = "bootstrap",
        endpoint = %analytics.endpoint(),
        timeout_secs = config.backend.timeout_secs,
        "analytics client configured"
    );

    let runtime = SearchRuntime::new(Arc::new(LlmRouter::new(llm)), Arc::new(analytics));
    Ok(Application { config, runtime: Arc::new(runtime) })
}
