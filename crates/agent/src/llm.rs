use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shopbrain_core::config::{LlmConfig, LlmProvider};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model request failed: {0}")]
    Transport(String),
    #[error("language model request timed out")]
    Timeout,
    #[error("language model returned HTTP {status}")]
    Status { status: u16 },
    #[error("language model response could not be read: {0}")]
    Response(String),
    #[error("language model client could not be built: {0}")]
    Build(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Transport to a chat-style language model. Implementations are built once per process and
/// shared read-only between requests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

#[async_trait]
impl LlmClient for Arc<dyn LlmClient> {
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        (**self).complete(request).await
    }
}

pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|error| LlmError::Build(error.to_string()))?;

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Ollama => Arc::new(OllamaClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        }),
        LlmProvider::OpenAi => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| LlmError::Build("openai provider requires an api key".to_string()))?;
            Arc::new(OpenAiClient {
                http,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                model: config.model.clone(),
                temperature: config.temperature,
                api_key,
            })
        }
    };
    Ok(client)
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

fn chat_messages(request: &LlmRequest) -> [ChatMessage<'_>; 2] {
    [
        ChatMessage { role: "system", content: &request.system },
        ChatMessage { role: "user", content: &request.user },
    ]
}

/// Ollama's native chat endpoint with JSON mode switched on.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let body = OllamaChatRequest {
            model: &self.model,
            messages: chat_messages(&request),
            stream: false,
            format: "json",
            options: OllamaOptions { temperature: self.temperature },
        };

        let response =
            self.http.post(format!("{}/api/chat", self.base_url)).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(LlmError::Status { status: response.status().as_u16() });
        }

        let parsed: OllamaChatResponse =
            response.json().await.map_err(|error| LlmError::Response(error.to_string()))?;
        Ok(parsed.message.content)
    }
}

/// Any OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: SecretString,
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let body = OpenAiChatRequest {
            model: &self.model,
            messages: chat_messages(&request),
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(LlmError::Status { status: response.status().as_u16() });
        }

        let parsed: OpenAiChatResponse =
            response.json().await.map_err(|error| LlmError::Response(error.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Response("response carried no choices".to_string()))
    }
}

/// Replays canned completions in order, then keeps returning the last one. Records every request
/// it receives.
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(responses.into_iter().map(|response| Ok(response.into())))
    }

    /// A client whose every call fails with a transport error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::from_results([Err(message.into())])
    }

    fn from_results<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<String, String>>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self.responses.lock().ok().and_then(|mut responses| responses.pop_front());
        let mut last = self.last.lock().map_err(|_| LlmError::Response("poisoned".to_string()))?;
        if let Some(next) = next {
            *last = Some(next);
        }

        match last.clone() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::Transport(message)),
            None => Err(LlmError::Response("no scripted response available".to_string())),
        }
    }
}
