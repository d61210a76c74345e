//! LLM capability shared by the candidate generator and the judges.
//!
//! [`LlmClient`] is the raw text transport. [`complete_structured`] layers the
//! response shape on top: it hands the model the JSON schema of the expected
//! type and parses the reply, so every caller gets typed output or an
//! [`LlmCallError`].

use crate::config::{Config, ConfigError};
use async_trait::async_trait;
use rstructor::{GeminiClient, GeminiModel, LLMClient};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// System role used for every generation and judge call
pub const SYSTEM_ROLE: &str = "You are a helpful assistant";

#[derive(Error, Debug)]
pub enum LlmCallError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("failed to parse response: {0}")]
    Malformed(String),
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

/// One chat exchange: a system role plus a rendered user prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
        }
    }
}

/// Stateless request/response access to a chat model.
///
/// Implementations are shared read-only across the generator and all judges
/// of a process.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmCallError>;
}

/// Ask the model for a value of type `T`, validated against `T`'s JSON schema.
pub async fn complete_structured<T>(
    client: &dyn LlmClient,
    system_prompt: &str,
    user_prompt: &str,
) -> Result<T, LlmCallError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = schemars::schema_for!(T);
    let schema = serde_json::to_string_pretty(&schema)
        .map_err(|e| LlmCallError::Malformed(e.to_string()))?;

    let prompt = format!(
        r#"{user_prompt}

You MUST respond with valid JSON matching this exact schema:
{schema}

Do not include any markdown formatting, code blocks, or explanations. Only output the raw JSON object."#
    );

    let request = CompletionRequest::new(system_prompt, prompt);
    let text = client.complete(&request).await?;

    let cleaned = strip_markdown_json(&text);
    serde_json::from_str(&cleaned)
        .map_err(|e| LlmCallError::Malformed(format!("{}: {}", e, cleaned)))
}

/// Strip markdown code block wrappers from JSON response
pub fn strip_markdown_json(text: &str) -> String {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        let without_prefix = rest.strip_prefix("json").unwrap_or(rest);

        if let Some(end_idx) = without_prefix.rfind("```") {
            return without_prefix[..end_idx].trim().to_string();
        }
    }

    trimmed.to_string()
}

/// Gemini transport backed by rstructor.
pub struct GeminiLlmClient {
    client: GeminiClient,
}

impl GeminiLlmClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self, LlmCallError> {
        let client = GeminiClient::new(api_key)
            .map_err(|e| LlmCallError::RequestFailed(e.to_string()))?
            .model(parse_gemini_model(model));
        Ok(Self { client })
    }

    /// Build the client for the provider and model named in the config
    pub fn from_config(config: &Config) -> Result<Self, LlmCallError> {
        let api_key = config.api_key()?;
        Self::new(api_key, &config.agent.model)
    }
}

#[async_trait]
impl LlmClient for GeminiLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmCallError> {
        // rstructor takes a single prompt, so the system role leads it
        let prompt = format!("{}\n\n{}", request.system_prompt, request.user_prompt);

        let result = self
            .client
            .generate_with_metadata(&prompt)
            .await
            .map_err(|e| LlmCallError::RequestFailed(e.to_string()))?;

        Ok(result.text)
    }
}

/// Parse a model string into a GeminiModel
fn parse_gemini_model(model: &str) -> GeminiModel {
    match model {
        "gemini-2.0-flash" => GeminiModel::Gemini20Flash,
        "gemini-2.5-flash" => GeminiModel::Gemini25Flash,
        "gemini-2.5-pro" => GeminiModel::Gemini25Pro,
        _ => GeminiModel::Gemini20Flash, // Default
    }
}

type Responder = dyn Fn(&CompletionRequest) -> Result<String, LlmCallError> + Send + Sync;

/// In-process client for tests and offline runs.
///
/// Replies come from a closure over the request, or from a fixed script
/// consumed in call order. Every request is recorded.
pub struct MockLlmClient {
    responder: Box<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmCallError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with each scripted result in turn, then fail every further call
    pub fn scripted(responses: Vec<Result<String, LlmCallError>>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| {
                    Err(LlmCallError::RequestFailed(
                        "no scripted response left".to_string(),
                    ))
                })
        })
    }

    /// Every request received so far, in call order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmCallError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        (self.responder)(request)
    }
}
