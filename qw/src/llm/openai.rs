//! OpenAI-compatible client
//!
//! For local servers that expose the Chat Completions API (llama.cpp server,
//! LM Studio, vLLM). JSON mode is requested through `response_format`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{GenerateOptions, Generation, LlmClient, LlmError, OutputFormat, retry};
use crate::config::LlmConfig;

/// OpenAI-compatible API client
pub struct OpenAiCompatClient {
    model: String,
    api_key: Option<String>,
    base_url: String,
    http: Client,
    max_retries: u32,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiCompatClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(?config, "from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key: config.api_key(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_retries: config.max_retries,
            timeout,
        })
    }

    /// Build the request body for the Chat Completions API
    fn build_request_body(&self, prompt: &str, options: &GenerateOptions) -> serde_json::Value {
        let model = options.model_or(&self.model);
        debug!(%model, format = ?options.format, "build_request_body: called");

        let mut messages = Vec::new();
        if !options.system.is_empty() {
            messages.push(serde_json::json!({ "role": "system", "content": options.system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": prompt }));

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature,
        });

        if options.format == OutputFormat::Json {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn generate(&self, prompt: &str, options: GenerateOptions) -> Result<Generation, LlmError> {
        debug!(prompt_len = prompt.len(), "generate: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(prompt, &options);

        let response = retry::post_json(
            &self.http,
            &url,
            self.api_key.as_deref(),
            &body,
            self.max_retries,
            self.timeout,
        )
        .await?;
        let parsed: ChatResponse = response.json().await?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("Response contained no choices".to_string()))?;

        debug!(text_len = text.len(), "generate: success");
        Ok(Generation::new(text))
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
