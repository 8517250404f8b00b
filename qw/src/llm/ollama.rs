//! Ollama client
//!
//! Talks to a local Ollama server through `/api/generate` with streaming
//! disabled, so every call is a single request/response pair.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{GenerateOptions, Generation, LlmClient, LlmError, OutputFormat, retry};
use crate::config::LlmConfig;

/// Ollama API client
pub struct OllamaClient {
    model: String,
    base_url: String,
    http: Client,
    max_retries: u32,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(?config, "from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_retries: config.max_retries,
            timeout,
        })
    }

    /// Build the request body for `/api/generate`
    fn build_request_body(&self, prompt: &str, options: &GenerateOptions) -> serde_json::Value {
        let model = options.model_or(&self.model);
        debug!(%model, format = ?options.format, "build_request_body: called");

        let mut body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": options.temperature },
        });

        if !options.system.is_empty() {
            body["system"] = serde_json::json!(options.system);
        }

        if options.format == OutputFormat::Json {
            body["format"] = serde_json::json!("json");
        }

        body
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str, options: GenerateOptions) -> Result<Generation, LlmError> {
        debug!(prompt_len = prompt.len(), "generate: called");
        let url = format!("{}/api/generate", self.base_url);
        let body = self.build_request_body(prompt, &options);

        let response = retry::post_json(&self.http, &url, None, &body, self.max_retries, self.timeout).await?;
        let parsed: OllamaResponse = response.json().await?;

        if let Some(error) = parsed.error {
            debug!(%error, "generate: backend reported error");
            return Err(LlmError::InvalidResponse(error));
        }

        debug!(text_len = parsed.response.len(), "generate: success");
        Ok(Generation::new(parsed.response))
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
