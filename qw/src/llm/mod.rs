//! LLM client module for Questwright
//!
//! The generative backend is an oracle: a stateless text/JSON completion
//! function. Everything the engine knows about it is the [`LlmClient`] trait.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod ollama;
mod openai;
mod retry;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatClient;
pub use types::{GenerateOptions, Generation, OutputFormat};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Supports "ollama" and "openai" (any OpenAI-compatible server).
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "ollama" => {
            debug!("create_client: creating Ollama client");
            Ok(Arc::new(OllamaClient::from_config(config)?))
        }
        "openai" => {
            debug!("create_client: creating OpenAI-compatible client");
            Ok(Arc::new(OpenAiCompatClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::InvalidResponse(format!(
                "Unknown LLM provider: '{}'. Supported: ollama, openai",
                other
            )))
        }
    }
}
