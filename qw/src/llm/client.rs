//! LlmClient trait definition

use async_trait::async_trait;

use super::{GenerateOptions, Generation, LlmError};

/// Stateless completion oracle - each call is independent
///
/// The engine never keeps a session open with the backend: every stage
/// handler sends the full instruction it needs. Timeouts and retries are the
/// client's business; callers only see the final `Result`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for `prompt`
    ///
    /// When `options.format` is [`OutputFormat::Json`](super::OutputFormat::Json)
    /// the text is expected to hold a single JSON object, but callers must
    /// not rely on it.
    async fn generate(&self, prompt: &str, options: GenerateOptions) -> Result<Generation, LlmError>;

    /// Default model used when a request carries no model name
    fn default_model(&self) -> &str;
}
