//! Request/response types shared by all oracle clients

use serde::{Deserialize, Serialize};

/// Output format requested from the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Free text
    #[default]
    Text,
    /// A single strict JSON object
    Json,
}

/// Per-call generation options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Model name; empty means "use the client's configured default"
    pub model: String,

    /// System instruction
    pub system: String,

    /// Requested output format
    pub format: OutputFormat,

    /// Sampling temperature
    pub temperature: f32,
}

impl GenerateOptions {
    pub fn new(model: impl Into<String>, system: impl Into<String>, format: OutputFormat, temperature: f32) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            format,
            temperature,
        }
    }

    /// Resolve the model name against a client default
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.model.trim().is_empty() { default } else { &self.model }
    }
}

/// A successful completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    /// Raw text returned by the backend
    pub text: String,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_or_falls_back_on_empty() {
        let opts = GenerateOptions::new("", "sys", OutputFormat::Json, 0.1);
        assert_eq!(opts.model_or("llama3"), "llama3");

        let opts = GenerateOptions::new("mistral", "sys", OutputFormat::Text, 0.7);
        assert_eq!(opts.model_or("llama3"), "mistral");
    }

    #[test]
    fn test_format_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&OutputFormat::Json).unwrap(), "\"json\"");
        assert_eq!(serde_json::to_string(&OutputFormat::Text).unwrap(), "\"text\"");
    }
}
