//! Decoding of oracle JSON replies
//!
//! Local models wrap JSON in code fences or chatter around it, so decoding
//! first tries the whole text and then the outermost `{...}` span. Every
//! failure is a typed [`DecodeError`]; the stage handlers pick the fallback.

use serde_json::Value;
use thiserror::Error;

use crate::schema::CollectedData;

/// Intent ids that never start a goal
pub const INTENT_UNKNOWN: &str = "UNKNOWN";
pub const INTENT_CHAT: &str = "CHAT";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Oracle returned empty output")]
    Empty,

    #[error("No JSON object found in oracle output")]
    NoObject,

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("Missing or empty field '{0}'")]
    MissingField(&'static str),
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn into_object(value: Value) -> Result<serde_json::Map<String, Value>, DecodeError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError::NotAnObject(kind_of(&other))),
    }
}

/// Pull a single JSON object out of oracle text
pub fn extract_object(text: &str) -> Result<serde_json::Map<String, Value>, DecodeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return into_object(value);
    }

    let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        return Err(DecodeError::NoObject);
    };
    if end < start {
        return Err(DecodeError::NoObject);
    }

    into_object(serde_json::from_str(&trimmed[start..=end])?)
}

/// Diagnosis reply: `{intent, reply}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIntent {
    /// Upper-cased goal id, `CHAT` or `UNKNOWN`
    pub intent: String,
    pub reply: String,
}

impl ParsedIntent {
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let object = extract_object(text)?;

        let intent = object
            .get("intent")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or(DecodeError::MissingField("intent"))?;

        let reply = object
            .get("reply")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        Ok(Self { intent, reply })
    }

    /// Fallback used whenever the oracle gives no usable signal
    pub fn unknown(reply: impl Into<String>) -> Self {
        Self {
            intent: INTENT_UNKNOWN.to_string(),
            reply: reply.into(),
        }
    }

    /// Whether this intent names a goal to pursue
    pub fn is_goal(&self) -> bool {
        self.intent != INTENT_UNKNOWN && self.intent != INTENT_CHAT
    }
}

/// Extraction reply: a flat object of field values
pub fn decode_extraction(text: &str) -> Result<CollectedData, DecodeError> {
    extract_object(text)
}
