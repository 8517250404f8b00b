//! Schema validation and normalization of collected data
//!
//! All functions are pure: they read a schema and a data map and return new
//! values. A field counts as missing when it is absent, `null`, or the empty
//! string.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::types::{CollectedData, FieldSpec, FieldType, GoalSchema};

/// Error code for a single field problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingRequired,
    InvalidEnum,
}

/// A single field problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Result of [`validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

/// Missing fields partitioned by their `required` flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingFields {
    pub required: Vec<String>,
    pub recommended: Vec<String>,
}

/// Last computed validation snapshot kept in conversation state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub missing_required: Vec<String>,
    pub missing_recommended: Vec<String>,
    pub invalid: Vec<String>,
}

/// Missing means absent, `null` or `""`
pub fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn enum_violation(field: &FieldSpec, value: &Value) -> Option<FieldError> {
    let options = field.options.as_ref()?;
    let allowed = match value {
        Value::String(s) => options.iter().any(|o| o == s),
        _ => false,
    };
    if allowed {
        return None;
    }
    Some(FieldError {
        field: field.name.clone(),
        code: ErrorCode::InvalidEnum,
        message: format!("'{}' must be one of: {}", field.name, options.join(", ")),
    })
}

/// Check required presence and enum membership
///
/// Enum values are compared literally; run [`normalize`] first to fold
/// case and synonyms.
pub fn validate(schema: &GoalSchema, data: &CollectedData) -> ValidationReport {
    debug!(goal = %schema.id, "validate: called");
    let mut errors = Vec::new();

    for field in &schema.fields {
        let value = data.get(&field.name);
        if is_missing(value) {
            if field.required {
                errors.push(FieldError {
                    field: field.name.clone(),
                    code: ErrorCode::MissingRequired,
                    message: format!("'{}' is required", field.name),
                });
            }
            continue;
        }

        if field.field_type == FieldType::Enum
            && let Some(value) = value
            && let Some(err) = enum_violation(field, value)
        {
            errors.push(err);
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Every schema field whose value is missing, in declaration order
pub fn missing_fields(schema: &GoalSchema, data: &CollectedData) -> MissingFields {
    let mut missing = MissingFields::default();
    for field in &schema.fields {
        if !is_missing(data.get(&field.name)) {
            continue;
        }
        if field.required {
            missing.required.push(field.name.clone());
        } else {
            missing.recommended.push(field.name.clone());
        }
    }
    debug!(
        goal = %schema.id,
        required = ?missing.required,
        recommended = ?missing.recommended,
        "missing_fields: computed"
    );
    missing
}

/// Map an enum value onto its canonical option
///
/// Case-insensitive option matches win over synonyms, so a canonical value
/// always maps to itself.
fn canonical_enum_value(field: &FieldSpec, raw: &str) -> Option<String> {
    let folded = raw.trim().to_lowercase();

    if let Some(options) = &field.options
        && let Some(option) = options.iter().find(|o| o.trim().to_lowercase() == folded)
    {
        return Some(option.clone());
    }

    field
        .typings
        .as_ref()?
        .iter()
        .find(|(synonym, _)| synonym.trim().to_lowercase() == folded)
        .map(|(_, canonical)| canonical.clone())
}

/// Run a present value through the field's normalizer and enum typings
///
/// Defaults are not involved; [`normalize`] adds them afterwards.
pub fn clean_value(field: &FieldSpec, value: &Value) -> Value {
    let value = match &field.normalize {
        Some(normalizer) => normalizer.apply(value),
        None => value.clone(),
    };

    if field.field_type == FieldType::Enum
        && field.typings.is_some()
        && let Value::String(raw) = &value
        && let Some(canonical) = canonical_enum_value(field, raw)
    {
        return Value::String(canonical);
    }
    value
}

/// Normalize collected data against a schema
///
/// Per field, in order: custom/built-in `normalize`, enum canonicalization
/// through `typings`, then `default` if the value is still missing. Keys not
/// declared in the schema are carried over untouched.
///
/// Idempotent for every schema the registry accepts, provided custom
/// normalizers are idempotent themselves.
pub fn normalize(schema: &GoalSchema, data: &CollectedData) -> CollectedData {
    debug!(goal = %schema.id, keys = data.len(), "normalize: called");
    let mut out = data.clone();

    for field in &schema.fields {
        if let Some(value) = out.get(&field.name) {
            let cleaned = clean_value(field, value);
            out.insert(field.name.clone(), cleaned);
        }

        if is_missing(out.get(&field.name))
            && let Some(default) = &field.default
        {
            out.insert(field.name.clone(), default.clone());
        }
    }

    out
}

/// Compute the snapshot stored in conversation state
pub fn validation_snapshot(schema: &GoalSchema, data: &CollectedData) -> Validation {
    let missing = missing_fields(schema, data);
    let invalid = validate(schema, data)
        .errors
        .into_iter()
        .filter(|e| e.code == ErrorCode::InvalidEnum)
        .map(|e| e.field)
        .collect();

    Validation {
        missing_required: missing.required,
        missing_recommended: missing.recommended,
        invalid,
    }
}
