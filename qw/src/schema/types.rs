//! Goal schema types
//!
//! A [`GoalSchema`] is the declarative field contract for one goal: which
//! fields exist, which are required, and how raw values are cleaned up.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Field values collected for the active goal
pub type CollectedData = serde_json::Map<String, Value>;

/// Declared type of a schema field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Text,
    Enum,
    Number,
    Boolean,
    List,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Enum => "enum",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::List => "list",
        };
        write!(f, "{}", name)
    }
}

/// Normalization function registered in code
#[derive(Clone)]
pub struct CustomNormalizer(pub Arc<dyn Fn(&Value) -> Value + Send + Sync>);

impl CustomNormalizer {
    pub fn new(f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for CustomNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomNormalizer(..)")
    }
}

/// Per-field value cleanup, applied before enum canonicalization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalizer {
    Trim,
    Lowercase,
    Uppercase,
    CollapseWhitespace,
    /// Code-registered function; cannot appear in goal files
    #[serde(skip)]
    Custom(CustomNormalizer),
}

impl Normalizer {
    /// Apply to a value; built-ins leave non-string values untouched
    pub fn apply(&self, value: &Value) -> Value {
        match (self, value) {
            (Self::Custom(f), v) => (f.0)(v),
            (Self::Trim, Value::String(s)) => Value::String(s.trim().to_string()),
            (Self::Lowercase, Value::String(s)) => Value::String(s.to_lowercase()),
            (Self::Uppercase, Value::String(s)) => Value::String(s.to_uppercase()),
            (Self::CollapseWhitespace, Value::String(s)) => {
                Value::String(s.split_whitespace().collect::<Vec<_>>().join(" "))
            }
            (_, v) => v.clone(),
        }
    }
}

/// Contract for one field of a goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, the key in collected data
    pub name: String,

    /// Required fields block confirmation until filled
    #[serde(default)]
    pub required: bool,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    /// Human description, shown to the oracle
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Allowed values for enum fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    /// Synonym -> canonical option map for enum fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typings: Option<BTreeMap<String, String>>,

    /// Value substituted when the field is still missing after normalization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalize: Option<Normalizer>,
}

impl FieldSpec {
    /// A plain string field
    pub fn new(name: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            required,
            field_type: FieldType::String,
            description: String::new(),
            options: None,
            typings: None,
            default: None,
            normalize: None,
        }
    }

    /// An enum field with the given options
    pub fn enumeration(name: impl Into<String>, required: bool, options: &[&str]) -> Self {
        Self {
            field_type: FieldType::Enum,
            options: Some(options.iter().map(|o| o.to_string()).collect()),
            ..Self::new(name, required)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_typings(mut self, typings: &[(&str, &str)]) -> Self {
        self.typings = Some(typings.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalize = Some(normalizer);
        self
    }
}

/// Declarative field contract for a goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSchema {
    /// Goal identifier, e.g. `GENERATE_QUEST`
    pub id: String,

    /// Short description used when listing goals and in diagnosis prompts
    #[serde(default)]
    pub description: String,

    /// Task template handed to the execution stage
    #[serde(default)]
    pub task: String,

    /// Fields in declaration order
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl GoalSchema {
    pub fn new(id: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            task: String::new(),
            fields,
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}
