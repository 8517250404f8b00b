//! Goal schema registry
//!
//! Goals come from YAML (`goals:` list). The built-in set is compiled into the
//! binary; a configured goals file replaces it entirely.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use super::types::{FieldSpec, FieldType, GoalSchema};
use super::validator::clean_value;

/// Built-in goals
pub const DEFAULT_GOALS: &str = include_str!("../../goals/default.yml");

/// Errors from loading goal definitions
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to parse goals: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to read goals file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Duplicate goal id: {0}")]
    DuplicateGoal(String),

    #[error("Duplicate field '{field}' in goal {goal}")]
    DuplicateField { goal: String, field: String },

    #[error("Enum field '{field}' in goal {goal} declares no options")]
    EnumWithoutOptions { goal: String, field: String },

    #[error("Default of enum field '{field}' in goal {goal} is not one of its options")]
    DefaultNotAnOption { goal: String, field: String },

    #[error("Typing '{synonym}' of field '{field}' in goal {goal} maps to '{target}', which is not an option")]
    TypingOutsideOptions {
        goal: String,
        field: String,
        synonym: String,
        target: String,
    },

    #[error("Field '{field}' in goal {goal} rewrites its own {what} {value} when normalized")]
    UnstableValue {
        goal: String,
        field: String,
        what: &'static str,
        value: serde_json::Value,
    },
}

/// Source of goal schemas
pub trait GoalRegistry: Send + Sync {
    /// Schema for a goal, `None` when the goal is not registered
    fn get_goal_schema(&self, goal_id: &str) -> Option<&GoalSchema>;

    /// All registered goal ids, in registration order
    fn goal_ids(&self) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
struct GoalsFile {
    #[serde(default)]
    goals: Vec<GoalSchema>,
}

/// Registry backed by an in-memory list
#[derive(Debug, Clone, Default)]
pub struct StaticGoalRegistry {
    goals: Vec<GoalSchema>,
}

impl StaticGoalRegistry {
    /// Parse and check a YAML goals document
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let file: GoalsFile = serde_yaml::from_str(yaml)?;
        let mut registry = Self::default();
        for goal in file.goals {
            registry.register(goal)?;
        }
        debug!(goals = registry.goals.len(), "from_yaml: parsed");
        Ok(registry)
    }

    /// The goals compiled into the binary
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_yaml(DEFAULT_GOALS)
    }

    /// Load goals from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let registry = Self::from_yaml(&content)?;
        info!("Loaded {} goals from {}", registry.goals.len(), path.display());
        Ok(registry)
    }

    /// Add a goal, rejecting duplicates and inconsistent fields
    pub fn register(&mut self, goal: GoalSchema) -> Result<(), SchemaError> {
        if self.goals.iter().any(|g| g.id == goal.id) {
            return Err(SchemaError::DuplicateGoal(goal.id));
        }

        let mut seen = HashSet::new();
        for field in &goal.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    goal: goal.id.clone(),
                    field: field.name.clone(),
                });
            }
            check_field(&goal.id, field)?;
        }

        self.goals.push(goal);
        Ok(())
    }
}

/// Field-level consistency
///
/// Defaults, typing targets and (when typings exist) options must already be
/// in normalized form, otherwise a second `normalize` pass would rewrite them.
fn check_field(goal: &str, field: &FieldSpec) -> Result<(), SchemaError> {
    let unstable = |what: &'static str, value: &serde_json::Value| SchemaError::UnstableValue {
        goal: goal.to_string(),
        field: field.name.clone(),
        what,
        value: value.clone(),
    };

    if field.field_type == FieldType::Enum {
        let options = match field.options.as_deref() {
            Some(options) if !options.is_empty() => options,
            _ => {
                return Err(SchemaError::EnumWithoutOptions {
                    goal: goal.to_string(),
                    field: field.name.clone(),
                });
            }
        };

        if let Some(default) = &field.default
            && !default.as_str().is_some_and(|d| options.iter().any(|o| o == d))
        {
            return Err(SchemaError::DefaultNotAnOption {
                goal: goal.to_string(),
                field: field.name.clone(),
            });
        }

        if let Some(typings) = &field.typings {
            if let Some((synonym, target)) = typings.iter().find(|(_, t)| !options.contains(*t)) {
                return Err(SchemaError::TypingOutsideOptions {
                    goal: goal.to_string(),
                    field: field.name.clone(),
                    synonym: synonym.clone(),
                    target: target.clone(),
                });
            }

            for option in options {
                let value = serde_json::Value::String(option.clone());
                if clean_value(field, &value) != value {
                    return Err(unstable("option", &value));
                }
            }
        }
    }

    if let Some(default) = &field.default
        && clean_value(field, default) != *default
    {
        return Err(unstable("default", default));
    }

    Ok(())
}

impl GoalRegistry for StaticGoalRegistry {
    fn get_goal_schema(&self, goal_id: &str) -> Option<&GoalSchema> {
        self.goals.iter().find(|g| g.id == goal_id)
    }

    fn goal_ids(&self) -> Vec<String> {
        self.goals.iter().map(|g| g.id.clone()).collect()
    }
}
