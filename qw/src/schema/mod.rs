//! Goal schemas
//!
//! Field contracts per goal, the registry that serves them, and the pure
//! validator/normalizer the collection stage runs on every turn.

mod registry;
mod types;
pub mod validator;

pub use registry::{DEFAULT_GOALS, GoalRegistry, SchemaError, StaticGoalRegistry};
pub use types::{CollectedData, CustomNormalizer, FieldSpec, FieldType, GoalSchema, Normalizer};
pub use validator::{
    ErrorCode, FieldError, MissingFields, Validation, ValidationReport, is_missing, missing_fields, normalize, validate,
    validation_snapshot,
};
