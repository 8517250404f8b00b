//! Errors the engine surfaces to callers

use thiserror::Error;

/// Hard failures; every other fault is recovered inside the handlers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("No schema registered for goal '{0}'")]
    SchemaMissing(String),

    #[error("Stuck in state machine loop")]
    StateMachineStuck,
}
