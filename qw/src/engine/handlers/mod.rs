//! Stage handlers
//!
//! One handler per [`Stage`](crate::conversation::Stage). A handler reads and
//! mutates the turn's state and answers with a [`StageOutcome`]: either a
//! terminal response or a request to dispatch again on the new stage.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error};

use super::error::EngineError;
use super::response::{Response, StageOutcome};
use crate::config::EngineConfig;
use crate::conversation::{ConversationState, Stage};
use crate::llm::{GenerateOptions, LlmClient, LlmError, OutputFormat};
use crate::prompts::{InstructionBuilder, PromptBundle, StageContext};
use crate::schema::{GoalRegistry, GoalSchema};

mod collection;
mod confirmation;
mod diagnosis;
mod execution;

pub use collection::CollectionHandler;
pub use confirmation::{ConfirmationHandler, Verdict, classify};
pub use diagnosis::{CONFIDENCE, DiagnosisHandler, QUEST_GOAL};
pub use execution::ExecutionHandler;

/// Reply used when diagnosis gets no usable signal from the oracle
pub const FALLBACK_CLARIFICATION: &str =
    "Nie jestem pewien, czego potrzebujesz. Chcesz stworzyć quest, postać NPC czy cechę postaci?";

/// Everything a handler may touch while processing one message
pub struct Turn<'a> {
    pub state: &'a mut ConversationState,
    /// The inbound user message, unchanged across re-dispatches
    pub message: &'a str,
    /// Opaque character profile supplied by the caller
    pub profile: &'a str,
    /// Model name for this turn; empty means the client default
    pub model: &'a str,
}

#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn handle(&self, turn: &mut Turn<'_>) -> StageOutcome;
}

/// Collaborators shared by the built-in handlers
pub struct Services {
    pub llm: Arc<dyn LlmClient>,
    pub goals: Arc<dyn GoalRegistry>,
    pub instructions: Arc<dyn InstructionBuilder>,
    pub config: EngineConfig,
    /// World lore merged into execution instructions
    pub lore: String,
}

/// Why an oracle consultation produced nothing usable
#[derive(Debug, Error)]
pub enum OracleFault {
    #[error("Failed to build instruction: {0}")]
    Instruction(eyre::Report),

    #[error(transparent)]
    Oracle(#[from] LlmError),
}

impl Services {
    pub fn bundle(&self, context: &StageContext) -> Result<PromptBundle, OracleFault> {
        self.instructions.build(context).map_err(OracleFault::Instruction)
    }

    pub async fn ask(
        &self,
        bundle: &PromptBundle,
        model: &str,
        format: OutputFormat,
        temperature: f32,
    ) -> Result<String, OracleFault> {
        debug!(?format, temperature, %model, "ask: called");
        let options = GenerateOptions::new(model, bundle.system.as_str(), format, temperature);
        let generation = self.llm.generate(&bundle.prompt, options).await?;
        Ok(generation.text)
    }

    /// Build the instruction for `context` and send it
    pub async fn consult(
        &self,
        context: &StageContext,
        model: &str,
        format: OutputFormat,
        temperature: f32,
    ) -> Result<String, OracleFault> {
        let bundle = self.bundle(context)?;
        self.ask(&bundle, model, format, temperature).await
    }

    /// Schema of the state's active goal
    ///
    /// A missing schema is a configuration defect: the state is sent back to
    /// diagnosis and the returned outcome is the failure to surface.
    pub fn active_schema(&self, state: &mut ConversationState) -> Result<&GoalSchema, StageOutcome> {
        let goal_id = state.active_goal_id.clone().unwrap_or_default();
        if let Some(schema) = self.goals.get_goal_schema(&goal_id) {
            return Ok(schema);
        }

        error!(goal = %goal_id, stage = %state.stage, "No schema registered for active goal");
        state.stage = Stage::Diagnosis;
        state.active_goal_id = None;
        Err(StageOutcome::Terminal(Response::failure(EngineError::SchemaMissing(
            goal_id,
        ))))
    }
}
