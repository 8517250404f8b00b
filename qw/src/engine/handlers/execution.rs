//! EXECUTION: generate the artifact and start over

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Services, StageHandler, Turn};
use crate::engine::response::{Recipe, Response, StageOutcome};
use crate::llm::OutputFormat;
use crate::prompts::{PromptBundle, StageContext};

/// Artifact text used when the oracle cannot be reached
const FALLBACK_ARTIFACT: &str = r#"{"error":"Nie udało się wygenerować wyniku. Spróbuj ponownie."}"#;

pub struct ExecutionHandler {
    services: Arc<Services>,
}

impl ExecutionHandler {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl StageHandler for ExecutionHandler {
    async fn handle(&self, turn: &mut Turn<'_>) -> StageOutcome {
        let services = Arc::clone(&self.services);
        let schema = match services.active_schema(turn.state) {
            Ok(schema) => schema,
            Err(outcome) => return outcome,
        };
        debug!(goal = %schema.id, "ExecutionHandler::handle: called");

        let context = StageContext::execution(
            turn.state.mode,
            turn.profile,
            &services.lore,
            schema,
            &turn.state.collected_data,
        );

        let (bundle, artifact) = match services.bundle(&context) {
            Ok(bundle) => {
                let artifact = services
                    .ask(
                        &bundle,
                        turn.model,
                        OutputFormat::Json,
                        services.config.temperatures.execution,
                    )
                    .await;
                (bundle, artifact)
            }
            Err(e) => (PromptBundle::default(), Err(e)),
        };
        let message = artifact.unwrap_or_else(|e| {
            warn!(goal = %schema.id, error = %e, "ExecutionHandler::handle: generation failed, returning fallback");
            FALLBACK_ARTIFACT.to_string()
        });

        let recipe = Recipe {
            goal_id: schema.id.clone(),
            data: turn.state.collected_data.clone(),
            system: bundle.system,
            prompt: bundle.prompt,
        };

        info!(goal = %schema.id, "Artifact generated, back to DIAGNOSIS");
        turn.state.complete_goal();

        StageOutcome::Terminal(Response::ForceGenerate {
            message,
            recipe,
            stage: turn.state.stage,
            conversation_id: turn.state.conversation_id().to_string(),
        })
    }
}
