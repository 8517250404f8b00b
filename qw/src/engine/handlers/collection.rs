//! COLLECTION: fill the active goal's fields one question at a time

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Services, StageHandler, Turn};
use crate::conversation::{Mode, Stage};
use crate::engine::decode::decode_extraction;
use crate::engine::response::{Response, StageOutcome};
use crate::llm::OutputFormat;
use crate::prompts::StageContext;
use crate::schema::{CollectedData, GoalSchema, Validation, is_missing, normalize, validation_snapshot};

/// How many missing fields a single follow-up question may ask about
const FIELDS_PER_QUESTION: usize = 2;

pub struct CollectionHandler {
    services: Arc<Services>,
}

impl CollectionHandler {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    /// Ask the oracle for field values found in the message
    ///
    /// Any failure yields an empty map, i.e. nothing extracted.
    async fn extract(&self, turn: &Turn<'_>, schema: &GoalSchema) -> CollectedData {
        let services = &self.services;
        let context = StageContext::extraction(schema, turn.message, &turn.state.collected_data);
        let text = match services
            .consult(
                &context,
                turn.model,
                OutputFormat::Json,
                services.config.temperatures.extraction,
            )
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(goal = %schema.id, error = %e, "extract: oracle unavailable, nothing extracted");
                return CollectedData::new();
            }
        };

        decode_extraction(&text).unwrap_or_else(|e| {
            warn!(goal = %schema.id, error = %e, "extract: malformed oracle output, nothing extracted");
            CollectedData::new()
        })
    }

    async fn follow_up(&self, turn: &Turn<'_>, schema: &GoalSchema, ask: &[String]) -> String {
        let services = &self.services;
        let context = StageContext::question(
            turn.state.mode,
            turn.profile,
            schema,
            ask,
            turn.message,
            &turn.state.collected_data,
        );
        match services
            .consult(
                &context,
                turn.model,
                OutputFormat::Text,
                services.config.temperatures.question,
            )
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => fallback_question(ask),
            Err(e) => {
                warn!(goal = %schema.id, error = %e, "follow_up: oracle unavailable, using fallback question");
                fallback_question(ask)
            }
        }
    }
}

fn fallback_question(ask: &[String]) -> String {
    format!("Potrzebuję jeszcze kilku informacji: {}. Możesz je podać?", ask.join(", "))
}

fn debug_line(validation: &Validation) -> String {
    format!(
        "[debug] brakujące wymagane: {}; brakujące zalecane: {}",
        list_or_dash(&validation.missing_required),
        list_or_dash(&validation.missing_recommended)
    )
}

fn list_or_dash(names: &[String]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

/// Merge extracted values, skipping ones that are themselves missing
fn merge(collected: &mut CollectedData, extracted: CollectedData) {
    for (key, value) in extracted {
        if is_missing(Some(&value)) {
            continue;
        }
        collected.insert(key, value);
    }
}

#[async_trait]
impl StageHandler for CollectionHandler {
    async fn handle(&self, turn: &mut Turn<'_>) -> StageOutcome {
        let services = Arc::clone(&self.services);
        let schema = match services.active_schema(turn.state) {
            Ok(schema) => schema,
            Err(outcome) => return outcome,
        };
        debug!(goal = %schema.id, "CollectionHandler::handle: called");

        if !turn.message.trim().is_empty() {
            let extracted = self.extract(turn, schema).await;
            debug!(goal = %schema.id, keys = ?extracted.keys().collect::<Vec<_>>(), "CollectionHandler::handle: extracted");
            merge(&mut turn.state.collected_data, extracted);
            turn.state.collected_data = normalize(schema, &turn.state.collected_data);
        }

        turn.state.validation = validation_snapshot(schema, &turn.state.collected_data);
        if turn.state.validation.missing_required.is_empty() {
            info!(goal = %schema.id, "All required fields collected, moving to CONFIRMATION");
            turn.state.stage = Stage::Confirmation;
            return StageOutcome::Continue;
        }

        let missing = turn.state.validation.missing_required.clone();
        let ask: Vec<String> = missing.iter().take(FIELDS_PER_QUESTION).cloned().collect();
        let mut message = self.follow_up(turn, schema, &ask).await;
        if turn.state.mode == Mode::Debug {
            message.push_str("\n\n");
            message.push_str(&debug_line(&turn.state.validation));
        }

        StageOutcome::Terminal(Response::Question {
            message,
            stage: turn.state.stage,
            conversation_id: turn.state.conversation_id().to_string(),
            missing_fields: Some(missing),
        })
    }
}
