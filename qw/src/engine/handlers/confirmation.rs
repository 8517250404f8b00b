//! CONFIRMATION: yes/no on the collected data

use async_trait::async_trait;
use tracing::{debug, info};

use super::{CollectionHandler, StageHandler, Turn};
use crate::conversation::{ConversationState, Stage};
use crate::engine::response::{Response, StageOutcome};

const AFFIRMATIVE: &[&str] = &["tak", "yes", "dobrze", "zgoda", "ok", "dawaj", "rób", "generuj", "jasne"];
const NEGATIVE: &[&str] = &["nie", "no", "błąd", "zmień", "czekaj", "stop", "anuluj"];

/// Classification of a confirmation reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Yes,
    No,
    Unclear,
}

/// Case-insensitive substring match; affirmative keywords win
pub fn classify(message: &str) -> Verdict {
    let folded = message.to_lowercase();
    if AFFIRMATIVE.iter().any(|k| folded.contains(k)) {
        Verdict::Yes
    } else if NEGATIVE.iter().any(|k| folded.contains(k)) {
        Verdict::No
    } else {
        Verdict::Unclear
    }
}

fn summary_question(state: &ConversationState) -> Response {
    let dump = serde_json::to_string_pretty(&state.collected_data).unwrap_or_else(|_| "{}".to_string());
    Response::Question {
        message: format!("Zebrane dane:\n{}\n\nCzy mam generować? (tak/nie)", dump),
        stage: state.stage,
        conversation_id: state.conversation_id().to_string(),
        missing_fields: None,
    }
}

pub struct ConfirmationHandler {
    collection: CollectionHandler,
}

impl ConfirmationHandler {
    /// A refusal is handed to `collection` as a correction
    pub fn new(collection: CollectionHandler) -> Self {
        Self { collection }
    }
}

#[async_trait]
impl StageHandler for ConfirmationHandler {
    async fn handle(&self, turn: &mut Turn<'_>) -> StageOutcome {
        let verdict = classify(turn.message);
        debug!(?verdict, "ConfirmationHandler::handle: called");

        match verdict {
            Verdict::Yes => {
                info!("Confirmed, moving to EXECUTION");
                turn.state.stage = Stage::Execution;
                StageOutcome::Continue
            }
            Verdict::No => {
                info!("Refused, back to COLLECTION");
                turn.state.stage = Stage::Collection;
                match self.collection.handle(turn).await {
                    // nothing left to correct, so ask again instead of cycling
                    StageOutcome::Continue if turn.state.stage == Stage::Confirmation => {
                        StageOutcome::Terminal(summary_question(turn.state))
                    }
                    outcome => outcome,
                }
            }
            Verdict::Unclear => StageOutcome::Terminal(summary_question(turn.state)),
        }
    }
}
