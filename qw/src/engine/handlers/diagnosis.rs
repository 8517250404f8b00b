//! DIAGNOSIS: find out which goal the user is after

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{FALLBACK_CLARIFICATION, Services, StageHandler, Turn};
use crate::conversation::Mode;
use crate::engine::decode::ParsedIntent;
use crate::engine::response::{Response, StageOutcome};
use crate::llm::OutputFormat;
use crate::prompts::{GoalSummary, StageContext};

/// Goal started by the `/quest` shortcut
pub const QUEST_GOAL: &str = "GENERATE_QUEST";

/// Confidence recorded for every detected goal
pub const CONFIDENCE: f32 = 0.9;

pub struct DiagnosisHandler {
    services: Arc<Services>,
}

impl DiagnosisHandler {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    fn mode_command(message: &str) -> Option<(Mode, &'static str)> {
        match message {
            "/debug" => Some((Mode::Debug, "Tryb debug włączony.")),
            "/standard" => Some((Mode::Standard, "Tryb standardowy włączony.")),
            "/fast" => Some((Mode::Fast, "Tryb szybki włączony.")),
            _ => None,
        }
    }

    async fn diagnose(&self, turn: &Turn<'_>) -> ParsedIntent {
        let services = &self.services;
        let goals = services
            .goals
            .goal_ids()
            .iter()
            .filter_map(|id| services.goals.get_goal_schema(id))
            .map(GoalSummary::from)
            .collect::<Vec<_>>();

        let context = StageContext::diagnosis(
            turn.state.mode,
            turn.profile,
            turn.message,
            turn.state.history_before(turn.message, services.config.history_window),
            goals,
        );

        let text = match services
            .consult(
                &context,
                turn.model,
                OutputFormat::Json,
                services.config.temperatures.diagnosis,
            )
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "diagnose: oracle unavailable, falling back to UNKNOWN");
                return ParsedIntent::unknown(FALLBACK_CLARIFICATION);
            }
        };

        match ParsedIntent::decode(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "diagnose: malformed oracle output, falling back to UNKNOWN");
                ParsedIntent::unknown(FALLBACK_CLARIFICATION)
            }
        }
    }
}

#[async_trait]
impl StageHandler for DiagnosisHandler {
    async fn handle(&self, turn: &mut Turn<'_>) -> StageOutcome {
        let message = turn.message.trim();
        debug!(%message, "DiagnosisHandler::handle: called");

        if let Some((mode, text)) = Self::mode_command(message) {
            info!(%mode, "Mode changed");
            turn.state.mode = mode;
            return StageOutcome::Terminal(Response::System {
                message: text.to_string(),
            });
        }

        if message == "/quest" {
            info!("Quest shortcut, starting {}", QUEST_GOAL);
            turn.state.activate_goal(QUEST_GOAL);
            return StageOutcome::Continue;
        }

        let parsed = self.diagnose(turn).await;
        if parsed.is_goal() {
            info!(goal = %parsed.intent, "Goal detected");
            turn.state.diagnosis.candidates = vec![parsed.intent.clone()];
            turn.state.diagnosis.confidence = CONFIDENCE;
            turn.state.activate_goal(parsed.intent);
            return StageOutcome::Continue;
        }

        debug!(intent = %parsed.intent, "DiagnosisHandler::handle: no goal, asking back");
        let reply = if parsed.reply.is_empty() {
            FALLBACK_CLARIFICATION.to_string()
        } else {
            parsed.reply
        };
        StageOutcome::Terminal(Response::Question {
            message: reply,
            stage: turn.state.stage,
            conversation_id: turn.state.conversation_id().to_string(),
            missing_fields: None,
        })
    }
}
