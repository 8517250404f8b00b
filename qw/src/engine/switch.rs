//! Goal switch detection
//!
//! Runs before any stage handler. A hard switch wipes the in-progress goal
//! no matter which stage the conversation is in.

use tracing::debug;

use crate::conversation::ConversationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    /// Unconditional reset to diagnosis
    Hard,
    /// Oracle-detected change of topic; never produced yet
    Soft,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchDecision {
    Stay,
    Switch { kind: SwitchKind, new_goal: Option<String> },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchDetector;

impl SwitchDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, message: &str, state: &ConversationState) -> SwitchDecision {
        let message = message.trim();
        if is_hard_command(message) {
            debug!(%message, stage = %state.stage, "detect: hard switch");
            return SwitchDecision::Switch {
                kind: SwitchKind::Hard,
                new_goal: None,
            };
        }
        self.detect_soft(message, state)
    }

    // Soft switching is intentionally not implemented.
    fn detect_soft(&self, _message: &str, _state: &ConversationState) -> SwitchDecision {
        SwitchDecision::Stay
    }
}

fn is_hard_command(message: &str) -> bool {
    message == "/start" || message == "/new" || message.starts_with("/new ") || message.starts_with("/cancel")
}
