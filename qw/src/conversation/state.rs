//! Per-conversation state document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::{CollectedData, Validation};

/// Current persisted document version
pub const STATE_VERSION: u32 = 1;

/// Stage of the guided conversation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// Working out what the user wants
    #[default]
    Diagnosis,
    /// Filling the active goal's fields
    Collection,
    /// Waiting for a yes/no on the collected data
    Confirmation,
    /// Generating the final artifact
    Execution,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Diagnosis => "DIAGNOSIS",
            Self::Collection => "COLLECTION",
            Self::Confirmation => "CONFIRMATION",
            Self::Execution => "EXECUTION",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Response verbosity; never changes control flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Standard,
    Debug,
    Fast,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Debug => "debug",
            Self::Fast => "fast",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Author of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of the last successful diagnosis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub candidates: Vec<String>,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub conversation_id: String,
}

/// Full state of one conversation
///
/// `active_goal_id` is `None` whenever `stage` is `Diagnosis`, `history` only
/// grows, and `collected_data` is only ever cleared as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub stage: Stage,
    pub active_goal_id: Option<String>,
    /// Reserved for nested goals; only ever cleared today
    #[serde(default)]
    pub goal_stack: Vec<String>,
    #[serde(default)]
    pub collected_data: CollectedData,
    #[serde(default)]
    pub validation: Validation,
    #[serde(default)]
    pub diagnosis: Diagnosis,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub mode: Mode,
    pub meta: Meta,
}

impl ConversationState {
    /// Fresh default state
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            stage: Stage::Diagnosis,
            active_goal_id: None,
            goal_stack: Vec::new(),
            collected_data: CollectedData::new(),
            validation: Validation::default(),
            diagnosis: Diagnosis::default(),
            history: Vec::new(),
            mode: Mode::Standard,
            meta: Meta {
                version: STATE_VERSION,
                updated_at: Utc::now(),
                conversation_id: conversation_id.into(),
            },
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.meta.conversation_id
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content.into());
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content.into());
    }

    fn push(&mut self, role: Role, content: String) {
        self.history.push(HistoryEntry {
            role,
            content,
            timestamp: Utc::now(),
        });
    }

    /// Window of `n` entries preceding `message` when it is the newest user entry
    pub fn history_before(&self, message: &str, n: usize) -> &[HistoryEntry] {
        let end = match self.history.last() {
            Some(last) if last.role == Role::User && last.content == message => self.history.len() - 1,
            _ => self.history.len(),
        };
        &self.history[end.saturating_sub(n)..end]
    }

    /// Drop the in-progress goal and go back to diagnosis
    pub fn hard_reset(&mut self) {
        self.active_goal_id = None;
        self.collected_data.clear();
        self.stage = Stage::Diagnosis;
        self.goal_stack.clear();
    }

    /// Start collecting for a goal
    pub fn activate_goal(&mut self, goal_id: impl Into<String>) {
        self.active_goal_id = Some(goal_id.into());
        self.stage = Stage::Collection;
    }

    /// Reset after the artifact has been generated
    pub fn complete_goal(&mut self) {
        self.stage = Stage::Diagnosis;
        self.active_goal_id = None;
        self.collected_data.clear();
    }

    pub fn touch(&mut self) {
        self.meta.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_state_defaults() {
        let state = ConversationState::new("c1");
        assert_eq!(state.stage, Stage::Diagnosis);
        assert!(state.active_goal_id.is_none());
        assert!(state.collected_data.is_empty());
        assert_eq!(state.mode, Mode::Standard);
        assert_eq!(state.meta.version, STATE_VERSION);
        assert_eq!(state.conversation_id(), "c1");
    }

    #[test]
    fn test_hard_reset_clears_goal() {
        let mut state = ConversationState::new("c1");
        state.activate_goal("GENERATE_QUEST");
        state.stage = Stage::Confirmation;
        state.collected_data.insert("target".to_string(), json!("Gomez"));
        state.goal_stack.push("GENERATE_NPC".to_string());
        state.push_user("hej");

        state.hard_reset();

        assert_eq!(state.stage, Stage::Diagnosis);
        assert!(state.active_goal_id.is_none());
        assert!(state.collected_data.is_empty());
        assert!(state.goal_stack.is_empty());
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn test_history_before_skips_current_message() {
        let mut state = ConversationState::new("c1");
        state.push_user("Cześć");
        state.push_assistant("Witaj!");
        state.push_user("Chcę quest");

        let window = state.history_before("Chcę quest", 6);
        assert_eq!(window.len(), 2);
        assert_eq!(window[1].content, "Witaj!");
        assert_eq!(state.history_before("Chcę quest", 1)[0].content, "Witaj!");

        // not yet recorded: the whole tail is context
        assert_eq!(state.history_before("Coś innego", 6).len(), 3);
    }

    #[test]
    fn test_document_shape() {
        let mut state = ConversationState::new("c1");
        state.activate_goal("GENERATE_QUEST");
        state.push_assistant("Kto jest celem?");

        let doc = serde_json::to_value(&state).unwrap();
        assert_eq!(doc["stage"], "COLLECTION");
        assert_eq!(doc["activeGoalId"], "GENERATE_QUEST");
        assert_eq!(doc["mode"], "standard");
        assert_eq!(doc["meta"]["conversationId"], "c1");
        assert_eq!(doc["meta"]["version"], 1);
        assert_eq!(doc["history"][0]["role"], "assistant");
        assert!(doc["validation"]["missingRequired"].is_array());

        let back: ConversationState = serde_json::from_value(doc).unwrap();
        assert_eq!(back, state);
    }
}
