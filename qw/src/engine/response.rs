//! Engine responses and the handler control signal

use serde::{Serialize, Serializer};

use crate::conversation::Stage;
use crate::schema::CollectedData;

/// What was generated at EXECUTION
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub goal_id: String,
    pub data: CollectedData,
    pub system: String,
    pub prompt: String,
}

/// Result of one processed message
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Mode toggles and other local commands
    System { message: String },

    /// The engine needs more input
    Question {
        message: String,
        stage: Stage,
        conversation_id: String,
        missing_fields: Option<Vec<String>>,
    },

    /// The final artifact
    ForceGenerate {
        message: String,
        recipe: Recipe,
        stage: Stage,
        conversation_id: String,
    },

    /// Configuration defect or state machine failure
    Failure { error: String },
}

impl Response {
    pub fn failure(error: impl ToString) -> Self {
        Self::Failure {
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }

    /// Wire name of the response type, `None` for failures
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            Self::System { .. } => Some("SYSTEM"),
            Self::Question { .. } => Some("QUESTION"),
            Self::ForceGenerate { .. } => Some("FORCE_GENERATE"),
            Self::Failure { .. } => None,
        }
    }

    /// Text shown to the user, `None` for failures
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::System { message } | Self::Question { message, .. } | Self::ForceGenerate { message, .. } => {
                Some(message.as_str())
            }
            Self::Failure { .. } => None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Wire<'a> {
    success: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipe: Option<&'a Recipe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_fields: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut wire = Wire {
            success: self.is_success(),
            kind: self.kind(),
            message: self.message(),
            recipe: None,
            stage: None,
            conversation_id: None,
            missing_fields: None,
            error: None,
        };
        match self {
            Self::System { .. } => {}
            Self::Question {
                stage,
                conversation_id,
                missing_fields,
                ..
            } => {
                wire.stage = Some(*stage);
                wire.conversation_id = Some(conversation_id.as_str());
                wire.missing_fields = missing_fields.as_deref();
            }
            Self::ForceGenerate {
                recipe,
                stage,
                conversation_id,
                ..
            } => {
                wire.recipe = Some(recipe);
                wire.stage = Some(*stage);
                wire.conversation_id = Some(conversation_id.as_str());
            }
            Self::Failure { error } => wire.error = Some(error.as_str()),
        }
        wire.serialize(serializer)
    }
}

/// Signal returned by a stage handler
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Done for this message
    Terminal(Response),
    /// State changed; dispatch again on the new stage with the same message
    Continue,
}
