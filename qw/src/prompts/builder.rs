//! Instruction builder
//!
//! Turns a typed [`StageContext`] into a [`PromptBundle`]. The stage handlers
//! never see prompt text; they only decide which context to build.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use crate::conversation::{HistoryEntry, Mode, Role};
use crate::schema::{CollectedData, FieldSpec, GoalSchema};

/// System instruction plus prompt for one oracle call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromptBundle {
    pub system: String,
    pub prompt: String,
}

/// Builds prompt bundles for stage contexts
pub trait InstructionBuilder: Send + Sync {
    fn build(&self, context: &StageContext) -> Result<PromptBundle>;
}

/// One line of history as shown to the oracle
#[derive(Debug, Clone, Serialize)]
pub struct HistoryLine {
    pub role: &'static str,
    pub content: String,
}

impl From<&HistoryEntry> for HistoryLine {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            role: match entry.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: entry.content.clone(),
        }
    }
}

/// Goal id and description, for diagnosis
#[derive(Debug, Clone, Serialize)]
pub struct GoalSummary {
    pub id: String,
    pub description: String,
}

impl From<&GoalSchema> for GoalSummary {
    fn from(schema: &GoalSchema) -> Self {
        Self {
            id: schema.id.clone(),
            description: schema.description.clone(),
        }
    }
}

/// A schema field flattened for templates
#[derive(Debug, Clone, Serialize)]
pub struct FieldLine {
    pub name: String,
    pub field_type: String,
    pub required: bool,
    pub description: String,
    /// Comma-joined enum options, empty when none
    pub options: String,
}

impl From<&FieldSpec> for FieldLine {
    fn from(field: &FieldSpec) -> Self {
        Self {
            name: field.name.clone(),
            field_type: field.field_type.to_string(),
            required: field.required,
            description: field.description.clone(),
            options: field.options.as_ref().map(|o| o.join(", ")).unwrap_or_default(),
        }
    }
}

fn dump(data: &CollectedData) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// Mode flags shared by all contexts
#[derive(Debug, Clone, Serialize)]
pub struct ModeFlags {
    pub mode: &'static str,
    pub debug: bool,
    pub fast: bool,
}

impl From<Mode> for ModeFlags {
    fn from(mode: Mode) -> Self {
        Self {
            mode: mode.name(),
            debug: mode == Mode::Debug,
            fast: mode == Mode::Fast,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisContext {
    #[serde(flatten)]
    pub mode: ModeFlags,
    pub profile: String,
    pub message: String,
    pub history: Vec<HistoryLine>,
    pub goals: Vec<GoalSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionContext {
    pub goal_id: String,
    pub fields: Vec<FieldLine>,
    pub message: String,
    pub collected: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionContext {
    #[serde(flatten)]
    pub mode: ModeFlags,
    pub profile: String,
    pub goal_id: String,
    pub ask_fields: Vec<FieldLine>,
    pub message: String,
    pub collected: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    #[serde(flatten)]
    pub mode: ModeFlags,
    pub profile: String,
    pub lore: String,
    pub goal_id: String,
    pub task: String,
    pub collected: String,
}

/// Everything a stage can ask the builder for
#[derive(Debug, Clone)]
pub enum StageContext {
    Diagnosis(DiagnosisContext),
    Extraction(ExtractionContext),
    Question(QuestionContext),
    Execution(ExecutionContext),
}

impl StageContext {
    pub fn diagnosis(
        mode: Mode,
        profile: &str,
        message: &str,
        history: &[HistoryEntry],
        goals: impl IntoIterator<Item = GoalSummary>,
    ) -> Self {
        Self::Diagnosis(DiagnosisContext {
            mode: mode.into(),
            profile: profile.to_string(),
            message: message.to_string(),
            history: history.iter().map(HistoryLine::from).collect(),
            goals: goals.into_iter().collect(),
        })
    }

    pub fn extraction(schema: &GoalSchema, message: &str, collected: &CollectedData) -> Self {
        Self::Extraction(ExtractionContext {
            goal_id: schema.id.clone(),
            fields: schema.fields.iter().map(FieldLine::from).collect(),
            message: message.to_string(),
            collected: dump(collected),
        })
    }

    /// Follow-up question restricted to `ask` (field names)
    pub fn question(
        mode: Mode,
        profile: &str,
        schema: &GoalSchema,
        ask: &[String],
        message: &str,
        collected: &CollectedData,
    ) -> Self {
        Self::Question(QuestionContext {
            mode: mode.into(),
            profile: profile.to_string(),
            goal_id: schema.id.clone(),
            ask_fields: ask
                .iter()
                .map(|name| match schema.field(name) {
                    Some(field) => FieldLine::from(field),
                    None => FieldLine::from(&FieldSpec::new(name.clone(), true)),
                })
                .collect(),
            message: message.to_string(),
            collected: dump(collected),
        })
    }

    pub fn execution(mode: Mode, profile: &str, lore: &str, schema: &GoalSchema, collected: &CollectedData) -> Self {
        Self::Execution(ExecutionContext {
            mode: mode.into(),
            profile: profile.to_string(),
            lore: lore.to_string(),
            goal_id: schema.id.clone(),
            task: schema.task.clone(),
            collected: dump(collected),
        })
    }

    /// Template base name for this context
    pub fn template_name(&self) -> &'static str {
        match self {
            Self::Diagnosis(_) => "diagnosis",
            Self::Extraction(_) => "extraction",
            Self::Question(_) => "question",
            Self::Execution(_) => "execution",
        }
    }

    fn render_with(&self, hbs: &Handlebars<'static>, template: &str) -> std::result::Result<String, handlebars::RenderError> {
        match self {
            Self::Diagnosis(c) => hbs.render_template(template, c),
            Self::Extraction(c) => hbs.render_template(template, c),
            Self::Question(c) => hbs.render_template(template, c),
            Self::Execution(c) => hbs.render_template(template, c),
        }
    }
}

/// Handlebars-backed builder
///
/// Template loading chain:
/// 1. `{override_dir}/{name}.pmt`
/// 2. Embedded fallback in code
pub struct TemplateInstructionBuilder {
    hbs: Handlebars<'static>,
    override_dir: Option<PathBuf>,
}

impl TemplateInstructionBuilder {
    /// Builder with an optional override directory
    pub fn new(override_dir: Option<impl AsRef<Path>>) -> Self {
        let override_dir = override_dir.map(|d| d.as_ref().to_path_buf()).filter(|d| d.exists());
        debug!(?override_dir, "TemplateInstructionBuilder::new: called");
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        Self { hbs, override_dir }
    }

    /// Builder that only uses embedded templates
    pub fn embedded_only() -> Self {
        Self::new(None::<PathBuf>)
    }

    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "TemplateInstructionBuilder::load_template: called");
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "TemplateInstructionBuilder::load_template: found override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt override {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    fn render(&self, context: &StageContext, name: &str) -> Result<String> {
        let template = self.load_template(name)?;
        context
            .render_with(&self.hbs, &template)
            .map(|s| s.trim().to_string())
            .map_err(|e| eyre!("Failed to render template {}: {}", name, e))
    }
}

impl InstructionBuilder for TemplateInstructionBuilder {
    fn build(&self, context: &StageContext) -> Result<PromptBundle> {
        let name = context.template_name();
        debug!(%name, "TemplateInstructionBuilder::build: called");
        Ok(PromptBundle {
            system: self.render(context, &format!("{}-system", name))?,
            prompt: self.render(context, name)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationState;
    use serde_json::json;
    use tempfile::TempDir;

    fn schema() -> GoalSchema {
        let mut schema = GoalSchema::new(
            "GENERATE_QUEST",
            vec![
                FieldSpec::new("target", true).with_description("Kogo dotyczy quest"),
                FieldSpec::enumeration("quest_type", true, &["Zemsta", "Zlecenie"]),
                FieldSpec::new("reward", false),
            ],
        );
        schema.task = "Napisz quest o zemście.".to_string();
        schema
    }

    #[test]
    fn test_diagnosis_bundle_lists_goals_and_history() {
        let mut state = ConversationState::new("c");
        state.push_user("Cześć");
        state.push_assistant("Witaj!");
        state.push_user("Chcę quest");

        let ctx = StageContext::diagnosis(
            Mode::Standard,
            "Wojownik z Khorinis",
            "Chcę quest",
            state.history_before("Chcę quest", 6),
            vec![GoalSummary::from(&schema())],
        );
        let bundle = TemplateInstructionBuilder::embedded_only().build(&ctx).unwrap();

        assert!(bundle.system.contains("GENERATE_QUEST"));
        assert!(bundle.prompt.contains("Wojownik z Khorinis"));
        assert!(bundle.prompt.contains("assistant: Witaj!"));
        assert!(bundle.prompt.ends_with("Chcę quest"));
    }

    #[test]
    fn test_question_bundle_only_names_requested_fields() {
        let ctx = StageContext::question(
            Mode::Fast,
            "",
            &schema(),
            &["target".to_string()],
            "hej",
            &CollectedData::new(),
        );
        let bundle = TemplateInstructionBuilder::embedded_only().build(&ctx).unwrap();

        assert!(bundle.system.contains("target: Kogo dotyczy quest"));
        assert!(!bundle.system.contains("reward"));
        assert!(bundle.system.contains("jednym krótkim zdaniem"));
    }

    #[test]
    fn test_execution_bundle_ends_with_data_block() {
        let mut data = CollectedData::new();
        data.insert("target".to_string(), json!("Gomez & <Kruk>"));

        let ctx = StageContext::execution(Mode::Standard, "", "Kolonia", &schema(), &data);
        let bundle = TemplateInstructionBuilder::embedded_only().build(&ctx).unwrap();

        assert!(bundle.prompt.contains("Napisz quest o zemście."));
        assert!(bundle.prompt.contains("Kolonia"));
        // no HTML escaping in prompts
        assert!(bundle.prompt.contains("Gomez & <Kruk>"));
        assert!(bundle.prompt.ends_with("```"));
    }

    #[test]
    fn test_extraction_bundle_shows_enum_options() {
        let ctx = StageContext::extraction(&schema(), "Celem jest Gomez", &CollectedData::new());
        let bundle = TemplateInstructionBuilder::embedded_only().build(&ctx).unwrap();

        assert!(bundle.system.contains("quest_type (enum, wymagane) [dozwolone: Zemsta, Zlecenie]"));
        assert!(bundle.prompt.contains("Celem jest Gomez"));
    }

    #[test]
    fn test_override_directory_wins() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("extraction-system.pmt"), "CUSTOM {{goal_id}}").unwrap();

        let builder = TemplateInstructionBuilder::new(Some(temp.path()));
        let ctx = StageContext::extraction(&schema(), "x", &CollectedData::new());
        let bundle = builder.build(&ctx).unwrap();

        assert_eq!(bundle.system, "CUSTOM GENERATE_QUEST");
        // prompt still comes from the embedded template
        assert!(bundle.prompt.contains("Wypowiedź użytkownika"));
    }
}
