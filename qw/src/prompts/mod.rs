//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files, one `{stage}-system` and
//! one `{stage}` template per oracle call the engine makes.
//!
//! Template loading chain:
//! 1. `{prompts}/{name}.pmt` (configured override directory)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

mod builder;
pub mod embedded;

pub use builder::{
    DiagnosisContext, ExecutionContext, ExtractionContext, FieldLine, GoalSummary, HistoryLine, InstructionBuilder,
    ModeFlags, PromptBundle, QuestionContext, StageContext, TemplateInstructionBuilder,
};
