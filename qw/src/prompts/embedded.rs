//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

pub const DIAGNOSIS_SYSTEM: &str = include_str!("../../prompts/diagnosis-system.pmt");
pub const DIAGNOSIS: &str = include_str!("../../prompts/diagnosis.pmt");
pub const EXTRACTION_SYSTEM: &str = include_str!("../../prompts/extraction-system.pmt");
pub const EXTRACTION: &str = include_str!("../../prompts/extraction.pmt");
pub const QUESTION_SYSTEM: &str = include_str!("../../prompts/question-system.pmt");
pub const QUESTION: &str = include_str!("../../prompts/question.pmt");
pub const EXECUTION_SYSTEM: &str = include_str!("../../prompts/execution-system.pmt");
pub const EXECUTION: &str = include_str!("../../prompts/execution.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "diagnosis-system" => Some(DIAGNOSIS_SYSTEM),
        "diagnosis" => Some(DIAGNOSIS),
        "extraction-system" => Some(EXTRACTION_SYSTEM),
        "extraction" => Some(EXTRACTION),
        "question-system" => Some(QUESTION_SYSTEM),
        "question" => Some(QUESTION),
        "execution-system" => Some(EXECUTION_SYSTEM),
        "execution" => Some(EXECUTION),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
