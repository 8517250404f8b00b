//! Guided conversation engine
//!
//! Every inbound message goes through the same steps: record it, check for
//! a goal switch, then hand it to the handler bound to the current stage
//! until one of them produces a [`Response`]:
//!
//! ```text
//! DIAGNOSIS -> COLLECTION -> CONFIRMATION -> EXECUTION -> DIAGNOSIS
//! ```

pub mod decode;
mod error;
mod executor;
pub mod handlers;
mod response;
mod switch;

pub use error::EngineError;
pub use executor::{Engine, MAX_DISPATCH};
pub use handlers::{Services, StageHandler, Turn};
pub use response::{Recipe, Response, StageOutcome};
pub use switch::{SwitchDecision, SwitchDetector, SwitchKind};
