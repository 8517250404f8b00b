//! Conversation state and its persistence

mod repository;
mod state;

pub use repository::{CachedRepository, ConversationRepository, FileRepository, MemoryRepository};
pub use state::{ConversationState, Diagnosis, HistoryEntry, Meta, Mode, Role, STATE_VERSION, Stage};
