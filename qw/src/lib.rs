//! Questwright - guided conversation flow for quest and character generation
//!
//! A user asks for something in plain language ("I want a revenge quest").
//! Questwright works out which goal that is, asks follow-up questions until
//! the goal's schema is satisfied, confirms the collected data and then asks
//! the generative backend for the final artifact.
//!
//! # Core Concepts
//!
//! - **Goal schema**: the fields a generator needs, with enum options,
//!   synonyms and defaults
//! - **Stage machine**: DIAGNOSIS, COLLECTION, CONFIRMATION, EXECUTION,
//!   one handler per stage
//! - **Oracle**: a stateless LLM backend; every failure is recovered locally
//! - **Durable state**: one JSON document per conversation
//!
//! # Modules
//!
//! - [`engine`] - Switch detector, stage handlers and the executor loop
//! - [`schema`] - Goal schemas, registry and validator
//! - [`conversation`] - Conversation state and repositories
//! - [`prompts`] - Instruction builder over Handlebars templates
//! - [`llm`] - Oracle client trait and HTTP implementations
//! - [`config`] - Configuration types and loading
//! - [`repl`] - Interactive chat session
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod llm;
pub mod prompts;
pub mod repl;
pub mod schema;

// Re-export commonly used types
pub use config::{Config, EngineConfig, LlmConfig};
pub use conversation::{ConversationRepository, ConversationState, Mode, Stage};
pub use engine::{Engine, Response};
pub use llm::{LlmClient, LlmError, create_client};
pub use schema::{GoalRegistry, GoalSchema, StaticGoalRegistry};
