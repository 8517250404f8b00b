//! Engine - runs one inbound message through the stage state machine

use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{debug, info, warn};

use super::error::EngineError;
use super::handlers::{
    CollectionHandler, ConfirmationHandler, DiagnosisHandler, ExecutionHandler, Services, StageHandler, Turn,
};
use super::response::{Response, StageOutcome};
use super::switch::{SwitchDecision, SwitchDetector, SwitchKind};
use crate::config::Config;
use crate::conversation::{CachedRepository, ConversationRepository, ConversationState, FileRepository, Stage};
use crate::llm::create_client;
use crate::prompts::TemplateInstructionBuilder;
use crate::schema::GoalRegistry;

/// Handler invocations allowed per inbound message
pub const MAX_DISPATCH: usize = 3;

/// One handler per stage
struct Handlers {
    diagnosis: Arc<dyn StageHandler>,
    collection: Arc<dyn StageHandler>,
    confirmation: Arc<dyn StageHandler>,
    execution: Arc<dyn StageHandler>,
}

impl Handlers {
    fn builtin(services: &Arc<Services>) -> Self {
        Self {
            diagnosis: Arc::new(DiagnosisHandler::new(Arc::clone(services))),
            collection: Arc::new(CollectionHandler::new(Arc::clone(services))),
            confirmation: Arc::new(ConfirmationHandler::new(CollectionHandler::new(Arc::clone(services)))),
            execution: Arc::new(ExecutionHandler::new(Arc::clone(services))),
        }
    }

    fn get(&self, stage: Stage) -> &Arc<dyn StageHandler> {
        match stage {
            Stage::Diagnosis => &self.diagnosis,
            Stage::Collection => &self.collection,
            Stage::Confirmation => &self.confirmation,
            Stage::Execution => &self.execution,
        }
    }

    fn set(&mut self, stage: Stage, handler: Arc<dyn StageHandler>) {
        match stage {
            Stage::Diagnosis => self.diagnosis = handler,
            Stage::Collection => self.collection = handler,
            Stage::Confirmation => self.confirmation = handler,
            Stage::Execution => self.execution = handler,
        }
    }
}

/// Guided conversation engine
pub struct Engine {
    /// Oracle, goals, instructions and tuning shared with the handlers
    services: Arc<Services>,

    /// Where conversation state lives between messages
    repository: Arc<dyn ConversationRepository>,

    detector: SwitchDetector,

    handlers: Handlers,
}

impl Engine {
    /// Engine with the built-in stage handlers
    pub fn new(services: Arc<Services>, repository: Arc<dyn ConversationRepository>) -> Self {
        debug!("Engine::new: called");
        let handlers = Handlers::builtin(&services);
        Self {
            services,
            repository,
            detector: SwitchDetector::new(),
            handlers,
        }
    }

    /// Replace the handler bound to `stage`
    pub fn with_handler(mut self, stage: Stage, handler: Arc<dyn StageHandler>) -> Self {
        debug!(%stage, "Engine::with_handler: called");
        self.handlers.set(stage, handler);
        self
    }

    /// Wire up an engine from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        debug!("Engine::from_config: called");
        let llm = create_client(&config.llm).context("Failed to create LLM client")?;

        let services = Arc::new(Services {
            llm,
            goals: Arc::new(config.load_goals()?),
            instructions: Arc::new(TemplateInstructionBuilder::new(config.prompts.as_ref())),
            config: config.engine.clone(),
            lore: config.load_lore()?,
        });

        let store = FileRepository::open(&config.storage.path)?;
        Ok(Self::new(services, Arc::new(CachedRepository::new(store))))
    }

    pub fn repository(&self) -> &Arc<dyn ConversationRepository> {
        &self.repository
    }

    pub fn goals(&self) -> &Arc<dyn GoalRegistry> {
        &self.services.goals
    }

    fn load_state(&self, conversation_id: &str) -> ConversationState {
        match self.repository.load(conversation_id) {
            Ok(Some(state)) => state,
            Ok(None) => {
                info!(%conversation_id, "Starting new conversation");
                ConversationState::new(conversation_id)
            }
            Err(e) => {
                warn!(%conversation_id, error = %e, "Failed to load conversation, starting fresh");
                ConversationState::new(conversation_id)
            }
        }
    }

    fn save_state(&self, conversation_id: &str, state: &mut ConversationState) {
        state.touch();
        if let Err(e) = self.repository.save(conversation_id, state) {
            warn!(%conversation_id, error = %e, "Failed to persist conversation");
        }
    }

    async fn dispatch(&self, turn: &mut Turn<'_>) -> Response {
        for round in 0..MAX_DISPATCH {
            let stage = turn.state.stage;
            debug!(round, %stage, "Engine::dispatch: invoking handler");
            match self.handlers.get(stage).handle(turn).await {
                StageOutcome::Terminal(response) => return response,
                StageOutcome::Continue => {
                    debug!(from = %stage, to = %turn.state.stage, "Engine::dispatch: continue");
                }
            }
        }

        warn!(stage = %turn.state.stage, "Dispatch limit reached without a response");
        Response::failure(EngineError::StateMachineStuck)
    }

    /// Process one user message and return the engine's response
    ///
    /// Never fails: oracle and storage faults are absorbed, configuration
    /// defects and runaway handlers come back as [`Response::Failure`].
    pub async fn process_message(&self, conversation_id: &str, message: &str, profile: &str, model: &str) -> Response {
        debug!(%conversation_id, %message, "Engine::process_message: called");
        let mut state = self.load_state(conversation_id);
        state.push_user(message);

        if let SwitchDecision::Switch { kind, new_goal } = self.detector.detect(message, &state) {
            info!(?kind, ?new_goal, from = %state.stage, "Goal switch");
            if kind == SwitchKind::Hard {
                state.hard_reset();
            }
        }

        let response = {
            let mut turn = Turn {
                state: &mut state,
                message,
                profile,
                model,
            };
            self.dispatch(&mut turn).await
        };

        if let Some(reply) = response.message() {
            state.push_assistant(reply);
        }
        self.save_state(conversation_id, &mut state);

        debug!(kind = ?response.kind(), stage = %state.stage, "Engine::process_message: done");
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{MemoryRepository, Mode, Role};
    use crate::engine::handlers::testing::{quest_schema, services};
    use crate::llm::client::mock::MockLlmClient;
    use crate::schema::{FieldSpec, GoalSchema};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine(llm: &Arc<MockLlmClient>, repo: &Arc<MemoryRepository>) -> Engine {
        Engine::new(services(Arc::clone(llm), vec![quest_schema()]), repo.clone())
    }

    fn saved(repo: &MemoryRepository, id: &str) -> ConversationState {
        repo.load(id).unwrap().unwrap()
    }

    fn seed(repo: &MemoryRepository, stage: Stage) -> ConversationState {
        let mut state = ConversationState::new("c1");
        state.activate_goal("GENERATE_QUEST");
        state.stage = stage;
        if stage != Stage::Collection {
            state.collected_data.insert("target".to_string(), json!("Gomez"));
        }
        repo.save("c1", &state).unwrap();
        state
    }

    /// Handler that never finishes
    #[derive(Default)]
    struct Spinner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StageHandler for Spinner {
        async fn handle(&self, _turn: &mut Turn<'_>) -> StageOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StageOutcome::Continue
        }
    }

    struct FailingRepository;

    impl ConversationRepository for FailingRepository {
        fn load(&self, _conversation_id: &str) -> Result<Option<ConversationState>> {
            Err(eyre::eyre!("disk on fire"))
        }

        fn save(&self, _conversation_id: &str, _state: &ConversationState) -> Result<()> {
            Err(eyre::eyre!("disk on fire"))
        }

        fn list(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn delete(&self, _conversation_id: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_goal_detected_and_first_question_asked() {
        let llm = Arc::new(MockLlmClient::texts(&[
            r#"{"intent":"GENERATE_QUEST","reply":""}"#,
            "{}",
            "Kto ma być celem zemsty?",
        ]));
        let repo = Arc::new(MemoryRepository::new());
        let engine = engine(&llm, &repo);

        let response = engine.process_message("c1", "Chcę zdobyć quest o zemście", "", "").await;

        assert_eq!(response.kind(), Some("QUESTION"));
        assert_eq!(response.message(), Some("Kto ma być celem zemsty?"));

        let state = saved(&repo, "c1");
        assert_eq!(state.active_goal_id.as_deref(), Some("GENERATE_QUEST"));
        assert_eq!(state.stage, Stage::Collection);
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[0].role, Role::User);
        assert_eq!(state.history[1].content, "Kto ma być celem zemsty?");
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_goal_without_required_fields_reaches_confirmation() {
        let schema = GoalSchema::new("GENERATE_QUEST", vec![FieldSpec::new("reward", false)]);
        let llm = Arc::new(MockLlmClient::texts(&[r#"{"intent":"GENERATE_QUEST","reply":""}"#, "{}"]));
        let repo = Arc::new(MemoryRepository::new());
        let engine = Engine::new(services(llm, vec![schema]), repo.clone());

        let response = engine.process_message("c1", "Chcę zdobyć quest o zemście", "", "").await;

        assert_eq!(response.kind(), Some("QUESTION"));
        assert_eq!(saved(&repo, "c1").stage, Stage::Confirmation);
    }

    #[tokio::test]
    async fn test_last_field_moves_to_confirmation_in_same_call() {
        let llm = Arc::new(MockLlmClient::texts(&[r#"{"target":"Gomez"}"#]));
        let repo = Arc::new(MemoryRepository::new());
        seed(&repo, Stage::Collection);
        let engine = engine(&llm, &repo);

        let response = engine.process_message("c1", "Celem jest Gomez", "", "").await;

        let Response::Question { stage, message, .. } = response else {
            panic!("expected a question");
        };
        assert_eq!(stage, Stage::Confirmation);
        assert!(message.contains("Gomez"));

        let state = saved(&repo, "c1");
        assert_eq!(state.stage, Stage::Confirmation);
        assert!(state.validation.missing_required.is_empty());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_confirmation_generates_and_resets() {
        let llm = Arc::new(MockLlmClient::texts(&[r#"{"title":"Zemsta na Gomezie"}"#]));
        let repo = Arc::new(MemoryRepository::new());
        seed(&repo, Stage::Confirmation);
        let engine = engine(&llm, &repo);

        let response = engine.process_message("c1", "tak, generuj", "", "").await;

        assert_eq!(response.kind(), Some("FORCE_GENERATE"));
        let state = saved(&repo, "c1");
        assert_eq!(state.stage, Stage::Diagnosis);
        assert!(state.active_goal_id.is_none());
        assert!(state.collected_data.is_empty());
        assert_eq!(state.history.last().unwrap().content, r#"{"title":"Zemsta na Gomezie"}"#);
    }

    #[tokio::test]
    async fn test_hard_switch_from_every_stage() {
        for stage in [Stage::Collection, Stage::Confirmation, Stage::Execution] {
            let llm = Arc::new(MockLlmClient::texts(&[r#"{"intent":"CHAT","reply":"Od czego zaczynamy?"}"#]));
            let repo = Arc::new(MemoryRepository::new());
            seed(&repo, stage);
            let engine = engine(&llm, &repo);

            let response = engine.process_message("c1", "/new", "", "").await;

            assert_eq!(response.message(), Some("Od czego zaczynamy?"), "from {}", stage);
            let state = saved(&repo, "c1");
            assert_eq!(state.stage, Stage::Diagnosis);
            assert!(state.active_goal_id.is_none());
            assert!(state.collected_data.is_empty());
        }
    }

    #[tokio::test]
    async fn test_spinning_handler_hits_dispatch_limit() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let repo = Arc::new(MemoryRepository::new());
        let spinner = Arc::new(Spinner::default());
        let engine = engine(&llm, &repo).with_handler(Stage::Diagnosis, spinner.clone());

        let response = engine.process_message("c1", "hej", "", "").await;

        assert_eq!(response, Response::failure("Stuck in state machine loop"));
        assert_eq!(spinner.calls.load(Ordering::SeqCst), MAX_DISPATCH);
        // failures add nothing to history
        assert_eq!(saved(&repo, "c1").history.len(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_goal_surfaces_failure() {
        let llm = Arc::new(MockLlmClient::texts(&[r#"{"intent":"GENERATE_DRAGON","reply":""}"#]));
        let repo = Arc::new(MemoryRepository::new());
        let engine = engine(&llm, &repo);

        let response = engine.process_message("c1", "Chcę smoka", "", "").await;

        assert!(!response.is_success());
        let state = saved(&repo, "c1");
        assert_eq!(state.stage, Stage::Diagnosis);
        assert!(state.active_goal_id.is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_abort_turn() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let engine = Engine::new(services(llm, vec![quest_schema()]), Arc::new(FailingRepository));

        let response = engine.process_message("c1", "/debug", "", "").await;

        assert_eq!(response.kind(), Some("SYSTEM"));
    }

    #[tokio::test]
    async fn test_mode_toggle_persists() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let repo = Arc::new(MemoryRepository::new());
        let engine = engine(&llm, &repo);

        engine.process_message("c1", "/debug", "", "").await;
        assert_eq!(saved(&repo, "c1").mode, Mode::Debug);

        engine.process_message("c1", "/standard", "", "").await;
        let state = saved(&repo, "c1");
        assert_eq!(state.mode, Mode::Standard);
        assert_eq!(state.history.len(), 4);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_state_saved_under_requested_id() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let repo = Arc::new(MemoryRepository::new());
        // document whose recorded id differs from its key
        repo.save("k1", &ConversationState::new("other")).unwrap();
        let engine = engine(&llm, &repo);

        engine.process_message("k1", "/debug", "", "").await;

        assert_eq!(saved(&repo, "k1").mode, Mode::Debug);
        assert!(repo.load("other").unwrap().is_none());
    }
}
