//! Conversation repositories
//!
//! The engine only sees [`ConversationRepository`]. Durable storage is a
//! [`FileRepository`]; [`CachedRepository`] adds the in-memory lookup cache
//! keyed by conversation id in front of any other repository.

use eyre::{Context, Result};
use sessionstore::JsonStore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use super::state::ConversationState;

/// Load/save contract for conversation state
///
/// `load` returning `Ok(None)` means "no such conversation yet".
pub trait ConversationRepository: Send + Sync {
    fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>>;

    fn save(&self, conversation_id: &str, state: &ConversationState) -> Result<()>;

    /// Ids of all stored conversations
    fn list(&self) -> Result<Vec<String>>;

    /// Remove a conversation, `true` if it existed
    fn delete(&self, conversation_id: &str) -> Result<bool>;
}

/// Ephemeral repository, state lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryRepository {
    states: Mutex<HashMap<String, ConversationState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationRepository for MemoryRepository {
    fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        Ok(states.get(conversation_id).cloned())
    }

    fn save(&self, conversation_id: &str, state: &ConversationState) -> Result<()> {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.insert(conversation_id.to_string(), state.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = states.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn delete(&self, conversation_id: &str) -> Result<bool> {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        Ok(states.remove(conversation_id).is_some())
    }
}

/// One JSON document per conversation on disk
pub struct FileRepository {
    store: JsonStore,
}

impl FileRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let store = JsonStore::open(path).context(format!("Failed to open conversation store {}", path.display()))?;
        Ok(Self { store })
    }
}

impl ConversationRepository for FileRepository {
    fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>> {
        debug!(%conversation_id, "FileRepository::load: called");
        self.store.load(conversation_id)
    }

    fn save(&self, conversation_id: &str, state: &ConversationState) -> Result<()> {
        debug!(%conversation_id, stage = %state.stage, "FileRepository::save: called");
        self.store.save(conversation_id, state)
    }

    fn list(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    fn delete(&self, conversation_id: &str) -> Result<bool> {
        self.store.delete(conversation_id)
    }
}

/// Write-through in-memory cache in front of another repository
///
/// The cache is updated before the inner save, so a failing backend still
/// leaves the latest state available to the next turn of this process.
pub struct CachedRepository<R> {
    inner: R,
    cache: Mutex<HashMap<String, ConversationState>>,
}

impl<R: ConversationRepository> CachedRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<R: ConversationRepository> ConversationRepository for CachedRepository<R> {
    fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>> {
        if let Some(state) = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(conversation_id)
        {
            debug!(%conversation_id, "CachedRepository::load: cache hit");
            return Ok(Some(state.clone()));
        }

        debug!(%conversation_id, "CachedRepository::load: cache miss");
        let loaded = self.inner.load(conversation_id)?;
        if let Some(state) = &loaded {
            self.cache
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(conversation_id.to_string(), state.clone());
        }
        Ok(loaded)
    }

    fn save(&self, conversation_id: &str, state: &ConversationState) -> Result<()> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(conversation_id.to_string(), state.clone());
        self.inner.save(conversation_id, state)
    }

    fn list(&self) -> Result<Vec<String>> {
        self.inner.list()
    }

    fn delete(&self, conversation_id: &str) -> Result<bool> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(conversation_id);
        self.inner.delete(conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Stage;
    use tempfile::TempDir;

    /// Backend that refuses every write
    struct BrokenRepository;

    impl ConversationRepository for BrokenRepository {
        fn load(&self, _conversation_id: &str) -> Result<Option<ConversationState>> {
            Ok(None)
        }

        fn save(&self, _conversation_id: &str, _state: &ConversationState) -> Result<()> {
            Err(eyre::eyre!("disk full"))
        }

        fn list(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }

        fn delete(&self, _conversation_id: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_memory_repository_roundtrip() {
        let repo = MemoryRepository::new();
        assert!(repo.load("a").unwrap().is_none());

        let mut state = ConversationState::new("a");
        state.activate_goal("GENERATE_NPC");
        repo.save("a", &state).unwrap();

        assert_eq!(repo.load("a").unwrap(), Some(state));
        assert_eq!(repo.list().unwrap(), vec!["a".to_string()]);
        assert!(repo.delete("a").unwrap());
        assert!(repo.load("a").unwrap().is_none());
    }

    #[test]
    fn test_file_repository_persists_across_instances() {
        let temp = TempDir::new().unwrap();

        let mut state = ConversationState::new("conv-1");
        state.activate_goal("GENERATE_QUEST");
        state.push_user("Chcę quest");

        FileRepository::open(temp.path()).unwrap().save("conv-1", &state).unwrap();

        let reopened = FileRepository::open(temp.path()).unwrap();
        let loaded = reopened.load("conv-1").unwrap().unwrap();
        assert_eq!(loaded.stage, Stage::Collection);
        assert_eq!(loaded.history.len(), 1);
        assert_eq!(reopened.list().unwrap(), vec!["conv-1".to_string()]);
    }

    #[test]
    fn test_cached_repository_serves_from_cache() {
        let temp = TempDir::new().unwrap();
        let repo = CachedRepository::new(FileRepository::open(temp.path()).unwrap());

        let state = ConversationState::new("c");
        repo.save("c", &state).unwrap();

        // remove the file behind the cache's back
        std::fs::remove_file(temp.path().join("c.json")).unwrap();
        assert!(repo.load("c").unwrap().is_some());

        // delete must evict, not only remove the file
        assert!(!repo.delete("c").unwrap());
        assert!(repo.load("c").unwrap().is_none());
    }

    #[test]
    fn test_cached_repository_keeps_state_when_backend_fails() {
        let repo = CachedRepository::new(BrokenRepository);
        let mut state = ConversationState::new("c");
        state.activate_goal("GENERATE_TRAIT");

        assert!(repo.save("c", &state).is_err());
        assert_eq!(repo.load("c").unwrap(), Some(state));
    }
}
