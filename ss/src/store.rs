//! Core JsonStore implementation

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::DOCUMENT_EXTENSION;

/// Identifier of a stored document
pub type DocumentId = String;

const LOCK_FILE: &str = ".lock";

/// Check that an id is safe to use as a file name
///
/// Accepts ASCII letters, digits, `_`, `-` and `.`; rejects empty ids and ids
/// starting with a dot so that documents never collide with the lock file.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(eyre!("Document id must not be empty"));
    }
    if id.starts_with('.') {
        return Err(eyre!("Document id must not start with '.': {}", id));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(eyre!("Invalid character {:?} in document id: {}", bad, id));
    }
    Ok(())
}

/// Directory-backed store of JSON documents
pub struct JsonStore {
    /// Base path for storage
    base_path: PathBuf,
}

impl JsonStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;
        debug!(?base_path, "Opened session store");
        Ok(Self { base_path })
    }

    /// Base directory of this store
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{}.{}", id, DOCUMENT_EXTENSION))
    }

    fn lock(&self) -> Result<fs::File> {
        let lock_path = self.base_path.join(LOCK_FILE);
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .context(format!("Failed to open lock file: {}", lock_path.display()))?;
        file.lock_exclusive().context("Failed to acquire store lock")?;
        Ok(file)
    }

    /// Load a document, `None` when it does not exist
    pub fn load<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        debug!(%id, "load: called");
        validate_id(id)?;
        let path = self.document_path(id);
        if !path.exists() {
            debug!(%id, "load: no document");
            return Ok(None);
        }

        let content = fs::read_to_string(&path).context(format!("Failed to read document: {}", path.display()))?;
        let doc = serde_json::from_str(&content).context(format!("Failed to parse document: {}", path.display()))?;
        Ok(Some(doc))
    }

    /// Save a document, replacing any previous version atomically
    pub fn save<T: Serialize>(&self, id: &str, doc: &T) -> Result<()> {
        debug!(%id, "save: called");
        validate_id(id)?;
        let content = serde_json::to_string_pretty(doc)?;

        let lock = self.lock()?;
        let path = self.document_path(id);
        let tmp_path = self.base_path.join(format!(".{}.tmp", id));
        {
            let mut tmp = fs::File::create(&tmp_path)
                .context(format!("Failed to create temp file: {}", tmp_path.display()))?;
            tmp.write_all(content.as_bytes())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &path).context(format!("Failed to replace document: {}", path.display()))?;
        FileExt::unlock(&lock)?;

        debug!(%id, bytes = content.len(), "save: written");
        Ok(())
    }

    /// List all document ids, sorted
    pub fn list(&self) -> Result<Vec<DocumentId>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == DOCUMENT_EXTENSION).unwrap_or(false)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && !stem.starts_with('.')
            {
                ids.push(stem.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Delete a document; deleting a missing document is not an error
    pub fn delete(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let lock = self.lock()?;
        let path = self.document_path(id);
        let existed = path.exists();
        if existed {
            fs::remove_file(&path)?;
            info!(%id, "Deleted document");
        }
        FileExt::unlock(&lock)?;
        Ok(existed)
    }
}
