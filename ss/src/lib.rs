//! SessionStore - one JSON document per id
//!
//! A deliberately small persistence layer: every document lives in its own
//! file, writes go through a temp file and a rename, and an exclusive lock
//! file serializes writers from different processes.
//!
//! # Layout
//!
//! ```text
//! {store_dir}/
//! ├── .lock            # fs2 exclusive lock held during writes
//! ├── {id}.json
//! └── ...
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sessionstore::JsonStore;
//!
//! let store = JsonStore::open("/tmp/sessions")?;
//! store.save("abc", &serde_json::json!({"stage": "DIAGNOSIS"}))?;
//! let doc: Option<serde_json::Value> = store.load("abc")?;
//! ```

mod store;

pub use store::{DocumentId, JsonStore, validate_id};

/// File extension for stored documents
pub const DOCUMENT_EXTENSION: &str = "json";
