pub mod memory;

use crate::types::{NoteRecord, UpdateQuery};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Store boundary. The engine never talks to a host app directly; it reads
/// and writes through this trait, and everything it assumes about the store
/// is written down here:
///
/// - `get_note` reads committed state.
/// - `list_notes` may serve a stale query index; a note that was just
///   written or created can be missing from it for a while.
/// - `apply` treats `put` bodies as merge-patches of note metadata.
#[async_trait::async_trait]
pub trait NoteStore: Send + Sync {
    async fn get_note(&self, id: &str) -> Result<NoteRecord, StoreError>;
    async fn get_note_body(&self, id: &str) -> Result<String, StoreError>;
    async fn list_notes(&self) -> Result<Vec<NoteRecord>, StoreError>;
    async fn create_note(&self, title: &str, parent_id: &str) -> Result<NoteRecord, StoreError>;
    async fn apply(&self, query: &UpdateQuery) -> Result<(), StoreError>;
    async fn list_notebooks(&self) -> Result<Vec<Notebook>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub parent_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Note not found: {0}")]
    NoteNotFound(String),
    #[error("invalid update query: {0}")]
    InvalidQuery(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Poll the query index until it returns the note or the timeout passes.
/// Read errors count as "not there yet". Callers treat a `false` as a slow
/// index, not a failure; the note cache covers the gap either way.
pub async fn wait_for_note(
    store: &dyn NoteStore,
    note_id: &str,
    timeout: Duration,
    interval: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(notes) = store.list_notes().await {
            if notes.iter().any(|n| n.id == note_id) {
                return true;
            }
        }
        if tokio::time::Instant::now() + interval > deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}
