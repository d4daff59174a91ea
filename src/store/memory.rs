use super::{NoteStore, Notebook, StoreError};
use crate::types::{apply_note_patch, NoteRecord, QueryKind, UpdateQuery};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use uuid::Uuid;

/// In-memory store for tests and embedding.
///
/// It deliberately reproduces the consistency model of a real note host:
/// `get_note` reads committed records, while `list_notes` answers from a
/// query index that only catches up on `reindex`. Constructed via `new` the
/// index follows writes immediately; via `with_index_lag` it lags until
/// `reindex` is called, which is how the eventually consistent paths get
/// exercised.
pub struct MemoryNoteStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    notes: BTreeMap<String, StoredNote>,
    index: BTreeSet<String>,
    notebooks: BTreeMap<String, Notebook>,
    auto_reindex: bool,
    fail_next: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredNote {
    record: NoteRecord,
    body: String,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        MemoryNoteStore {
            inner: Mutex::new(Inner {
                auto_reindex: true,
                ..Inner::default()
            }),
        }
    }

    /// A store whose query index lags behind writes until `reindex`.
    pub fn with_index_lag() -> Self {
        MemoryNoteStore {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Bring the query index up to date with committed records.
    pub fn reindex(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.index = inner.notes.keys().cloned().collect();
    }

    /// Seed a note. Seeded notes are indexed right away in both modes.
    pub fn insert_note(&self, record: NoteRecord) {
        self.insert_note_with_body(record, String::new());
    }

    pub fn insert_note_with_body(&self, record: NoteRecord, body: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.index.insert(record.id.clone());
        inner.notes.insert(
            record.id.clone(),
            StoredNote {
                record,
                body: body.into(),
            },
        );
    }

    pub fn add_notebook(&self, id: &str, title: &str, parent_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.notebooks.insert(
            id.to_string(),
            Notebook {
                id: id.to_string(),
                title: title.to_string(),
                parent_id: parent_id.to_string(),
            },
        );
    }

    /// Make the next `apply` fail as if the store were unreachable.
    pub fn fail_next(&self, message: &str) {
        self.inner.lock().unwrap().fail_next = Some(message.to_string());
    }

    /// Committed record, bypassing the trait. Test convenience.
    pub fn note(&self, id: &str) -> Option<NoteRecord> {
        self.inner.lock().unwrap().notes.get(id).map(|n| n.record.clone())
    }

    pub fn body(&self, id: &str) -> Option<String> {
        self.inner.lock().unwrap().notes.get(id).map(|n| n.body.clone())
    }
}

impl Default for MemoryNoteStore {
    fn default() -> Self {
        MemoryNoteStore::new()
    }
}

fn note_path(query: &UpdateQuery) -> Result<&str, StoreError> {
    query
        .note_id()
        .ok_or_else(|| StoreError::InvalidQuery(format!("unsupported path {:?}", query.path)))
}

#[async_trait::async_trait]
impl NoteStore for MemoryNoteStore {
    async fn get_note(&self, id: &str) -> Result<NoteRecord, StoreError> {
        self.note(id).ok_or_else(|| StoreError::NoteNotFound(id.to_string()))
    }

    async fn get_note_body(&self, id: &str) -> Result<String, StoreError> {
        self.body(id).ok_or_else(|| StoreError::NoteNotFound(id.to_string()))
    }

    async fn list_notes(&self) -> Result<Vec<NoteRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        // The index may hold ids whose records are already gone; skip them.
        Ok(inner
            .index
            .iter()
            .filter_map(|id| inner.notes.get(id).map(|n| n.record.clone()))
            .collect())
    }

    async fn create_note(&self, title: &str, parent_id: &str) -> Result<NoteRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let record = NoteRecord {
            id: Uuid::new_v4().simple().to_string(),
            title: title.to_string(),
            parent_id: parent_id.to_string(),
            created_time: Utc::now().timestamp_millis(),
            ..NoteRecord::default()
        };
        if inner.auto_reindex {
            inner.index.insert(record.id.clone());
        }
        inner.notes.insert(
            record.id.clone(),
            StoredNote {
                record: record.clone(),
                body: String::new(),
            },
        );
        Ok(record)
    }

    async fn apply(&self, query: &UpdateQuery) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(message) = inner.fail_next.take() {
            return Err(StoreError::Unavailable(message));
        }
        let id = note_path(query)?.to_string();
        match query.kind {
            QueryKind::Put => {
                let note = inner
                    .notes
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::NoteNotFound(id.clone()))?;
                if let Some(body) = &query.body {
                    apply_note_patch(&mut note.record, body);
                    if let Some(text) = body.get("body").and_then(|b| b.as_str()) {
                        note.body = text.to_string();
                    }
                }
            }
            QueryKind::Delete => {
                inner.notes.remove(&id);
                if inner.auto_reindex {
                    inner.index.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn list_notebooks(&self) -> Result<Vec<Notebook>, StoreError> {
        Ok(self.inner.lock().unwrap().notebooks.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::is_note_id;
    use crate::store::wait_for_note;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn put(id: &str, body: serde_json::Value) -> UpdateQuery {
        UpdateQuery::put(vec!["notes".to_string(), id.to_string()], body)
    }

    #[tokio::test]
    async fn test_created_notes_get_well_formed_ids() {
        let store = MemoryNoteStore::new();
        let record = store.create_note("Untitled", "nb1").await.unwrap();
        assert!(is_note_id(&record.id));
        assert_eq!(record.parent_id, "nb1");
        assert!(record.created_time > 0);
    }

    #[tokio::test]
    async fn test_index_lags_until_reindex() {
        let store = MemoryNoteStore::with_index_lag();
        let record = store.create_note("Untitled", "nb1").await.unwrap();

        // Committed read sees the note, the query index does not yet.
        assert!(store.get_note(&record.id).await.is_ok());
        assert!(store.list_notes().await.unwrap().is_empty());

        store.reindex();
        let listed = store.list_notes().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, record.id);
    }

    #[tokio::test]
    async fn test_put_merges_metadata_patch() {
        let store = MemoryNoteStore::new();
        let mut seed = NoteRecord::new("n1", "before");
        seed.tags = BTreeSet::from(["todo".to_string()]);
        seed.custom_fields.insert("status".to_string(), json!("open"));
        store.insert_note(seed);

        store
            .apply(&put(
                "n1",
                json!({ "tags": ["done"], "order": 42, "parent_id": "nb2", "status": null }),
            ))
            .await
            .unwrap();

        let note = store.note("n1").unwrap();
        assert_eq!(note.title, "before");
        assert_eq!(note.tags, BTreeSet::from(["done".to_string()]));
        assert_eq!(note.order, 42);
        assert_eq!(note.parent_id, "nb2");
        assert!(note.custom_fields.is_empty());
    }

    #[tokio::test]
    async fn test_put_body_key_rewrites_note_body() {
        let store = MemoryNoteStore::new();
        store.insert_note_with_body(NoteRecord::new("n1", "board"), "old body");

        store
            .apply(&put("n1", json!({ "body": "new body" })))
            .await
            .unwrap();

        assert_eq!(store.body("n1").as_deref(), Some("new body"));
        // The body never leaks into metadata fields.
        assert!(store.note("n1").unwrap().custom_fields.is_empty());
    }

    #[tokio::test]
    async fn test_delete_with_lagging_index_keeps_list_consistent() {
        let store = MemoryNoteStore::with_index_lag();
        store.insert_note(NoteRecord::new("n1", "doomed"));

        store
            .apply(&UpdateQuery::delete(vec!["notes".to_string(), "n1".to_string()]))
            .await
            .unwrap();

        // The index still carries the id, but the record is gone.
        assert!(store.list_notes().await.unwrap().is_empty());
        assert!(matches!(
            store.get_note("n1").await,
            Err(StoreError::NoteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_on_missing_note_and_bad_path_fail() {
        let store = MemoryNoteStore::new();
        assert!(matches!(
            store.apply(&put("ghost", json!({}))).await,
            Err(StoreError::NoteNotFound(_))
        ));
        let bad = UpdateQuery::put(vec!["folders".to_string(), "x".to_string()], json!({}));
        assert!(matches!(
            store.apply(&bad).await,
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_next_fails_exactly_once() {
        let store = MemoryNoteStore::new();
        store.insert_note(NoteRecord::new("n1", "x"));
        store.fail_next("offline");

        assert!(matches!(
            store.apply(&put("n1", json!({ "order": 1 }))).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.apply(&put("n1", json!({ "order": 1 }))).await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_note_sees_note_after_reindex() {
        let store = MemoryNoteStore::with_index_lag();
        let record = store.create_note("late", "nb1").await.unwrap();

        let waiter = wait_for_note(
            &store,
            &record.id,
            Duration::from_millis(200),
            Duration::from_millis(10),
        );
        let reindexer = async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            store.reindex();
        };
        let (found, _) = tokio::join!(waiter, reindexer);
        assert!(found);
    }

    #[tokio::test]
    async fn test_wait_for_note_times_out() {
        let store = MemoryNoteStore::with_index_lag();
        let record = store.create_note("late", "nb1").await.unwrap();

        let found = wait_for_note(
            &store,
            &record.id,
            Duration::from_millis(30),
            Duration::from_millis(10),
        )
        .await;
        assert!(!found);
    }
}
