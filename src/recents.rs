use crate::refresh::RefreshScheduler;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// Most-recently-used list of boards, persisted through the host's
/// settings. Saves are debounced and skipped when nothing changed, so
/// opening boards in quick succession costs one settings write.

pub const RECENT_BOARDS_KEY: &str = "recentBoards";
pub const RECENT_BOARDS_MAX: usize = 100;
const SAVE_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Key-value settings owned by the host app.
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentBoard {
    pub note_id: String,
    pub title: String,
    #[serde(default)]
    pub bookmarked: bool,
}

pub struct RecentBoards {
    entries: Mutex<Vec<RecentBoard>>,
    saver: RefreshScheduler,
}

impl RecentBoards {
    pub fn new() -> Self {
        Self::with_save_debounce(SAVE_DEBOUNCE)
    }

    pub fn with_save_debounce(window: Duration) -> Self {
        RecentBoards {
            entries: Mutex::new(Vec::new()),
            saver: RefreshScheduler::new(window),
        }
    }

    /// Load the persisted list. A missing or unreadable value starts the
    /// list empty rather than failing the caller.
    pub async fn load(settings: &dyn SettingsStore) -> Result<Self, StoreError> {
        let recents = RecentBoards::new();
        if let Some(raw) = settings.get(RECENT_BOARDS_KEY).await? {
            match serde_json::from_str::<Vec<RecentBoard>>(&raw) {
                Ok(entries) => *recents.entries.lock().unwrap() = entries,
                Err(err) => {
                    log::warn!(target: "kanri.recents", "discarding unreadable recents list: {}", err);
                }
            }
        }
        Ok(recents)
    }

    pub fn entries(&self) -> Vec<RecentBoard> {
        self.entries.lock().unwrap().clone()
    }

    /// Move a board to the front, refreshing its title. New entries start
    /// unbookmarked; existing entries keep their bookmark. The list is
    /// capped, dropping the least recent entry.
    pub fn touch(&self, note_id: &str, title: &str) {
        let mut entries = self.entries.lock().unwrap();
        let entry = match entries.iter().position(|e| e.note_id == note_id) {
            Some(index) => {
                let mut entry = entries.remove(index);
                entry.title = title.to_string();
                entry
            }
            None => RecentBoard {
                note_id: note_id.to_string(),
                title: title.to_string(),
                bookmarked: false,
            },
        };
        entries.insert(0, entry);
        entries.truncate(RECENT_BOARDS_MAX);
    }

    /// Returns false when the board is not in the list.
    pub fn set_bookmarked(&self, note_id: &str, bookmarked: bool) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|e| e.note_id == note_id) {
            Some(entry) => {
                entry.bookmarked = bookmarked;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, note_id: &str) {
        self.entries.lock().unwrap().retain(|e| e.note_id != note_id);
    }

    /// Persist the list, debounced. Only the newest pending save runs, and
    /// a save that would write the already-stored value is skipped. Save
    /// failures are logged; a stale recents list is not worth failing an
    /// action over.
    pub async fn save(&self, settings: &dyn SettingsStore) {
        let serialized = {
            let entries = self.entries.lock().unwrap();
            match serde_json::to_string(&*entries) {
                Ok(serialized) => serialized,
                Err(err) => {
                    log::warn!(target: "kanri.recents", "could not serialize recents: {}", err);
                    return;
                }
            }
        };

        let result = self
            .saver
            .debounce(async {
                match settings.get(RECENT_BOARDS_KEY).await {
                    Ok(stored) if stored.as_deref() == Some(serialized.as_str()) => {}
                    Ok(_) => {
                        if let Err(err) = settings.set(RECENT_BOARDS_KEY, &serialized).await {
                            log::warn!(target: "kanri.recents", "could not save recents: {}", err);
                        }
                    }
                    Err(err) => {
                        log::warn!(target: "kanri.recents", "could not read stored recents: {}", err);
                    }
                }
            })
            .await;
        // A superseded save is not a failure; the newer one covers it.
        let _ = result;
    }
}

impl Default for RecentBoards {
    fn default() -> Self {
        RecentBoards::new()
    }
}

/// In-memory settings for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<BTreeMap<String, String>>,
    writes: Mutex<usize>,
}

impl MemorySettings {
    pub fn new() -> Self {
        MemorySettings::default()
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().unwrap().insert(key.to_string(), value.to_string());
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }
}
