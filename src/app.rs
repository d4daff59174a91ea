use crate::planner::Action;
use crate::recents::{RecentBoard, RecentBoards, SettingsStore};
use crate::session::{BoardSession, EngineError};
use crate::store::NoteStore;
use crate::types::BoardState;
use futures_util::future::{join_all, BoxFuture};
use std::sync::{Arc, Mutex, RwLock};

/// Top-level coordinator: at most one open board at a time, the recent
/// boards list, and host event listeners. Hosts construct one `App`, feed
/// it note events, and route UI actions through it.

/// Host-side happenings the app fans out to registered listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    NoteChanged { note_id: String },
    NoteSelected { note_id: String },
}

/// A listener gets every host event and answers whether it wants to stay
/// registered. Returning false unregisters it.
pub type HostListener = Box<dyn FnMut(HostEvent) -> BoxFuture<'static, bool> + Send>;

/// Registered listeners, pruned by their own return values. All listeners
/// are polled concurrently and the retained list is rebuilt only after
/// every one of them has resolved, so a slow listener cannot observe a
/// half-pruned list.
struct ListenerHub {
    listeners: Mutex<Vec<HostListener>>,
}

impl ListenerHub {
    fn new() -> Self {
        ListenerHub {
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn add(&self, listener: HostListener) {
        self.listeners.lock().unwrap().push(listener);
    }

    async fn dispatch(&self, event: &HostEvent) {
        let mut current: Vec<HostListener> = {
            let mut slot = self.listeners.lock().unwrap();
            slot.drain(..).collect()
        };
        if current.is_empty() {
            return;
        }

        let pending: Vec<BoxFuture<'static, bool>> =
            current.iter_mut().map(|l| l(event.clone())).collect();
        let verdicts = join_all(pending).await;

        let mut retained: Vec<HostListener> = current
            .into_iter()
            .zip(verdicts)
            .filter(|(_, keep)| *keep)
            .map(|(listener, _)| listener)
            .collect();

        // Listeners registered while a dispatch was in flight live in the
        // slot; keep them after the survivors.
        let mut slot = self.listeners.lock().unwrap();
        retained.append(&mut slot);
        *slot = retained;
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

pub struct App {
    store: Arc<dyn NoteStore>,
    settings: Arc<dyn SettingsStore>,
    recents: RecentBoards,
    session: RwLock<Option<Arc<BoardSession>>>,
    listeners: ListenerHub,
}

impl App {
    pub async fn new(store: Arc<dyn NoteStore>, settings: Arc<dyn SettingsStore>) -> App {
        let recents = match RecentBoards::load(settings.as_ref()).await {
            Ok(recents) => recents,
            Err(err) => {
                log::warn!(
                    target: "kanri.app",
                    "recent boards unreadable, starting empty: {}",
                    err
                );
                RecentBoards::new()
            }
        };
        App {
            store,
            settings,
            recents,
            session: RwLock::new(None),
            listeners: ListenerHub::new(),
        }
    }

    /// Open the board carried by `note_id`, replacing any open board. The
    /// previous session is torn down only after the new one opened, so a
    /// failed open leaves the current board running.
    pub async fn open_board(&self, note_id: &str) -> Result<Arc<BoardSession>, EngineError> {
        let session = BoardSession::open(self.store.clone(), note_id).await?;

        let previous = self.session.write().unwrap().replace(session.clone());
        if let Some(previous) = previous {
            previous.close().await;
        }

        self.recents.touch(note_id, &session.name());
        self.recents.save(self.settings.as_ref()).await;
        Ok(session)
    }

    pub async fn close_board(&self) {
        let previous = self.session.write().unwrap().take();
        if let Some(previous) = previous {
            previous.close().await;
        }
    }

    pub fn session(&self) -> Option<Arc<BoardSession>> {
        self.session.read().unwrap().clone()
    }

    /// Board for the UI to draw right now. Without an open board this is
    /// the built-in placeholder, never an error.
    pub fn board_state(&self) -> BoardState {
        match self.session() {
            Some(session) => session.current_state(),
            None => BoardState::no_board(),
        }
    }

    pub async fn handle_action(&self, action: Action) -> Result<(), EngineError> {
        match self.session() {
            Some(session) => session.handle_action(action).await,
            None => {
                log::debug!(target: "kanri.app", "ignoring {:?}, no open board", action);
                Ok(())
            }
        }
    }

    /// Feed a host note-change notification to listeners and the open
    /// session. A refresh superseded by a newer one is not an error.
    pub async fn handle_note_change(&self, note_id: &str) -> Result<(), EngineError> {
        self.listeners
            .dispatch(&HostEvent::NoteChanged {
                note_id: note_id.to_string(),
            })
            .await;

        let Some(session) = self.session() else {
            return Ok(());
        };
        match session.handle_note_change(note_id).await {
            Err(err) if err.is_aborted() => Ok(()),
            other => other,
        }
    }

    /// Selection changes only reach listeners; which note the host shows
    /// does not affect an open board.
    pub async fn handle_note_selected(&self, note_id: &str) {
        self.listeners
            .dispatch(&HostEvent::NoteSelected {
                note_id: note_id.to_string(),
            })
            .await;
    }

    pub fn add_listener(&self, listener: HostListener) {
        self.listeners.add(listener);
    }

    pub fn recent_boards(&self) -> Vec<RecentBoard> {
        self.recents.entries()
    }

    pub async fn set_bookmarked(&self, note_id: &str, bookmarked: bool) -> bool {
        let changed = self.recents.set_bookmarked(note_id, bookmarked);
        if changed {
            self.recents.save(self.settings.as_ref()).await;
        }
        changed
    }

    pub async fn remove_recent(&self, note_id: &str) {
        self.recents.remove(note_id);
        self.recents.save(self.settings.as_ref()).await;
    }
}
