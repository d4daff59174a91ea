use crate::board::{build_board, BoardScope};
use crate::cache::NoteCache;
use crate::config::{self, ConfigError};
use crate::links::{classify_link, LinkTarget};
use crate::markdown::{self, MirrorStyle};
use crate::planner::{plan, Action, PlanContext, PlanError};
use crate::postprocess::{Pipeline, PipelineState};
use crate::queue::{ActionQueue, QueueError};
use crate::refresh::RefreshScheduler;
use crate::rules::ColumnRule;
use crate::store::{wait_for_note, NoteStore, Notebook, StoreError};
use crate::types::{
    apply_note_patch, BoardState, Command, Message, NoteRecord, QueryKind, Severity, UpdateQuery,
};
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

/// A live board: one open board note, its compiled rules, and the machinery
/// that keeps the rendered board and the store consistent with each other.
///
/// All mutating actions go through a single-flight queue, so two drags can
/// never interleave their store writes. Reads re-materialize the board from
/// a fresh store listing merged with the note cache; the session never
/// edits a board state in place.

/// Banner id shown while the board note's config fails to parse.
pub const CONFIG_INVALID_ID: &str = "board-config-invalid";

const RULE_UNSATISFIABLE_WARNING: &str =
    "Cannot move note: the target column's rule cannot be satisfied.";
const STALE_BOARD_WARNING: &str = "That note or column is no longer on the board.";

const CREATED_NOTE_WAIT: Duration = Duration::from_millis(500);
const CREATED_NOTE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid board config: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The work was superseded before it ran. An outcome, not a failure.
    #[error("superseded before it could run")]
    Aborted,
}

impl From<QueueError> for EngineError {
    fn from(_: QueueError) -> Self {
        EngineError::Aborted
    }
}

impl EngineError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, EngineError::Aborted)
    }
}

/// What a session tells the outside world. UI hosts subscribe and react;
/// the engine itself never talks to a UI directly.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    BoardRefreshed(BoardState),
    Command(Command),
    OpenNote { note_id: String, new_window: bool },
    OpenLink { url: String },
    SettingsRequested { target: String },
}

/// Compiled form of the board note's config, swapped atomically on reload.
struct LoadedBoard {
    rules: Vec<ColumnRule>,
    scope: BoardScope,
    root_notebook_id: Option<String>,
    mirror: Option<MirrorStyle>,
}

impl LoadedBoard {
    async fn resolve(
        store: &dyn NoteStore,
        config_note_id: &str,
        config: &config::BoardConfig,
    ) -> Result<LoadedBoard, EngineError> {
        let notebooks = store.list_notebooks().await?;
        let mut by_title: BTreeMap<String, String> = BTreeMap::new();
        for notebook in &notebooks {
            by_title
                .entry(notebook.title.clone())
                .or_insert_with(|| notebook.id.clone());
        }

        let rules = config.compile_rules(&by_title);
        let root_notebook_id = config
            .filters
            .root_notebook
            .as_ref()
            .and_then(|title| by_title.get(title).cloned());
        if config.filters.root_notebook.is_some() && root_notebook_id.is_none() {
            log::warn!(
                target: "kanri.session",
                "root notebook '{}' not found; board is not notebook-scoped",
                config.filters.root_notebook.as_deref().unwrap_or_default()
            );
        }
        let notebook_ids = root_notebook_id
            .as_ref()
            .map(|id| subtree_ids(id, &notebooks));

        Ok(LoadedBoard {
            rules,
            scope: BoardScope {
                base_tags: config.filters.base_tags(),
                notebook_ids,
                config_note_id: config_note_id.to_string(),
            },
            root_notebook_id,
            mirror: config.display.markdown,
        })
    }
}

/// A notebook id plus all its descendants.
fn subtree_ids(root_id: &str, notebooks: &[Notebook]) -> BTreeSet<String> {
    let mut ids = BTreeSet::from([root_id.to_string()]);
    loop {
        let before = ids.len();
        for notebook in notebooks {
            if ids.contains(&notebook.parent_id) {
                ids.insert(notebook.id.clone());
            }
        }
        if ids.len() == before {
            return ids;
        }
    }
}

pub struct BoardSession {
    store: Arc<dyn NoteStore>,
    config_note_id: String,
    name: RwLock<String>,
    loaded: RwLock<Arc<LoadedBoard>>,
    cache: Mutex<NoteCache>,
    banners: Mutex<Vec<Message>>,
    state: RwLock<BoardState>,
    queue: ActionQueue,
    refresh: RefreshScheduler,
    pipeline: Pipeline,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for BoardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardSession")
            .field("config_note_id", &self.config_note_id)
            .finish_non_exhaustive()
    }
}

impl BoardSession {
    /// Open the board carried by `config_note_id`. Fails when the note is
    /// missing or its config does not validate; an existing session stays
    /// untouched in that case because none is replaced until this returns.
    pub async fn open(
        store: Arc<dyn NoteStore>,
        config_note_id: &str,
    ) -> Result<Arc<BoardSession>, EngineError> {
        let note = store.get_note(config_note_id).await?;
        let body = store.get_note_body(config_note_id).await?;
        let parsed = config::parse_board_config(&body)?;
        let loaded = LoadedBoard::resolve(store.as_ref(), config_note_id, &parsed).await?;

        let (events, _) = broadcast::channel(256);
        let session = Arc::new(BoardSession {
            store,
            config_note_id: config_note_id.to_string(),
            name: RwLock::new(note.title),
            loaded: RwLock::new(Arc::new(loaded)),
            cache: Mutex::new(NoteCache::new()),
            banners: Mutex::new(Vec::new()),
            state: RwLock::new(BoardState::no_board()),
            queue: ActionQueue::new(),
            refresh: RefreshScheduler::default(),
            pipeline: Pipeline::standard(),
            events,
        });

        let state = session.materialize().await?;
        session.publish_state(state);
        log::info!(target: "kanri.session", "opened board '{}'", session.name());
        Ok(session)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn name(&self) -> String {
        self.name.read().unwrap().clone()
    }

    pub fn config_note_id(&self) -> &str {
        &self.config_note_id
    }

    pub fn current_state(&self) -> BoardState {
        self.state.read().unwrap().clone()
    }

    /// Handle one UI action. Mutations are queued and run one at a time;
    /// everything else is answered immediately.
    pub async fn handle_action(&self, action: Action) -> Result<(), EngineError> {
        log::debug!(target: "kanri.session", "handling {:?}", action);
        if action.is_mutation() {
            return match self.queue.enqueue(self.mutation_cycle(action)).await {
                Ok(outcome) => outcome,
                Err(QueueError::Aborted) => Err(EngineError::Aborted),
            };
        }

        match action {
            Action::Load => self.run_queued_refresh(false).await,
            Action::Poll { show_reloaded_toast } => {
                self.run_queued_refresh(show_reloaded_toast).await
            }
            Action::OpenNote { note_id } => {
                self.emit(SessionEvent::OpenNote {
                    note_id,
                    new_window: false,
                });
                Ok(())
            }
            Action::OpenNoteInNewWindow { note_id } => {
                self.emit(SessionEvent::OpenNote {
                    note_id,
                    new_window: true,
                });
                Ok(())
            }
            Action::OpenConfigNote => {
                self.emit(SessionEvent::OpenNote {
                    note_id: self.config_note_id.clone(),
                    new_window: false,
                });
                Ok(())
            }
            Action::Settings { target } => {
                self.emit(SessionEvent::SettingsRequested { target });
                Ok(())
            }
            Action::MessageAction {
                message_id,
                action_name,
            } => {
                self.handle_message_action(&message_id, &action_name);
                Ok(())
            }
            Action::ColumnTitleClicked { link } => {
                self.handle_column_link(&link);
                Ok(())
            }
            // Mutations were dispatched above.
            _ => Ok(()),
        }
    }

    /// React to a note change reported by the host. Changes to the board
    /// note reload the config; everything else refreshes the board, with
    /// bursts coalesced by the debouncer.
    pub async fn handle_note_change(&self, note_id: &str) -> Result<(), EngineError> {
        if note_id == self.config_note_id {
            return match self.queue.enqueue(self.reload_config()).await {
                Ok(outcome) => outcome,
                Err(QueueError::Aborted) => Err(EngineError::Aborted),
            };
        }
        self.refresh_debounced().await
    }

    /// Re-materialize and publish once the debounce window passes. Resolves
    /// to `Aborted` when a newer refresh superseded this one.
    pub async fn refresh_debounced(&self) -> Result<(), EngineError> {
        let result = self
            .refresh
            .debounce(async {
                match self.materialize().await {
                    Ok(state) => self.publish_state(state),
                    Err(err) => {
                        log::warn!(target: "kanri.session", "refresh failed: {}", err);
                    }
                }
            })
            .await;
        result.map_err(EngineError::from)
    }

    /// Stop accepting queued work and wait for the in-flight action.
    pub async fn close(&self) {
        self.queue.cancel_pending();
        self.queue.drained().await;
        log::info!(target: "kanri.session", "closed board '{}'", self.name());
    }

    async fn run_queued_refresh(&self, toast: bool) -> Result<(), EngineError> {
        let outcome = self
            .queue
            .enqueue(async {
                let state = self.materialize().await?;
                self.publish_state(state);
                if toast {
                    self.emit(SessionEvent::Command(Command::Warning {
                        message: "Board reloaded".to_string(),
                        duration: Some(2000),
                    }));
                }
                Ok(())
            })
            .await;
        match outcome {
            Ok(result) => result,
            Err(QueueError::Aborted) => Err(EngineError::Aborted),
        }
    }

    /// One full mutation: plan against a fresh snapshot, post-process,
    /// write, re-materialize, publish, mirror.
    async fn mutation_cycle(&self, action: Action) -> Result<(), EngineError> {
        if let Action::DeleteCol { col_name } = &action {
            return self.delete_column(col_name).await;
        }

        let (action, created) = self.prepare_note_creation(action).await?;

        let state = self.materialize().await?;
        let loaded = self.loaded.read().unwrap().clone();
        let ctx = PlanContext {
            columns: &loaded.rules,
            base_tags: &loaded.scope.base_tags,
            root_notebook_id: loaded.root_notebook_id.as_deref(),
            outside_note: created.as_ref(),
            now_ms: Utc::now().timestamp_millis(),
        };

        let updates = match plan(&action, &state, &ctx) {
            Ok(updates) => updates,
            Err(err @ PlanError::RuleUnsatisfiable { .. }) => {
                log::warn!(target: "kanri.session", "plan rejected: {}", err);
                self.emit(SessionEvent::Command(Command::Warning {
                    message: RULE_UNSATISFIABLE_WARNING.to_string(),
                    duration: None,
                }));
                return Ok(());
            }
            Err(err) => {
                // The UI acted on a board that no longer exists in that
                // shape; republish the truth instead of failing.
                log::warn!(target: "kanri.session", "plan rejected: {}", err);
                self.emit(SessionEvent::Command(Command::Warning {
                    message: STALE_BOARD_WARNING.to_string(),
                    duration: Some(3000),
                }));
                let state = self.materialize().await?;
                self.publish_state(state);
                return Ok(());
            }
        };

        let processed = self.pipeline.process(PipelineState::new(updates));
        for command in &processed.commands {
            if let Command::ShowBanner { messages } = command {
                self.push_banners(messages);
            }
            self.emit(SessionEvent::Command(command.clone()));
        }

        for update in &processed.updates {
            if let Err(err) = self.store.apply(update).await {
                log::error!(
                    target: "kanri.session",
                    "store write failed, dropping rest of plan: {}",
                    err
                );
                return Err(err.into());
            }
            self.absorb(update, &state);
        }

        let new_state = self.materialize().await?;
        self.publish_state(new_state.clone());
        self.write_mirror(&new_state).await;
        Ok(())
    }

    /// `NewNote` actions arrive without a note. Create it, prime the cache
    /// so the next materialization shows it even while the store's query
    /// index lags, and rewrite the action with the created id.
    async fn prepare_note_creation(
        &self,
        action: Action,
    ) -> Result<(Action, Option<NoteRecord>), EngineError> {
        let col_name = match action {
            Action::NewNote { col_name, note_id: None } => col_name,
            other => return Ok((other, None)),
        };

        let parent = {
            let loaded = self.loaded.read().unwrap();
            loaded.root_notebook_id.clone().unwrap_or_default()
        };
        let record = self.store.create_note("Untitled", &parent).await?;
        self.cache.lock().unwrap().upsert(record.clone());

        if !wait_for_note(self.store.as_ref(), &record.id, CREATED_NOTE_WAIT, CREATED_NOTE_POLL).await
        {
            log::debug!(
                target: "kanri.session",
                "created note {} not indexed yet; cache covers it",
                record.id
            );
        }

        Ok((
            Action::NewNote {
                col_name,
                note_id: Some(record.id.clone()),
            },
            Some(record),
        ))
    }

    async fn delete_column(&self, col_name: &str) -> Result<(), EngineError> {
        let body = self.store.get_note_body(&self.config_note_id).await?;
        let mut parsed = config::parse_board_config(&body)?;
        if !parsed.remove_column(col_name) {
            self.emit(SessionEvent::Command(Command::Warning {
                message: format!("No column named '{}'", col_name),
                duration: Some(3000),
            }));
            return Ok(());
        }

        let new_body = config::replace_fence(&body, &parsed)?;
        self.store
            .apply(&UpdateQuery::put(
                vec!["notes".to_string(), self.config_note_id.clone()],
                json!({ "body": new_body }),
            ))
            .await?;

        let loaded = LoadedBoard::resolve(self.store.as_ref(), &self.config_note_id, &parsed).await?;
        *self.loaded.write().unwrap() = Arc::new(loaded);

        let state = self.materialize().await?;
        self.publish_state(state.clone());
        self.write_mirror(&state).await;
        Ok(())
    }

    /// Re-read the board note and swap in its config. An invalid config
    /// keeps the previous one and raises a banner instead; the next valid
    /// reload clears it.
    async fn reload_config(&self) -> Result<(), EngineError> {
        let body = self.store.get_note_body(&self.config_note_id).await?;
        match config::parse_board_config(&body) {
            Ok(parsed) => {
                let loaded =
                    LoadedBoard::resolve(self.store.as_ref(), &self.config_note_id, &parsed).await?;
                *self.loaded.write().unwrap() = Arc::new(loaded);
                if let Ok(note) = self.store.get_note(&self.config_note_id).await {
                    *self.name.write().unwrap() = note.title;
                }
                self.banners
                    .lock()
                    .unwrap()
                    .retain(|m| m.id != CONFIG_INVALID_ID);
                log::info!(target: "kanri.session", "board config reloaded");
            }
            Err(err) => {
                log::warn!(target: "kanri.session", "keeping previous config: {}", err);
                self.push_banners(&[Message {
                    id: CONFIG_INVALID_ID.to_string(),
                    title: "The board config has errors".to_string(),
                    severity: Severity::Error,
                    actions: vec!["clear".to_string()],
                    details: err.to_string(),
                }]);
            }
        }

        let state = self.materialize().await?;
        self.publish_state(state);
        Ok(())
    }

    async fn materialize(&self) -> Result<BoardState, EngineError> {
        let fresh = self.store.list_notes().await?;
        let merged = self.cache.lock().unwrap().merge(fresh);
        let loaded = self.loaded.read().unwrap().clone();
        let mut state = build_board(&self.name(), &merged, &loaded.rules, &loaded.scope);
        state.messages = self.banners.lock().unwrap().clone();
        Ok(state)
    }

    /// Fold an executed write into the cache so materializations reflect
    /// it even while the store's query index lags.
    fn absorb(&self, update: &UpdateQuery, pre_state: &BoardState) {
        let Some(note_id) = update.note_id() else { return };
        let mut cache = self.cache.lock().unwrap();
        match update.kind {
            QueryKind::Put => {
                let base = cache
                    .find(note_id)
                    .cloned()
                    .or_else(|| pre_state.find_note(note_id).map(|(_, n)| n.clone()));
                if let (Some(mut record), Some(body)) = (base, update.body.as_ref()) {
                    apply_note_patch(&mut record, body);
                    cache.upsert(record);
                }
            }
            QueryKind::Delete => cache.remove(note_id),
        }
    }

    async fn write_mirror(&self, state: &BoardState) {
        let style = match self.loaded.read().unwrap().mirror {
            Some(style) => style,
            None => return,
        };
        let body = match self.store.get_note_body(&self.config_note_id).await {
            Ok(body) => body,
            Err(err) => {
                log::warn!(target: "kanri.session", "mirror skipped, body unreadable: {}", err);
                return;
            }
        };

        let mirror = markdown::render_mirror(style, state, &markdown::local_timestamp());
        let new_body = match config::replace_mirror(&body, &mirror) {
            Ok(new_body) => new_body,
            Err(err) => {
                log::warn!(target: "kanri.session", "mirror skipped: {}", err);
                return;
            }
        };
        if new_body == body {
            return;
        }

        let update = UpdateQuery::put(
            vec!["notes".to_string(), self.config_note_id.clone()],
            json!({ "body": new_body }),
        );
        if let Err(err) = self.store.apply(&update).await {
            log::warn!(target: "kanri.session", "mirror write failed: {}", err);
        }
    }

    fn handle_message_action(&self, message_id: &str, action_name: &str) {
        if action_name != "clear" {
            log::warn!(
                target: "kanri.session",
                "unknown action '{}' on message '{}'",
                action_name,
                message_id
            );
            return;
        }
        self.banners.lock().unwrap().retain(|m| m.id != message_id);
        let mut state = self.current_state();
        state.messages = self.banners.lock().unwrap().clone();
        self.publish_state(state);
    }

    fn handle_column_link(&self, link: &str) {
        match classify_link(link) {
            LinkTarget::Note { note_id } => self.emit(SessionEvent::OpenNote {
                note_id,
                new_window: false,
            }),
            LinkTarget::Hyperlink { url } => self.emit(SessionEvent::OpenLink { url }),
            LinkTarget::Invalid => self.emit(SessionEvent::Command(Command::Warning {
                message: "The column link is not valid.".to_string(),
                duration: Some(3000),
            })),
        }
    }

    fn push_banners(&self, messages: &[Message]) {
        let mut banners = self.banners.lock().unwrap();
        for message in messages {
            if !banners.iter().any(|b| b.id == message.id) {
                banners.push(message.clone());
            }
        }
    }

    fn publish_state(&self, state: BoardState) {
        *self.state.write().unwrap() = state.clone();
        self.emit(SessionEvent::BoardRefreshed(state));
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; state is still queryable.
        let _ = self.events.send(event);
    }
}
