//! Rule-driven kanban boards over a note store.
//!
//! A board is not data of its own: it is a view derived from notes and the
//! column rules in a board note's ```kanban fence. Moving a card means
//! computing the metadata edits that make the note match its new column's
//! rule, writing them to the store, and deriving the board again. The store
//! is eventually consistent, so a small overlay cache bridges the gap
//! between a committed write and the moment the store's query index sees it.

pub mod app;
pub mod board;
pub mod cache;
pub mod config;
pub mod links;
pub mod markdown;
pub mod planner;
pub mod postprocess;
pub mod queue;
pub mod recents;
pub mod refresh;
pub mod rules;
pub mod session;
pub mod store;
pub mod types;

pub use app::{App, HostEvent};
pub use planner::Action;
pub use session::{BoardSession, EngineError, SessionEvent};
pub use store::{NoteStore, StoreError};
pub use types::{BoardState, Command, NoteRecord, UpdateQuery};
