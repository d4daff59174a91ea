use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A note's metadata as the engine sees it. The note body is not carried
/// here; boards render titles only and bodies stay in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Id of the notebook holding the note. Empty means "no notebook",
    /// which most stores reject on write.
    #[serde(default)]
    pub parent_id: String,
    /// Manual sort position within a column. Lower sorts first.
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub created_time: i64,
    /// Free-form metadata fields used by field rules.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, serde_json::Value>,
}

impl NoteRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        NoteRecord {
            id: id.into(),
            title: title.into(),
            ..NoteRecord::default()
        }
    }

    /// Sort key for column layout: ascending `order`, note id as tiebreak.
    pub fn sort_key(&self) -> (i64, &str) {
        (self.order, self.id.as_str())
    }
}

/// Merge-patch a record with the body of a `put` query. Known metadata keys
/// update their typed fields; a `null` custom field removes the key; every
/// other key lands in `custom_fields`. The `body` key is skipped because
/// note content is handled by the store, not by note metadata.
pub fn apply_note_patch(record: &mut NoteRecord, body: &serde_json::Value) {
    let Some(map) = body.as_object() else {
        return;
    };
    for (key, value) in map {
        match key.as_str() {
            "title" => {
                if let Some(title) = value.as_str() {
                    record.title = title.to_string();
                }
            }
            "parent_id" => {
                if let Some(parent) = value.as_str() {
                    record.parent_id = parent.to_string();
                }
            }
            "order" => {
                if let Some(order) = value.as_i64() {
                    record.order = order;
                }
            }
            "created_time" => {
                if let Some(created) = value.as_i64() {
                    record.created_time = created;
                }
            }
            "tags" => {
                if let Some(tags) = value.as_array() {
                    record.tags = tags
                        .iter()
                        .filter_map(|t| t.as_str())
                        .map(|t| t.to_string())
                        .collect();
                }
            }
            "body" => {}
            _ => {
                if value.is_null() {
                    record.custom_fields.remove(key);
                } else {
                    record.custom_fields.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// A single write against the note store. Queries use a merge-patch
/// convention: `put` bodies carry only the keys that change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateQuery {
    #[serde(rename = "type")]
    pub kind: QueryKind,
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Put,
    Delete,
}

impl UpdateQuery {
    pub fn put(path: Vec<String>, body: serde_json::Value) -> Self {
        UpdateQuery {
            kind: QueryKind::Put,
            path,
            body: Some(body),
        }
    }

    pub fn delete(path: Vec<String>) -> Self {
        UpdateQuery {
            kind: QueryKind::Delete,
            path,
            body: None,
        }
    }

    /// The note id this query targets, when the path is `["notes", id]`.
    pub fn note_id(&self) -> Option<&str> {
        match self.path.as_slice() {
            [head, id] if head == "notes" => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn body_str(&self, key: &str) -> Option<&str> {
        self.body.as_ref()?.get(key)?.as_str()
    }
}

/// A persistent banner shown above the board until acted on or cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One-shot UI side effects produced while handling an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    Warning {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    ShowBanner { messages: Vec<Message> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    pub name: String,
    /// Optional link attached to the column title in the UI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub notes: Vec<NoteRecord>,
}

/// Immutable snapshot of a board: named columns with sorted notes, plus any
/// banners that were live when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    pub name: String,
    pub columns: Vec<BoardColumn>,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Tags that define board membership or column rules; the UI hides
    /// these on cards since they carry no information there.
    #[serde(default)]
    pub hidden_tags: Vec<String>,
}

impl BoardState {
    /// Placeholder state rendered when no board note is open.
    pub fn no_board() -> Self {
        BoardState {
            name: "No board open".to_string(),
            columns: Vec::new(),
            messages: vec![Message {
                id: "no-board-open".to_string(),
                title: "Select a valid board note".to_string(),
                severity: Severity::Error,
                actions: Vec::new(),
                details: "Open a note whose body contains a ```kanban fence.".to_string(),
            }],
            hidden_tags: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&BoardColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Locate a note anywhere on the board, returning its column name.
    pub fn find_note(&self, note_id: &str) -> Option<(&str, &NoteRecord)> {
        for column in &self.columns {
            if let Some(note) = column.notes.iter().find(|n| n.id == note_id) {
                return Some((column.name.as_str(), note));
            }
        }
        None
    }
}
