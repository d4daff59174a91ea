use crate::rules::{ColumnRule, RuleDelta, Unsatisfiable};
use crate::types::{BoardState, NoteRecord, UpdateQuery};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Turns user actions into store writes.
///
/// Planning is pure: it looks at the action, the current board snapshot,
/// and the compiled rules, and produces the minimal list of metadata
/// patches that makes the board's next materialization show the action's
/// outcome. Nothing is written here; the session executes the plan after
/// post-processing.
///
/// Plans fail closed. If a rule cannot be inverted into a metadata change,
/// no partial plan is emitted and the caller shows a warning instead.

/// Gap left between a top-inserted note and the previous first note, and
/// between appended notes when "now" has not advanced past the tail.
pub const ORDER_STEP_MS: i64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Action {
    /// Drag a note to `new_index` within `new_column_name`, possibly from
    /// another column. The index counts positions after the note itself is
    /// taken out.
    #[serde(rename_all = "camelCase")]
    MoveNote {
        note_id: String,
        old_column_name: String,
        new_column_name: String,
        new_index: usize,
    },
    /// Move a note to the end of another column.
    #[serde(rename_all = "camelCase")]
    MoveNoteToColumn { note_id: String, from: String, to: String },
    #[serde(rename_all = "camelCase")]
    MoveNoteToTop { note_id: String, column_name: String },
    #[serde(rename_all = "camelCase")]
    MoveNoteToBottom { note_id: String, column_name: String },
    /// Put a note that is not on the board into a column. The note keeps
    /// whatever column it may hold elsewhere; nothing is retracted.
    #[serde(rename_all = "camelCase")]
    InsertNoteToColumn {
        note_id: String,
        column_name: String,
        index: usize,
    },
    /// Create a note and file it into a column. The session creates the
    /// note first and fills in `note_id` before planning.
    #[serde(rename_all = "camelCase")]
    NewNote {
        col_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    RemoveNoteFromBoard { note_id: String },
    /// Remove a column from the board config. Touches the board note only;
    /// member notes keep their metadata.
    #[serde(rename_all = "camelCase")]
    DeleteCol { col_name: String },
    Load,
    #[serde(rename_all = "camelCase")]
    Poll {
        #[serde(default)]
        show_reloaded_toast: bool,
    },
    #[serde(rename_all = "camelCase")]
    OpenNote { note_id: String },
    #[serde(rename_all = "camelCase")]
    OpenNoteInNewWindow { note_id: String },
    OpenConfigNote,
    #[serde(rename_all = "camelCase")]
    MessageAction {
        message_id: String,
        action_name: String,
    },
    #[serde(rename_all = "camelCase")]
    ColumnTitleClicked { link: String },
    #[serde(rename_all = "camelCase")]
    Settings { target: String },
}

impl Action {
    /// Whether handling this action writes to the store.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Action::MoveNote { .. }
                | Action::MoveNoteToColumn { .. }
                | Action::MoveNoteToTop { .. }
                | Action::MoveNoteToBottom { .. }
                | Action::InsertNoteToColumn { .. }
                | Action::NewNote { .. }
                | Action::RemoveNoteFromBoard { .. }
                | Action::DeleteCol { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("rule for column '{column}' cannot be satisfied: {reason}")]
    RuleUnsatisfiable { column: String, reason: String },
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("note not on the board: {0}")]
    UnknownNote(String),
}

/// Everything a plan may depend on besides the action and the snapshot.
/// `now_ms` is injected so plans are reproducible.
pub struct PlanContext<'a> {
    pub columns: &'a [ColumnRule],
    pub base_tags: &'a BTreeSet<String>,
    pub root_notebook_id: Option<&'a str>,
    /// A note the action refers to that is not in the snapshot, such as a
    /// freshly created one.
    pub outside_note: Option<&'a NoteRecord>,
    pub now_ms: i64,
}

enum Slot {
    Top,
    Bottom,
    Index(usize),
}

pub fn plan(
    action: &Action,
    state: &BoardState,
    ctx: &PlanContext,
) -> Result<Vec<UpdateQuery>, PlanError> {
    match action {
        Action::MoveNote {
            note_id,
            old_column_name,
            new_column_name,
            new_index,
        } => plan_move(
            note_id,
            Some(old_column_name),
            new_column_name,
            Slot::Index(*new_index),
            state,
            ctx,
        ),
        Action::MoveNoteToColumn { note_id, from, to } => {
            plan_move(note_id, Some(from), to, Slot::Bottom, state, ctx)
        }
        Action::MoveNoteToTop { note_id, column_name } => {
            plan_move(note_id, Some(column_name), column_name, Slot::Top, state, ctx)
        }
        Action::MoveNoteToBottom { note_id, column_name } => {
            plan_move(note_id, Some(column_name), column_name, Slot::Bottom, state, ctx)
        }
        Action::InsertNoteToColumn {
            note_id,
            column_name,
            index,
        } => plan_move(note_id, None, column_name, Slot::Index(*index), state, ctx),
        Action::NewNote { col_name, note_id } => {
            let note_id = note_id
                .as_deref()
                .ok_or_else(|| PlanError::UnknownNote("note was not created".to_string()))?;
            plan_move(note_id, None, col_name, Slot::Bottom, state, ctx)
        }
        Action::RemoveNoteFromBoard { note_id } => plan_removal(note_id, state, ctx),
        // Config surgery happens at the session level and no note changes.
        Action::DeleteCol { .. } => Ok(Vec::new()),
        _ => Ok(Vec::new()),
    }
}

fn find_note<'a>(
    note_id: &str,
    state: &'a BoardState,
    ctx: &'a PlanContext,
) -> Result<&'a NoteRecord, PlanError> {
    if let Some((_, note)) = state.find_note(note_id) {
        return Ok(note);
    }
    match ctx.outside_note {
        Some(note) if note.id == note_id => Ok(note),
        _ => Err(PlanError::UnknownNote(note_id.to_string())),
    }
}

fn column<'a>(name: &str, ctx: &'a PlanContext) -> Result<&'a ColumnRule, PlanError> {
    ctx.columns
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| PlanError::UnknownColumn(name.to_string()))
}

fn unsatisfiable(column: &str, err: Unsatisfiable) -> PlanError {
    PlanError::RuleUnsatisfiable {
        column: column.to_string(),
        reason: err.0,
    }
}

fn tag_array(tags: &BTreeSet<String>) -> Value {
    Value::Array(tags.iter().cloned().map(Value::String).collect())
}

fn plan_move(
    note_id: &str,
    from: Option<&str>,
    to: &str,
    slot: Slot,
    state: &BoardState,
    ctx: &PlanContext,
) -> Result<Vec<UpdateQuery>, PlanError> {
    let note = find_note(note_id, state, ctx)?;
    let target = column(to, ctx)?;

    let same_column = from == Some(to);
    let satisfy = if same_column {
        RuleDelta::default()
    } else {
        target.matcher.satisfying_delta().map_err(|e| unsatisfiable(to, e))?
    };
    let retract = match from {
        Some(name) if !same_column => {
            let source = column(name, ctx)?;
            source
                .matcher
                .retracting_delta(ctx.root_notebook_id)
                .map_err(|e| unsatisfiable(name, e))?
        }
        _ => RuleDelta::default(),
    };
    let delta = overlay(retract, satisfy);

    let order = {
        let empty = Vec::new();
        let column_notes = state.column(to).map(|c| &c.notes).unwrap_or(&empty);
        let others: Vec<&NoteRecord> = column_notes.iter().filter(|n| n.id != note_id).collect();
        slot_order(&others, slot, ctx.now_ms)
    };

    let mut body = Map::new();
    body.insert("order".to_string(), Value::from(order));

    let mut tags: BTreeSet<String> = note.tags.clone();
    tags.extend(ctx.base_tags.iter().cloned());
    tags.extend(delta.add_tags.iter().cloned());
    tags.retain(|t| !delta.remove_tags.contains(t));
    if tags != note.tags {
        body.insert("tags".to_string(), tag_array(&tags));
    }

    if let Some(parent) = &delta.set_parent {
        if *parent != note.parent_id {
            body.insert("parent_id".to_string(), Value::from(parent.clone()));
        }
    }
    for (field, value) in &delta.set_fields {
        if note.custom_fields.get(field) != Some(value) {
            body.insert(field.clone(), value.clone());
        }
    }
    for field in &delta.clear_fields {
        if note.custom_fields.contains_key(field) {
            body.insert(field.clone(), Value::Null);
        }
    }

    Ok(vec![UpdateQuery::put(
        vec!["notes".to_string(), note_id.to_string()],
        Value::Object(body),
    )])
}

/// Strip everything that keeps the note on the board: its column's rule and
/// the board's base tags. Position metadata is left alone.
fn plan_removal(
    note_id: &str,
    state: &BoardState,
    ctx: &PlanContext,
) -> Result<Vec<UpdateQuery>, PlanError> {
    let (column_name, note) = state
        .find_note(note_id)
        .ok_or_else(|| PlanError::UnknownNote(note_id.to_string()))?;
    let source = column(column_name, ctx)?;
    let retract = source
        .matcher
        .retracting_delta(ctx.root_notebook_id)
        .map_err(|e| unsatisfiable(column_name, e))?;

    let mut body = Map::new();

    let mut tags = note.tags.clone();
    tags.retain(|t| !retract.remove_tags.contains(t) && !ctx.base_tags.contains(t));
    if tags != note.tags {
        body.insert("tags".to_string(), tag_array(&tags));
    }
    if let Some(parent) = &retract.set_parent {
        if *parent != note.parent_id {
            body.insert("parent_id".to_string(), Value::from(parent.clone()));
        }
    }
    for field in &retract.clear_fields {
        if note.custom_fields.contains_key(field) {
            body.insert(field.clone(), Value::Null);
        }
    }

    if body.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![UpdateQuery::put(
        vec!["notes".to_string(), note_id.to_string()],
        Value::Object(body),
    )])
}

/// Combine the retracting and satisfying deltas of a move. Where both touch
/// the same tag, field, or the notebook, the target column wins.
fn overlay(retract: RuleDelta, satisfy: RuleDelta) -> RuleDelta {
    let mut remove_tags = retract.remove_tags;
    remove_tags.retain(|t| !satisfy.add_tags.contains(t));

    let mut clear_fields = retract.clear_fields;
    clear_fields.retain(|f| !satisfy.set_fields.contains_key(f));

    RuleDelta {
        add_tags: satisfy.add_tags,
        remove_tags,
        set_parent: satisfy.set_parent.or(retract.set_parent),
        set_fields: satisfy.set_fields,
        clear_fields,
    }
}

/// Order value for a slot between existing notes. Appends stamp the current
/// time; inserts take the midpoint of their neighbors. When neighbor orders
/// touch, the midpoint collides and the id tiebreak decides final placement.
fn slot_order(others: &[&NoteRecord], slot: Slot, now_ms: i64) -> i64 {
    let (prev, next) = match slot {
        Slot::Top => (None, others.first()),
        Slot::Bottom => (others.last(), None),
        Slot::Index(i) => {
            let prev = if i > 0 { others.get(i - 1) } else { None };
            (prev, others.get(i))
        }
    };
    match (prev, next) {
        (None, None) => now_ms,
        (None, Some(next)) => next.order - ORDER_STEP_MS,
        (Some(prev), None) => {
            if now_ms > prev.order {
                now_ms
            } else {
                prev.order + ORDER_STEP_MS
            }
        }
        (Some(prev), Some(next)) => prev.order + (next.order - prev.order) / 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleMatch;
    use crate::types::BoardColumn;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    fn make_note(id: &str, tags: &[&str], order: i64) -> NoteRecord {
        let mut note = NoteRecord::new(id, format!("note {}", id));
        note.tags = tags.iter().map(|t| t.to_string()).collect();
        note.order = order;
        note.parent_id = "nb-root".to_string();
        note
    }

    fn make_columns() -> Vec<ColumnRule> {
        vec![
            ColumnRule {
                name: "To Do".to_string(),
                link: None,
                matcher: RuleMatch::TagContains("todo".to_string()),
            },
            ColumnRule {
                name: "Done".to_string(),
                link: None,
                matcher: RuleMatch::TagContains("done".to_string()),
            },
            ColumnRule {
                name: "Archive".to_string(),
                link: None,
                matcher: RuleMatch::NotebookEquals {
                    name: "Archive".to_string(),
                    id: Some("nb-archive".to_string()),
                },
            },
            ColumnRule {
                name: "Weird".to_string(),
                link: None,
                matcher: RuleMatch::Unsupported("sorted".to_string()),
            },
        ]
    }

    fn make_state(columns: &[(&str, Vec<NoteRecord>)]) -> BoardState {
        BoardState {
            name: "Tasks".to_string(),
            columns: columns
                .iter()
                .map(|(name, notes)| BoardColumn {
                    name: name.to_string(),
                    link: None,
                    notes: notes.clone(),
                })
                .collect(),
            messages: Vec::new(),
            hidden_tags: Vec::new(),
        }
    }

    struct Fixture {
        columns: Vec<ColumnRule>,
        base_tags: BTreeSet<String>,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                columns: make_columns(),
                base_tags: BTreeSet::from(["kanban".to_string()]),
            }
        }

        fn ctx<'a>(&'a self, outside: Option<&'a NoteRecord>) -> PlanContext<'a> {
            PlanContext {
                columns: &self.columns,
                base_tags: &self.base_tags,
                root_notebook_id: Some("nb-root"),
                outside_note: outside,
                now_ms: NOW,
            }
        }
    }

    fn single_put(updates: &[UpdateQuery]) -> &serde_json::Value {
        assert_eq!(updates.len(), 1);
        updates[0].body.as_ref().unwrap()
    }

    #[test]
    fn test_move_between_tag_columns_swaps_tags() {
        let fixture = Fixture::new();
        let note = make_note("n1", &["kanban", "todo"], 100);
        let state = make_state(&[("To Do", vec![note]), ("Done", vec![])]);

        let action = Action::MoveNoteToColumn {
            note_id: "n1".to_string(),
            from: "To Do".to_string(),
            to: "Done".to_string(),
        };
        let updates = plan(&action, &state, &fixture.ctx(None)).unwrap();

        let body = single_put(&updates);
        assert_eq!(body["tags"], json!(["done", "kanban"]));
        assert_eq!(body["order"], json!(NOW));
        assert!(body.get("parent_id").is_none());
    }

    #[test]
    fn test_reorder_within_column_touches_order_only() {
        let fixture = Fixture::new();
        let notes = vec![
            make_note("n1", &["kanban", "todo"], 100),
            make_note("n2", &["kanban", "todo"], 200),
        ];
        let state = make_state(&[("To Do", notes)]);

        let action = Action::MoveNoteToTop {
            note_id: "n2".to_string(),
            column_name: "To Do".to_string(),
        };
        let updates = plan(&action, &state, &fixture.ctx(None)).unwrap();

        let body = single_put(&updates);
        assert_eq!(body["order"], json!(100 - ORDER_STEP_MS));
        assert!(body.get("tags").is_none());
        assert_eq!(body.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_drop_between_neighbors_takes_midpoint() {
        let fixture = Fixture::new();
        let notes = vec![
            make_note("n1", &["kanban", "todo"], 100),
            make_note("n2", &["kanban", "todo"], 200),
            make_note("n3", &["kanban", "todo"], 300),
        ];
        let state = make_state(&[("To Do", notes)]);

        // n3 dragged between n1 and n2: index 1 once n3 is taken out.
        let action = Action::MoveNote {
            note_id: "n3".to_string(),
            old_column_name: "To Do".to_string(),
            new_column_name: "To Do".to_string(),
            new_index: 1,
        };
        let updates = plan(&action, &state, &fixture.ctx(None)).unwrap();
        assert_eq!(single_put(&updates)["order"], json!(150));
    }

    #[test]
    fn test_append_after_future_orders_keeps_moving_down() {
        let fixture = Fixture::new();
        let notes = vec![make_note("n1", &["kanban", "todo"], NOW + 500_000)];
        let state = make_state(&[("To Do", notes), ("Done", vec![])]);

        let action = Action::MoveNoteToBottom {
            note_id: "n1".to_string(),
            column_name: "To Do".to_string(),
        };
        // Only n1 is in the column, so the slot is genuinely empty and the
        // order falls back to now.
        let updates = plan(&action, &state, &fixture.ctx(None)).unwrap();
        assert_eq!(single_put(&updates)["order"], json!(NOW));

        // With a future-ordered neighbor the append steps past it instead
        // of landing before it.
        let notes = vec![
            make_note("n1", &["kanban", "todo"], NOW + 500_000),
            make_note("n2", &["kanban", "todo"], 10),
        ];
        let state = make_state(&[("To Do", notes)]);
        let action = Action::MoveNoteToBottom {
            note_id: "n2".to_string(),
            column_name: "To Do".to_string(),
        };
        let updates = plan(&action, &state, &fixture.ctx(None)).unwrap();
        assert_eq!(
            single_put(&updates)["order"],
            json!(NOW + 500_000 + ORDER_STEP_MS)
        );
    }

    #[test]
    fn test_move_into_notebook_column_sets_parent() {
        let fixture = Fixture::new();
        let note = make_note("n1", &["kanban", "todo"], 100);
        let state = make_state(&[("To Do", vec![note]), ("Archive", vec![])]);

        let action = Action::MoveNoteToColumn {
            note_id: "n1".to_string(),
            from: "To Do".to_string(),
            to: "Archive".to_string(),
        };
        let updates = plan(&action, &state, &fixture.ctx(None)).unwrap();

        let body = single_put(&updates);
        assert_eq!(body["parent_id"], json!("nb-archive"));
        assert_eq!(body["tags"], json!(["kanban"]));
    }

    #[test]
    fn test_move_out_of_notebook_column_restores_root() {
        let fixture = Fixture::new();
        let mut note = make_note("n1", &["kanban"], 100);
        note.parent_id = "nb-archive".to_string();
        let state = make_state(&[("Archive", vec![note]), ("To Do", vec![])]);

        let action = Action::MoveNoteToColumn {
            note_id: "n1".to_string(),
            from: "Archive".to_string(),
            to: "To Do".to_string(),
        };
        let updates = plan(&action, &state, &fixture.ctx(None)).unwrap();

        let body = single_put(&updates);
        assert_eq!(body["parent_id"], json!("nb-root"));
        assert_eq!(body["tags"], json!(["kanban", "todo"]));
    }

    #[test]
    fn test_move_out_without_root_plans_empty_parent() {
        // The planner emits the empty parent honestly; the post-processing
        // pipeline is the layer that refuses to write it.
        let fixture = Fixture::new();
        let mut note = make_note("n1", &["kanban"], 100);
        note.parent_id = "nb-archive".to_string();
        let state = make_state(&[("Archive", vec![note]), ("To Do", vec![])]);

        let mut ctx = fixture.ctx(None);
        ctx.root_notebook_id = None;
        let action = Action::MoveNoteToColumn {
            note_id: "n1".to_string(),
            from: "Archive".to_string(),
            to: "To Do".to_string(),
        };
        let updates = plan(&action, &state, &ctx).unwrap();
        assert_eq!(single_put(&updates)["parent_id"], json!(""));
    }

    #[test]
    fn test_unsatisfiable_target_fails_closed() {
        let fixture = Fixture::new();
        let note = make_note("n1", &["kanban", "todo"], 100);
        let state = make_state(&[("To Do", vec![note]), ("Weird", vec![])]);

        let action = Action::MoveNoteToColumn {
            note_id: "n1".to_string(),
            from: "To Do".to_string(),
            to: "Weird".to_string(),
        };
        let err = plan(&action, &state, &fixture.ctx(None)).unwrap_err();
        assert!(matches!(
            err,
            PlanError::RuleUnsatisfiable { column, .. } if column == "Weird"
        ));
    }

    #[test]
    fn test_unknown_note_and_column_fail() {
        let fixture = Fixture::new();
        let state = make_state(&[("To Do", vec![])]);

        let action = Action::MoveNoteToColumn {
            note_id: "ghost".to_string(),
            from: "To Do".to_string(),
            to: "Done".to_string(),
        };
        assert!(matches!(
            plan(&action, &state, &fixture.ctx(None)).unwrap_err(),
            PlanError::UnknownNote(id) if id == "ghost"
        ));

        let note = make_note("n1", &["kanban", "todo"], 100);
        let state = make_state(&[("To Do", vec![note])]);
        let action = Action::MoveNoteToColumn {
            note_id: "n1".to_string(),
            from: "To Do".to_string(),
            to: "Nowhere".to_string(),
        };
        assert!(matches!(
            plan(&action, &state, &fixture.ctx(None)).unwrap_err(),
            PlanError::UnknownColumn(name) if name == "Nowhere"
        ));
    }

    #[test]
    fn test_new_note_gains_base_and_column_tags() {
        let fixture = Fixture::new();
        let state = make_state(&[("To Do", vec![]), ("Done", vec![])]);
        let created = make_note("fresh", &[], 0);

        let action = Action::NewNote {
            col_name: "To Do".to_string(),
            note_id: Some("fresh".to_string()),
        };
        let updates = plan(&action, &state, &fixture.ctx(Some(&created))).unwrap();

        let body = single_put(&updates);
        assert_eq!(body["tags"], json!(["kanban", "todo"]));
        assert_eq!(body["order"], json!(NOW));
    }

    #[test]
    fn test_new_note_without_created_id_fails() {
        let fixture = Fixture::new();
        let state = make_state(&[("To Do", vec![])]);
        let action = Action::NewNote {
            col_name: "To Do".to_string(),
            note_id: None,
        };
        assert!(matches!(
            plan(&action, &state, &fixture.ctx(None)).unwrap_err(),
            PlanError::UnknownNote(_)
        ));
    }

    #[test]
    fn test_remove_note_strips_rule_and_base_tags() {
        let fixture = Fixture::new();
        let note = make_note("n1", &["kanban", "todo", "urgent"], 100);
        let state = make_state(&[("To Do", vec![note])]);

        let action = Action::RemoveNoteFromBoard {
            note_id: "n1".to_string(),
        };
        let updates = plan(&action, &state, &fixture.ctx(None)).unwrap();

        let body = single_put(&updates);
        assert_eq!(body["tags"], json!(["urgent"]));
        assert!(body.get("order").is_none());
    }

    #[test]
    fn test_field_column_sets_and_clears_fields() {
        let rules = vec![
            ColumnRule {
                name: "Review".to_string(),
                link: None,
                matcher: RuleMatch::FieldEquals {
                    field: "status".to_string(),
                    value: json!("review"),
                },
            },
            ColumnRule {
                name: "Done".to_string(),
                link: None,
                matcher: RuleMatch::TagContains("done".to_string()),
            },
        ];
        let base = BTreeSet::new();
        let ctx = PlanContext {
            columns: &rules,
            base_tags: &base,
            root_notebook_id: None,
            outside_note: None,
            now_ms: NOW,
        };

        let mut note = make_note("n1", &[], 100);
        note.custom_fields.insert("status".to_string(), json!("review"));
        let state = make_state(&[("Review", vec![note]), ("Done", vec![])]);

        let action = Action::MoveNoteToColumn {
            note_id: "n1".to_string(),
            from: "Review".to_string(),
            to: "Done".to_string(),
        };
        let updates = plan(&action, &state, &ctx).unwrap();

        let body = single_put(&updates);
        assert_eq!(body["status"], Value::Null);
        assert_eq!(body["tags"], json!(["done"]));
    }

    #[test]
    fn test_non_mutating_actions_plan_nothing() {
        let fixture = Fixture::new();
        let state = make_state(&[("To Do", vec![])]);
        for action in [
            Action::Load,
            Action::DeleteCol {
                col_name: "To Do".to_string(),
            },
            Action::OpenConfigNote,
            Action::Settings {
                target: "board".to_string(),
            },
        ] {
            assert_eq!(plan(&action, &state, &fixture.ctx(None)).unwrap(), Vec::new());
        }
    }

    #[test]
    fn test_action_wire_format() {
        let action = Action::MoveNoteToColumn {
            note_id: "n1".to_string(),
            from: "To Do".to_string(),
            to: "Done".to_string(),
        };
        let wire = serde_json::to_value(&action).unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "moveNoteToColumn",
                "payload": { "noteId": "n1", "from": "To Do", "to": "Done" }
            })
        );

        let load: Action = serde_json::from_value(json!({ "type": "load" })).unwrap();
        assert_eq!(load, Action::Load);

        let poll: Action = serde_json::from_value(json!({
            "type": "poll",
            "payload": { "showReloadedToast": true }
        }))
        .unwrap();
        assert_eq!(poll, Action::Poll { show_reloaded_toast: true });
    }
}
