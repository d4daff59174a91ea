use crate::rules::{classify, ColumnRule};
use crate::types::{BoardColumn, BoardState, NoteRecord};
use std::collections::BTreeSet;

/// Pure board materialization: notes in, immutable snapshot out. Rebuilding
/// from the same inputs always yields the same snapshot, so the engine can
/// re-derive the board at any time instead of editing it in place.

/// Which notes belong on the board at all, before column rules run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardScope {
    /// Tags a note must carry to be considered.
    pub base_tags: BTreeSet<String>,
    /// When set, the note's notebook must be in this subtree.
    pub notebook_ids: Option<BTreeSet<String>>,
    /// The board note itself never appears as a card.
    pub config_note_id: String,
}

impl BoardScope {
    pub fn admits(&self, note: &NoteRecord) -> bool {
        if note.id == self.config_note_id {
            return false;
        }
        if !self.base_tags.iter().all(|tag| note.tags.contains(tag)) {
            return false;
        }
        if let Some(ids) = &self.notebook_ids {
            if !ids.contains(&note.parent_id) {
                return false;
            }
        }
        true
    }
}

/// Build a board snapshot. Each in-scope note lands in the first column
/// whose rule matches it; notes matching no rule stay off the board.
/// Columns sort by `order` with the note id as tiebreak.
pub fn build_board(
    name: &str,
    notes: &[NoteRecord],
    columns: &[ColumnRule],
    scope: &BoardScope,
) -> BoardState {
    let mut buckets: Vec<Vec<NoteRecord>> = vec![Vec::new(); columns.len()];
    let mut seen = BTreeSet::new();

    for note in notes {
        if !scope.admits(note) || !seen.insert(note.id.as_str()) {
            continue;
        }
        if let Some(rule) = classify(note, columns) {
            if let Some(index) = columns.iter().position(|c| c.name == rule.name) {
                buckets[index].push(note.clone());
            }
        }
    }

    let board_columns = columns
        .iter()
        .zip(buckets)
        .map(|(rule, mut notes)| {
            notes.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
            BoardColumn {
                name: rule.name.clone(),
                link: rule.link.clone(),
                notes,
            }
        })
        .collect();

    let mut hidden = scope.base_tags.clone();
    for column in columns {
        column.matcher.collect_tags(&mut hidden);
    }

    BoardState {
        name: name.to_string(),
        columns: board_columns,
        messages: Vec::new(),
        hidden_tags: hidden.into_iter().collect(),
    }
}
