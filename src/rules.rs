use crate::types::NoteRecord;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Declarative column membership rules.
///
/// Every board column is defined by one predicate over note metadata. A note
/// belongs to the first column in declaration order whose rule matches, so
/// the same note never appears twice and rule order in the board config is
/// meaningful. A catch-all column should therefore be declared last.
///
/// Rules are also run "in reverse" when planning a move: a rule knows which
/// metadata change makes a note match it and which change makes a note stop
/// matching it. Rules that cannot answer that (unsupported config forms)
/// still classify safely as "never matches" but refuse to produce deltas.

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRule {
    pub name: String,
    pub link: Option<String>,
    pub matcher: RuleMatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleMatch {
    /// Note carries the given tag.
    TagContains(String),
    /// Note lives in the named notebook. The id is resolved against the
    /// store once at config load; an unresolved notebook never matches.
    NotebookEquals { name: String, id: Option<String> },
    /// A custom metadata field equals the given value.
    FieldEquals { field: String, value: Value },
    AllOf(Vec<RuleMatch>),
    AnyOf(Vec<RuleMatch>),
    /// Catch-all: matches every note in scope. Declare it last.
    Backlog,
    /// A config form this engine does not understand. Never matches, and
    /// planning into or out of such a column fails closed.
    Unsupported(String),
}

/// A rule could not be turned into a metadata change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Unsatisfiable(pub String);

/// Metadata changes that make a note match (or stop matching) a rule.
/// Applied as a merge-patch: tags are edited as a set, `set_parent` moves
/// the note, cleared fields are written as `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleDelta {
    pub add_tags: BTreeSet<String>,
    pub remove_tags: BTreeSet<String>,
    pub set_parent: Option<String>,
    pub set_fields: BTreeMap<String, Value>,
    pub clear_fields: BTreeSet<String>,
}

impl RuleDelta {
    pub fn is_empty(&self) -> bool {
        self.add_tags.is_empty()
            && self.remove_tags.is_empty()
            && self.set_parent.is_none()
            && self.set_fields.is_empty()
            && self.clear_fields.is_empty()
    }

    /// Merge two deltas pulling in the same direction. Fails when they
    /// disagree on the notebook or on a field value.
    fn merge(mut self, other: RuleDelta) -> Result<RuleDelta, Unsatisfiable> {
        self.add_tags.extend(other.add_tags);
        self.remove_tags.extend(other.remove_tags);
        match (&self.set_parent, other.set_parent) {
            (Some(a), Some(b)) if *a != b => {
                return Err(Unsatisfiable(
                    "rule requires the note to be in two notebooks at once".to_string(),
                ))
            }
            (None, Some(b)) => self.set_parent = Some(b),
            _ => {}
        }
        for (field, value) in other.set_fields {
            match self.set_fields.get(&field) {
                Some(existing) if *existing != value => {
                    return Err(Unsatisfiable(format!(
                        "rule requires two values for field '{}'",
                        field
                    )))
                }
                _ => {
                    self.set_fields.insert(field, value);
                }
            }
        }
        self.clear_fields.extend(other.clear_fields);
        Ok(self)
    }
}

impl RuleMatch {
    pub fn matches(&self, note: &NoteRecord) -> bool {
        match self {
            RuleMatch::TagContains(tag) => note.tags.contains(tag),
            RuleMatch::NotebookEquals { id: Some(id), .. } => note.parent_id == *id,
            RuleMatch::NotebookEquals { id: None, .. } => false,
            RuleMatch::FieldEquals { field, value } => {
                note.custom_fields.get(field) == Some(value)
            }
            RuleMatch::AllOf(rules) => rules.iter().all(|r| r.matches(note)),
            RuleMatch::AnyOf(rules) => rules.iter().any(|r| r.matches(note)),
            RuleMatch::Backlog => true,
            RuleMatch::Unsupported(_) => false,
        }
    }

    /// The metadata change that makes a note match this rule.
    pub fn satisfying_delta(&self) -> Result<RuleDelta, Unsatisfiable> {
        match self {
            RuleMatch::TagContains(tag) => Ok(RuleDelta {
                add_tags: BTreeSet::from([tag.clone()]),
                ..RuleDelta::default()
            }),
            RuleMatch::NotebookEquals { id: Some(id), .. } => Ok(RuleDelta {
                set_parent: Some(id.clone()),
                ..RuleDelta::default()
            }),
            RuleMatch::NotebookEquals { name, id: None } => Err(Unsatisfiable(format!(
                "notebook '{}' does not exist",
                name
            ))),
            RuleMatch::FieldEquals { field, value } => {
                if value.is_object() || value.is_array() {
                    return Err(Unsatisfiable(format!(
                        "field '{}' matches on a structured value",
                        field
                    )));
                }
                Ok(RuleDelta {
                    set_fields: BTreeMap::from([(field.clone(), value.clone())]),
                    ..RuleDelta::default()
                })
            }
            RuleMatch::AllOf(rules) => rules
                .iter()
                .try_fold(RuleDelta::default(), |acc, rule| {
                    acc.merge(rule.satisfying_delta()?)
                }),
            RuleMatch::AnyOf(rules) => rules
                .iter()
                .find_map(|rule| rule.satisfying_delta().ok())
                .ok_or_else(|| {
                    Unsatisfiable("no branch of the rule can be satisfied".to_string())
                }),
            RuleMatch::Backlog => Ok(RuleDelta::default()),
            RuleMatch::Unsupported(what) => {
                Err(Unsatisfiable(format!("unsupported rule: {}", what)))
            }
        }
    }

    /// The metadata change that makes a note stop matching this rule.
    /// Leaving a notebook column moves the note back to the board's root
    /// notebook; with no root configured the parent becomes empty, which a
    /// post-processing rule downstream refuses to write.
    pub fn retracting_delta(&self, root_notebook_id: Option<&str>) -> Result<RuleDelta, Unsatisfiable> {
        match self {
            RuleMatch::TagContains(tag) => Ok(RuleDelta {
                remove_tags: BTreeSet::from([tag.clone()]),
                ..RuleDelta::default()
            }),
            RuleMatch::NotebookEquals { .. } => Ok(RuleDelta {
                set_parent: Some(root_notebook_id.unwrap_or("").to_string()),
                ..RuleDelta::default()
            }),
            RuleMatch::FieldEquals { field, .. } => Ok(RuleDelta {
                clear_fields: BTreeSet::from([field.clone()]),
                ..RuleDelta::default()
            }),
            // Breaking one conjunct would do, but clearing every conjunct
            // leaves no stale column metadata behind.
            RuleMatch::AllOf(rules) | RuleMatch::AnyOf(rules) => {
                rules.iter().try_fold(RuleDelta::default(), |acc, rule| {
                    acc.merge(rule.retracting_delta(root_notebook_id)?)
                })
            }
            // A catch-all cannot be un-matched; notes leave it by matching
            // an earlier column instead.
            RuleMatch::Backlog => Ok(RuleDelta::default()),
            RuleMatch::Unsupported(what) => {
                Err(Unsatisfiable(format!("unsupported rule: {}", what)))
            }
        }
    }

    /// Every tag this rule tests for, for the board's hidden tag list.
    pub fn collect_tags(&self, out: &mut BTreeSet<String>) {
        match self {
            RuleMatch::TagContains(tag) => {
                out.insert(tag.clone());
            }
            RuleMatch::AllOf(rules) | RuleMatch::AnyOf(rules) => {
                for rule in rules {
                    rule.collect_tags(out);
                }
            }
            _ => {}
        }
    }
}

/// First rule in declaration order that matches the note, if any. Notes
/// matching no rule stay off the board.
pub fn classify<'a>(note: &NoteRecord, columns: &'a [ColumnRule]) -> Option<&'a ColumnRule> {
    columns.iter().find(|c| c.matcher.matches(note))
}
