use crate::types::{Command, Message, QueryKind, Severity, UpdateQuery};
use std::collections::BTreeMap;

/// Post-processing of planned store writes.
///
/// Every plan runs through an ordered list of pure rules before anything is
/// written. A rule maps a pipeline state to a new pipeline state; it may
/// drop updates, rewrite them, or attach commands for the UI. Rules run in
/// registration order and later rules see earlier rules' output.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineState {
    pub updates: Vec<UpdateQuery>,
    pub commands: Vec<Command>,
}

impl PipelineState {
    pub fn new(updates: Vec<UpdateQuery>) -> Self {
        PipelineState {
            updates,
            commands: Vec::new(),
        }
    }
}

pub trait PostProcessingRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn process(&self, state: PipelineState) -> PipelineState;
}

pub struct Pipeline {
    rules: Vec<Box<dyn PostProcessingRule>>,
}

impl Pipeline {
    /// The rule set every board session runs with.
    pub fn standard() -> Self {
        Pipeline {
            rules: vec![Box::new(DisableToPutParentIdToEmpty)],
        }
    }

    pub fn process(&self, state: PipelineState) -> PipelineState {
        self.rules.iter().fold(state, |state, rule| {
            let out = rule.process(state);
            log::debug!(
                target: "kanri.postprocess",
                "rule {} left {} updates, {} commands",
                rule.name(),
                out.updates.len(),
                out.commands.len()
            );
            out
        })
    }
}

/// Refuses to write a note whose final notebook would be empty.
///
/// Rules that move a note out of a notebook column fall back to the board's
/// root notebook; when no root is configured the planned parent ends up as
/// the empty string, and most stores either reject that write or orphan the
/// note. If any note's last planned `parent_id` is empty the whole plan is
/// dropped and a banner asks the user to fix the board config. Empty-parent
/// writes that a later update supersedes are silently filtered instead.
pub struct DisableToPutParentIdToEmpty;

impl DisableToPutParentIdToEmpty {
    pub const MESSAGE_ID: &'static str = "disable-to-put-parent-id-to-empty";
    pub const WARNING: &'static str =
        "Can't move the note out of every notebook. Please review the board's column rules.";
}

impl PostProcessingRule for DisableToPutParentIdToEmpty {
    fn name(&self) -> &'static str {
        "disable-to-put-parent-id-to-empty"
    }

    fn process(&self, mut state: PipelineState) -> PipelineState {
        // Last planned parent per note wins; earlier writes are transient.
        let mut final_parent: BTreeMap<&str, &str> = BTreeMap::new();
        for update in &state.updates {
            if update.kind != QueryKind::Put {
                continue;
            }
            if let (Some(note_id), Some(parent)) = (update.note_id(), update.body_str("parent_id")) {
                final_parent.insert(note_id, parent);
            }
        }

        if final_parent.values().any(|parent| parent.is_empty()) {
            log::warn!(
                target: "kanri.postprocess",
                "dropping plan: a note would end up outside every notebook"
            );
            return PipelineState {
                updates: Vec::new(),
                commands: vec![Command::ShowBanner {
                    messages: vec![Message {
                        id: Self::MESSAGE_ID.to_string(),
                        title: Self::WARNING.to_string(),
                        severity: Severity::Warning,
                        actions: vec!["clear".to_string()],
                        details: String::new(),
                    }],
                }],
            };
        }

        state.updates.retain(|update| {
            !(update.kind == QueryKind::Put && update.body_str("parent_id") == Some(""))
        });
        state
    }
}
