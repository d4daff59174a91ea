use crate::links::{classify_link, LinkTarget};
use crate::types::{BoardState, NoteRecord};
use chrono::Local;

/// Renders a board snapshot as markdown so the board note body mirrors the
/// current board for plain-text readers. Two layouts are supported: a table
/// with one column per board column, and a list of `##` sections.

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorStyle {
    List,
    Table,
}

/// Timestamp line appended below every mirror, marking the text as generated.
pub fn mirror_stamp(updated_at: &str) -> String {
    format!("_Last updated at {} by kanri_", updated_at)
}

pub fn local_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M").to_string()
}

pub fn render_mirror(style: MirrorStyle, state: &BoardState, updated_at: &str) -> String {
    if state.columns.is_empty() {
        return String::new();
    }
    match style {
        MirrorStyle::List => render_list(state, updated_at),
        MirrorStyle::Table => render_table(state, updated_at),
    }
}

/// Markdown link to a note, `[title](:/id)`. Pipes in the title are escaped
/// so links stay intact inside table cells. Missing notes render empty.
pub fn note_link(note: Option<&NoteRecord>) -> String {
    match note {
        Some(note) => format!("[{}](:/{})", note.title.replace('|', "\\|"), note.id),
        None => String::new(),
    }
}

/// Column heading text. A column with a note link renders as a markdown
/// link so the heading stays clickable in the mirror.
fn column_heading(name: &str, link: Option<&str>) -> String {
    match link {
        Some(link) => match classify_link(link) {
            LinkTarget::Note { note_id } => format!("[{}](:/{})", name, note_id),
            _ => format!("[{}]({})", name, link),
        },
        None => name.to_string(),
    }
}

fn render_table(state: &BoardState, updated_at: &str) -> String {
    let headings: Vec<String> = state
        .columns
        .iter()
        .map(|c| column_heading(&c.name, c.link.as_deref()))
        .collect();

    let header = format!("{}\n", headings.join(" | "));
    let separator = format!("{}\n", vec!["---"; headings.len()].join(" | "));

    let depth = state.columns.iter().map(|c| c.notes.len()).max().unwrap_or(0);
    let rows: Vec<String> = (0..depth)
        .map(|i| {
            let cells: Vec<String> = state
                .columns
                .iter()
                .map(|c| note_link(c.notes.get(i)))
                .collect();
            format!("| {} |", cells.join(" | "))
        })
        .collect();
    let body = format!("{}\n", rows.join("\n"));

    header + &separator + &body + &mirror_stamp(updated_at)
}

fn render_list(state: &BoardState, updated_at: &str) -> String {
    let sections: Vec<String> = state
        .columns
        .iter()
        .map(|c| {
            let items: Vec<String> = c.notes.iter().map(|n| format!("- {}", note_link(Some(n)))).collect();
            format!(
                "## {}\n{}",
                column_heading(&c.name, c.link.as_deref()),
                items.join("\n")
            )
        })
        .collect();

    format!("{}\n\n{}", sections.join("\n\n"), mirror_stamp(updated_at))
}
