use crate::links::parse_markdown_link;
use crate::markdown::MirrorStyle;
use crate::rules::{ColumnRule, RuleMatch};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::OnceLock;

/// Board configuration lives inside the board note itself, as YAML in a
/// ```kanban fence. Everything after the closing fence belongs to the
/// markdown mirror and is rewritten by the engine, never by hand.
///
/// Loading is all-or-nothing: a body that fails any structural check leaves
/// the previously loaded config in place.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default, skip_serializing_if = "DisplayConfig::is_default")]
    pub display: DisplayConfig,
    #[serde(default, skip_serializing_if = "FiltersConfig::is_default")]
    pub filters: FiltersConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(flatten)]
    pub rule: MatchSpec,
}

/// One rule in config form. Multiple keys on the same column AND together.
/// Keys this engine does not recognize are kept verbatim so a config round
/// trip never loses them; they compile to a rule that never matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<MatchSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<MatchSpec>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub backlog: bool,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub equals: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<MirrorStyle>,
}

impl DisplayConfig {
    fn is_default(&self) -> bool {
        self.markdown.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FiltersConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, rename = "rootNotebook", skip_serializing_if = "Option::is_none")]
    pub root_notebook: Option<String>,
}

impl FiltersConfig {
    fn is_default(&self) -> bool {
        self.tag.is_none() && self.tags.is_empty() && self.root_notebook.is_none()
    }

    /// Tags a note must carry to be on the board at all.
    pub fn base_tags(&self) -> BTreeSet<String> {
        self.tag
            .iter()
            .chain(self.tags.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("note body has no ```kanban config fence")]
    MissingFence,
    #[error("invalid YAML in config fence: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("config defines no columns")]
    NoColumns,
    #[error("column name is empty")]
    EmptyColumnName,
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
    #[error("column '{0}' has no rule")]
    MissingRule(String),
}

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```kanban[ \t]*\r?\n(.*?)```").expect("valid config fence regex")
    })
}

/// Locate the config fence in a note body. Returns the YAML text and the
/// byte range of the whole fence including the backtick lines.
pub fn extract_fence(body: &str) -> Result<(&str, Range<usize>), ConfigError> {
    let caps = fence_regex().captures(body).ok_or(ConfigError::MissingFence)?;
    let whole = caps.get(0).ok_or(ConfigError::MissingFence)?;
    let yaml = caps.get(1).ok_or(ConfigError::MissingFence)?;
    Ok((yaml.as_str(), whole.range()))
}

/// Parse and validate the board config carried by a note body.
pub fn parse_board_config(body: &str) -> Result<BoardConfig, ConfigError> {
    let (yaml, _) = extract_fence(body)?;
    let config: BoardConfig = serde_yaml::from_str(yaml)?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &BoardConfig) -> Result<(), ConfigError> {
    if config.columns.is_empty() {
        return Err(ConfigError::NoColumns);
    }
    let mut seen = BTreeSet::new();
    for column in &config.columns {
        let name = display_name(column);
        if name.is_empty() {
            return Err(ConfigError::EmptyColumnName);
        }
        if !seen.insert(name.clone()) {
            return Err(ConfigError::DuplicateColumn(name));
        }
        if column.rule.is_vacant() {
            return Err(ConfigError::MissingRule(name));
        }
    }
    Ok(())
}

/// Rewrite the YAML inside the fence, leaving surrounding body text alone.
pub fn replace_fence(body: &str, config: &BoardConfig) -> Result<String, ConfigError> {
    let (_, range) = extract_fence(body)?;
    let yaml = serde_yaml::to_string(config)?;
    let mut out = String::with_capacity(body.len() + yaml.len());
    out.push_str(&body[..range.start]);
    out.push_str("```kanban\n");
    out.push_str(&yaml);
    out.push_str("```");
    out.push_str(&body[range.end..]);
    Ok(out)
}

/// Replace everything after the closing fence with the rendered mirror.
pub fn replace_mirror(body: &str, mirror: &str) -> Result<String, ConfigError> {
    let (_, range) = extract_fence(body)?;
    let mut out = String::with_capacity(range.end + mirror.len() + 2);
    out.push_str(&body[..range.end]);
    if !mirror.is_empty() {
        out.push_str("\n\n");
        out.push_str(mirror);
        out.push('\n');
    } else {
        out.push('\n');
    }
    Ok(out)
}

/// Column name as shown on the board. A name written as a markdown link
/// splits into the title and a column link.
fn display_name(column: &ColumnSpec) -> String {
    match parse_markdown_link(&column.name) {
        Some(link) => link.title,
        None => column.name.trim().to_string(),
    }
}

impl BoardConfig {
    /// Compile column specs into rules, resolving notebook names to ids
    /// through the given title-to-id map. Names that do not resolve stay
    /// in the rule set but never match.
    pub fn compile_rules(&self, notebooks: &BTreeMap<String, String>) -> Vec<ColumnRule> {
        self.columns
            .iter()
            .map(|column| {
                let (name, link) = match parse_markdown_link(&column.name) {
                    Some(md) if column.link.is_none() => {
                        let url = md.url.strip_prefix(":/").unwrap_or(&md.url).to_string();
                        (md.title, Some(url))
                    }
                    _ => (column.name.trim().to_string(), column.link.clone()),
                };
                ColumnRule {
                    name,
                    link,
                    matcher: column.rule.compile(notebooks),
                }
            })
            .collect()
    }

    /// Drop a column by display name. Returns false when no column matched.
    pub fn remove_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| display_name(c) != name);
        self.columns.len() != before
    }
}

impl MatchSpec {
    fn is_vacant(&self) -> bool {
        self.tag.is_none()
            && self.tags.is_empty()
            && self.notebook.is_none()
            && self.field.is_none()
            && self.any.is_empty()
            && self.all.is_empty()
            && !self.backlog
            && self.other.is_empty()
    }

    fn compile(&self, notebooks: &BTreeMap<String, String>) -> RuleMatch {
        if !self.other.is_empty() {
            let keys: Vec<&str> = self.other.keys().map(|k| k.as_str()).collect();
            return RuleMatch::Unsupported(keys.join(", "));
        }

        let mut parts = Vec::new();
        if let Some(tag) = &self.tag {
            parts.push(RuleMatch::TagContains(tag.clone()));
        }
        for tag in &self.tags {
            parts.push(RuleMatch::TagContains(tag.clone()));
        }
        if let Some(name) = &self.notebook {
            parts.push(RuleMatch::NotebookEquals {
                name: name.clone(),
                id: notebooks.get(name).cloned(),
            });
        }
        if let Some(field) = &self.field {
            parts.push(RuleMatch::FieldEquals {
                field: field.name.clone(),
                value: field.equals.clone(),
            });
        }
        if !self.all.is_empty() {
            parts.push(RuleMatch::AllOf(
                self.all.iter().map(|m| m.compile(notebooks)).collect(),
            ));
        }
        if !self.any.is_empty() {
            parts.push(RuleMatch::AnyOf(
                self.any.iter().map(|m| m.compile(notebooks)).collect(),
            ));
        }
        if self.backlog {
            parts.push(RuleMatch::Backlog);
        }

        match parts.len() {
            0 => RuleMatch::Unsupported("no recognized rule keys".to_string()),
            1 => parts.remove(0),
            _ => RuleMatch::AllOf(parts),
        }
    }
}
