use regex::Regex;
use std::sync::OnceLock;

/// Classification of a link attached to a column title or embedded in a
/// board note. Note links open inside the host app, hyperlinks leave it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Note { note_id: String },
    Hyperlink { url: String },
    Invalid,
}

/// A `[title](url)` pair extracted from markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownLink {
    pub title: String,
    pub url: String,
}

fn note_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-f0-9]{32}$").expect("valid note id regex"))
}

fn markdown_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[([^\]]+)\]\(([^)]+)\)$").expect("valid markdown link regex"))
}

/// Note ids are 32 lowercase hex characters.
pub fn is_note_id(text: &str) -> bool {
    note_id_regex().is_match(text)
}

/// Classify a raw link string. Accepts bare note ids, `notes://open-note`
/// callback urls, and `file`/`http`/`https` hyperlinks. Anything else is
/// invalid rather than an error; callers surface a warning.
pub fn classify_link(link: &str) -> LinkTarget {
    if is_note_id(link) {
        return LinkTarget::Note {
            note_id: link.to_string(),
        };
    }

    if let Some(rest) = link.strip_prefix("notes://") {
        return match callback_note_id(rest) {
            Some(note_id) => LinkTarget::Note { note_id },
            None => LinkTarget::Invalid,
        };
    }

    match link.split_once("://") {
        Some(("http" | "https" | "file", rest)) if !rest.is_empty() => LinkTarget::Hyperlink {
            url: link.to_string(),
        },
        _ => LinkTarget::Invalid,
    }
}

/// Extract the note id from an `open-note` callback, e.g.
/// `notes://open-note?id=<32 hex>`. The path must end in `open-note` and
/// the id must look like a note id; other callbacks do not open notes.
fn callback_note_id(rest: &str) -> Option<String> {
    let (path, query) = rest.split_once('?')?;
    if path != "open-note" && !path.ends_with("/open-note") {
        return None;
    }
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == "id" && is_note_id(value) {
            return Some(value.to_string());
        }
    }
    None
}

/// Parse a string that is exactly one markdown link, tolerating surrounding
/// whitespace. Returns `None` for anything else.
pub fn parse_markdown_link(text: &str) -> Option<MarkdownLink> {
    let caps = markdown_link_regex().captures(text.trim())?;
    Some(MarkdownLink {
        title: caps[1].trim().to_string(),
        url: caps[2].trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE_ID: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_bare_note_id_is_note_link() {
        assert_eq!(
            classify_link(NOTE_ID),
            LinkTarget::Note {
                note_id: NOTE_ID.to_string()
            }
        );
    }

    #[test]
    fn test_uppercase_or_short_ids_are_invalid() {
        assert_eq!(classify_link("0123456789ABCDEF0123456789ABCDEF"), LinkTarget::Invalid);
        assert_eq!(classify_link("abc123"), LinkTarget::Invalid);
        assert_eq!(classify_link(""), LinkTarget::Invalid);
    }

    #[test]
    fn test_http_and_file_urls_are_hyperlinks() {
        for url in ["http://example.com", "https://example.com/a?b=c", "file:///tmp/x.md"] {
            assert_eq!(
                classify_link(url),
                LinkTarget::Hyperlink {
                    url: url.to_string()
                }
            );
        }
    }

    #[test]
    fn test_unknown_scheme_is_invalid() {
        assert_eq!(classify_link("ftp://example.com"), LinkTarget::Invalid);
        assert_eq!(classify_link("mailto:me@example.com"), LinkTarget::Invalid);
    }

    #[test]
    fn test_open_note_callback_is_note_link() {
        let link = format!("notes://open-note?id={}", NOTE_ID);
        assert_eq!(
            classify_link(&link),
            LinkTarget::Note {
                note_id: NOTE_ID.to_string()
            }
        );
        let nested = format!("notes://x-callback/open-note?from=board&id={}", NOTE_ID);
        assert_eq!(
            classify_link(&nested),
            LinkTarget::Note {
                note_id: NOTE_ID.to_string()
            }
        );
    }

    #[test]
    fn test_callback_with_bad_path_or_id_is_invalid() {
        assert_eq!(
            classify_link(&format!("notes://open-folder?id={}", NOTE_ID)),
            LinkTarget::Invalid
        );
        assert_eq!(classify_link("notes://open-note?id=nope"), LinkTarget::Invalid);
        assert_eq!(classify_link("notes://open-note"), LinkTarget::Invalid);
    }

    #[test]
    fn test_parse_markdown_link() {
        let link = parse_markdown_link("[Review](:/abc)").unwrap();
        assert_eq!(link.title, "Review");
        assert_eq!(link.url, ":/abc");
    }

    #[test]
    fn test_parse_markdown_link_trims_whitespace() {
        let link = parse_markdown_link("  [ Review ]( https://example.com )  ").unwrap();
        assert_eq!(link.title, "Review");
        assert_eq!(link.url, "https://example.com");
    }

    #[test]
    fn test_parse_markdown_link_rejects_plain_text() {
        assert!(parse_markdown_link("Review").is_none());
        assert!(parse_markdown_link("[Review]").is_none());
        assert!(parse_markdown_link("[Review]()").is_none());
        assert!(parse_markdown_link("(:/abc)[Review]").is_none());
    }
}
