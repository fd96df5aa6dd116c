//! Delimiter scanning and tag classification.
//!
//! Scanning works on the concatenated text of a part so a tag split across
//! several runs (`{{ref` + `No}}`) is still recognised as one tag.

use super::{TagIssue, TagIssueKind};

pub const OPEN_DELIMITER: &str = "{{";
pub const CLOSE_DELIMITER: &str = "}}";

const SNIPPET_CHARS: usize = 10;

/// Byte range of one `{{ ... }}` tag inside the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpan {
    /// Offset of the opening delimiter.
    pub start: usize,
    /// Offset just past the closing delimiter.
    pub end: usize,
    /// Text between the delimiters, untrimmed.
    pub content: String,
}

#[derive(Debug, Default)]
pub struct Scan {
    pub tags: Vec<TagSpan>,
    pub issues: Vec<TagIssue>,
}

/// Locate every well-delimited tag and report stray delimiters.
pub fn scan(text: &str) -> Scan {
    let bytes = text.as_bytes();
    let mut scan = Scan::default();
    let mut open: Option<usize> = None;
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i..].starts_with(OPEN_DELIMITER.as_bytes()) {
            if let Some(previous) = open.replace(i) {
                scan.issues.push(unclosed_tag(text, previous));
            }
            i += OPEN_DELIMITER.len();
        } else if bytes[i..].starts_with(CLOSE_DELIMITER.as_bytes()) {
            match open.take() {
                Some(start) => {
                    let end = i + CLOSE_DELIMITER.len();
                    scan.tags.push(TagSpan {
                        start,
                        end,
                        content: text[start + OPEN_DELIMITER.len()..i].to_string(),
                    });
                }
                None => scan.issues.push(unopened_tag(text, i)),
            }
            i += CLOSE_DELIMITER.len();
        } else {
            i += 1;
        }
    }

    if let Some(start) = open {
        scan.issues.push(unclosed_tag(text, start));
    }

    scan
}

fn unclosed_tag(text: &str, start: usize) -> TagIssue {
    let after: String = text[start + OPEN_DELIMITER.len()..]
        .chars()
        .take(SNIPPET_CHARS)
        .collect();
    TagIssue::new(
        TagIssueKind::UnclosedTag,
        after.trim(),
        format!("The tag beginning with \"{OPEN_DELIMITER}{after}\" is unclosed"),
    )
}

fn unopened_tag(text: &str, close: usize) -> TagIssue {
    let mut before: Vec<char> = text[..close].chars().rev().take(SNIPPET_CHARS).collect();
    before.reverse();
    let before: String = before.into_iter().collect();
    TagIssue::new(
        TagIssueKind::UnopenedTag,
        before.trim(),
        format!("The tag ending with \"{before}{CLOSE_DELIMITER}\" is unopened"),
    )
}

/// What a tag asks the renderer to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagKind {
    /// `{{name}}`
    Value(String),
    /// `{{#name}}` or, when inverted, `{{^name}}`
    SectionOpen { name: String, inverted: bool },
    /// `{{/name}}`
    SectionClose(String),
}

/// Classify the text between delimiters.
pub fn classify(content: &str) -> Result<TagKind, TagIssue> {
    let trimmed = content.trim();
    let (kind, name): (fn(String) -> TagKind, &str) = match trimmed.chars().next() {
        Some('#') => (section_open, &trimmed[1..]),
        Some('^') => (inverted_open, &trimmed[1..]),
        Some('/') => (TagKind::SectionClose, &trimmed[1..]),
        _ => (TagKind::Value, trimmed),
    };

    let name = name.trim();
    if !is_valid_name(name) {
        return Err(TagIssue::new(
            TagIssueKind::InvalidTag,
            trimmed,
            format!("The tag \"{trimmed}\" is not a valid placeholder name"),
        ));
    }

    Ok(kind(name.to_string()))
}

fn section_open(name: String) -> TagKind {
    TagKind::SectionOpen { name, inverted: false }
}

fn inverted_open(name: String) -> TagKind {
    TagKind::SectionOpen { name, inverted: true }
}

/// Letters, digits, `_`, `.` and `-`; never empty.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
