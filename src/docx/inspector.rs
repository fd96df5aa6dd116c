//! Template Inspector: lists the placeholder names a template uses.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use super::package::DEFAULT_PART_LIMIT;
use super::text::extract_text;
use super::{DocxPackage, ExtractionError};

lazy_static! {
    /// `{{ name }}` with optional inner whitespace.
    static ref PLACEHOLDER_PATTERN: Regex =
        Regex::new(r"\{\{\s*([\w.\-]+)\s*\}\}").expect("placeholder pattern is valid");
}

#[derive(Debug, Clone, Copy)]
pub struct TemplateInspector {
    part_limit: u64,
}

impl Default for TemplateInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateInspector {
    pub fn new() -> Self {
        Self::with_part_limit(DEFAULT_PART_LIMIT)
    }

    pub fn with_part_limit(part_limit: u64) -> Self {
        Self { part_limit }
    }

    /// Unique placeholder names in order of first occurrence.
    pub fn inspect(&self, template: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let mut package = DocxPackage::open_with_limit(template, self.part_limit)?;
        let text = extract_text(&mut package)?;
        Ok(placeholders_in(&text))
    }
}

/// Scan plain text for placeholder names.
pub fn placeholders_in(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    PLACEHOLDER_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
