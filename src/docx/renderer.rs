//! Document Renderer: template bytes + data in, filled document bytes out.

use std::collections::HashMap;

use log::debug;
use serde_json::Value;

use super::package::DEFAULT_PART_LIMIT;
use super::template::PartTemplate;
use super::{DocxPackage, RenderData, RenderError};

/// Renderer for `.docx` templates.
#[derive(Debug, Clone, Copy)]
pub struct DocumentRenderer {
    part_limit: u64,
}

impl Default for DocumentRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentRenderer {
    pub fn new() -> Self {
        Self::with_part_limit(DEFAULT_PART_LIMIT)
    }

    /// Refuse templates with any text part inflating past `part_limit` bytes.
    pub fn with_part_limit(part_limit: u64) -> Self {
        Self { part_limit }
    }

    /// Fill every tag of every text part.
    ///
    /// Tag problems from all parts are gathered into a single
    /// [`RenderError::Template`] so the caller sees all of them at once; no
    /// bytes are produced unless every part parsed cleanly.
    pub fn render(&self, template: &[u8], data: &RenderData) -> Result<Vec<u8>, RenderError> {
        let mut package = DocxPackage::open_with_limit(template, self.part_limit)?;

        let mut parsed = Vec::new();
        let mut issues = Vec::new();
        for part in package.text_parts() {
            let xml = package.read_part(&part)?;
            match PartTemplate::parse(&part, &xml) {
                Ok(template) => parsed.push((part, template)),
                Err(RenderError::Template(found)) => issues.extend(found),
                Err(err) => return Err(err),
            }
        }
        if !issues.is_empty() {
            return Err(RenderError::Template(issues));
        }

        let scope = Value::Object(data.clone());
        let mut replacements = HashMap::new();
        for (part, template) in parsed.into_iter().filter(|(_, t)| t.has_tags()) {
            let rendered = template.render(&scope)?;
            debug!("Rendered part {} ({} bytes)", part, rendered.len());
            replacements.insert(part, rendered);
        }

        Ok(package.rewrite(replacements)?)
    }
}
