//! Word document templating.
//!
//! This module contains everything that touches the `.docx` package itself:
//! - `package` - zip container access and rewriting
//! - `lexer` - `{{tag}}` delimiter scanning across split text runs
//! - `template` - part parsing, tag tree building and rendering
//! - `text` - plain text extraction
//! - `renderer` / `inspector` - the two operations exposed to handlers

pub mod inspector;
pub mod lexer;
pub mod package;
pub mod renderer;
pub mod template;
pub mod text;

pub use inspector::TemplateInspector;
pub use package::DocxPackage;
pub use renderer::DocumentRenderer;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// MIME type of a WordprocessingML document.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Flat (or nested, for sections) data used to fill a template.
pub type RenderData = serde_json::Map<String, serde_json::Value>;

/// Errors raised while reading or writing the zip package.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("template is not a valid .docx package: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("template is missing the `{0}` part")]
    MissingPart(String),
    #[error("part `{part}` is not valid XML: {message}")]
    Xml { part: String, message: String },
    #[error("part `{0}` is not valid UTF-8")]
    Encoding(String),
    #[error("part `{part}` inflates past the {limit} byte limit")]
    PartTooLarge { part: String, limit: u64 },
    #[error("failed to write document package: {0}")]
    Io(#[from] std::io::Error),
}

/// Category of a template tag problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TagIssueKind {
    UnclosedTag,
    UnopenedTag,
    InvalidTag,
    UnclosedLoop,
    UnopenedLoop,
    MismatchedLoop,
    MisalignedLoop,
}

/// One problem found in a template, reported per offending tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TagIssue {
    pub kind: TagIssueKind,
    /// Tag text as written between the delimiters.
    pub tag: String,
    /// Package part the tag lives in, e.g. `word/document.xml`.
    pub part: String,
    pub explanation: String,
}

impl TagIssue {
    pub fn new(kind: TagIssueKind, tag: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            kind,
            tag: tag.into(),
            part: String::new(),
            explanation: explanation.into(),
        }
    }

    pub fn in_part(mut self, part: &str) -> Self {
        self.part = part.to_string();
        self
    }
}

/// Errors produced by [`DocumentRenderer::render`].
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("{}", join_explanations(.0))]
    Template(Vec<TagIssue>),
}

impl RenderError {
    /// Per-tag issues, empty when the package itself could not be opened.
    pub fn issues(&self) -> &[TagIssue] {
        match self {
            Self::Template(issues) => issues,
            Self::Package(_) => &[],
        }
    }
}

/// Errors produced by [`TemplateInspector::inspect`].
#[derive(Debug, Error)]
#[error("failed to extract text from template: {0}")]
pub struct ExtractionError(#[from] pub PackageError);

pub const EXPLANATION_SEPARATOR: &str = " | ";

fn join_explanations(issues: &[TagIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.explanation.as_str())
        .collect::<Vec<_>>()
        .join(EXPLANATION_SEPARATOR)
}
