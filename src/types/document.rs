//! Input document types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the raw source text should be parsed into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    Markdown,
    Html,
    Text,
}

impl ParseMode {
    /// Map a file extension or content-type hint to a parse mode.
    /// Unrecognized hints fall back to plain text.
    pub fn detect(hint: &str) -> Self {
        let hint = hint.trim().to_lowercase();
        let ext = hint.rsplit('.').next().unwrap_or(&hint);
        if ext == "md" || ext == "markdown" || hint.contains("markdown") {
            ParseMode::Markdown
        } else if ext == "html" || ext == "htm" || hint.contains("html") {
            ParseMode::Html
        } else {
            ParseMode::Text
        }
    }
}

/// A raw document handed to the engine.
///
/// Multiple documents may be submitted together so the noise filter can
/// detect boilerplate recurring across same-template pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Identity of this document within the run.
    pub id: Uuid,

    /// Raw source text.
    pub text: String,

    /// Parse mode for the block parser.
    pub mode: ParseMode,
}

impl Document {
    /// Create a document with a fresh id.
    pub fn new(text: impl Into<String>, mode: ParseMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            mode,
        }
    }
}
