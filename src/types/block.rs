//! Structural block types produced by the block parser.

use serde::{Deserialize, Serialize};

/// The structural role of a block within the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// A heading line (`# Title`, `<h1>`..`<h6>`).
    Heading,
    /// A run of prose delimited by blank lines or other blocks.
    Paragraph,
    /// A single list item, including its continuation lines.
    ListItem,
    /// A pipe table or `<table>` element. Atomic.
    Table,
    /// A fenced code block or `<pre>` element. Atomic.
    CodeFence,
    /// A block quote.
    Quote,
}

impl BlockKind {
    /// Atomic kinds are never subdivided into units or split across chunks.
    pub fn is_atomic(self) -> bool {
        matches!(self, BlockKind::Table | BlockKind::CodeFence)
    }
}

/// A maximal structural unit extracted from the source document.
///
/// Blocks are created once by the block parser, in document order. The noise
/// filter may normalize their text or remove them outright; nothing else
/// mutates or reorders them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Structural role of this block.
    pub kind: BlockKind,

    /// Heading depth (1-6) for headings, 0 otherwise.
    pub level: usize,

    /// Block text. Raw at parse time; the noise filter collapses whitespace
    /// in non-atomic blocks afterwards.
    pub text: String,

    /// Ancestor heading titles at the time this block was created. A heading
    /// block's path includes its own title. Snapshot, not a live reference.
    pub heading_path: Vec<String>,

    /// Byte offset of the block start in the original source.
    pub start_offset: usize,

    /// Byte offset one past the block end in the original source.
    pub end_offset: usize,
}

impl Block {
    /// Create a new block with the given parameters.
    pub fn new(
        kind: BlockKind,
        level: usize,
        text: impl Into<String>,
        heading_path: Vec<String>,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Self {
            kind,
            level,
            text: text.into(),
            heading_path,
            start_offset,
            end_offset,
        }
    }

    /// Whether this block must be kept whole through the whole pipeline.
    pub fn is_atomic(&self) -> bool {
        self.kind.is_atomic()
    }

    /// Heading path rendered in the `A / B / C` display form.
    pub fn heading_path_string(&self) -> String {
        self.heading_path.join(" / ")
    }
}
