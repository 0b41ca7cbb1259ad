//! Error taxonomy and run reporting.
//!
//! Only configuration problems are fatal. Everything else a run can hit is
//! collected into a [`RunReport`] and returned alongside the chunks, so the
//! caller decides whether to log, warn, or fail upstream.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid configuration, rejected before any processing begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_tokens must be greater than 0")]
    ZeroMaxTokens,

    #[error("overlap_tokens ({overlap}) must be less than max_tokens ({max})")]
    OverlapTooLarge { overlap: usize, max: usize },

    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f32 },

    #[error("embed_batch_size must be greater than 0")]
    ZeroBatchSize,
}

/// A recoverable structural problem found while parsing.
///
/// The parser recovers by treating the malformed region as atomic through
/// the end of the document; the warning records what happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralWarning {
    /// A fenced code block was opened but never closed.
    UnterminatedFence {
        /// 1-based line number of the opening fence.
        line: usize,
    },
    /// An HTML element that maps to an atomic block was never closed.
    UnclosedElement {
        tag: String,
        /// Byte offset of the opening tag.
        offset: usize,
    },
}

impl std::fmt::Display for StructuralWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructuralWarning::UnterminatedFence { line } => {
                write!(f, "unterminated code fence opened at line {line}")
            }
            StructuralWarning::UnclosedElement { tag, offset } => {
                write!(f, "unclosed <{tag}> element at byte offset {offset}")
            }
        }
    }
}

/// Record of a chunk dropped by the dedup collapser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupDrop {
    /// Id of the dropped chunk.
    pub dropped_id: usize,
    /// Id of the surviving near-duplicate.
    pub kept_id: usize,
    /// Similarity that triggered the drop.
    pub similarity: f32,
}

/// Non-fatal conditions collected across one document's run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Structural problems the parser recovered from.
    pub warnings: Vec<StructuralWarning>,

    /// Units whose boundary decisions degraded to structural-only because
    /// embedding failed after retries.
    pub degraded_units: usize,

    /// Boilerplate blocks removed by the noise filter.
    pub boilerplate_blocks_removed: usize,

    /// Ids of chunks emitted past the token budget.
    pub oversized_chunks: Vec<usize>,

    /// Chunks dropped as near-duplicates.
    pub dedup_drops: Vec<DedupDrop>,
}

impl RunReport {
    /// Whether the run completed without any degradation at all.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
            && self.degraded_units == 0
            && self.oversized_chunks.is_empty()
            && self.dedup_drops.is_empty()
    }
}
