//! Chunk type definitions.

use serde::{Deserialize, Serialize};

/// A chunk assembled from a contiguous run of units.
///
/// Chunks are the fundamental unit of content that gets embedded and indexed.
/// Each chunk maintains offsets back into the original source for
/// traceability. Once emitted by the engine a chunk is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Sequential id in document order, 0-based. The dedup collapser may
    /// leave gaps; surviving ids are never renumbered.
    pub id: usize,

    /// The chunk text: member unit texts re-joined with their original
    /// separators (single space within a block, blank line across blocks).
    pub text: String,

    /// Sum of the member units' token counts. Recomputed, never estimated.
    pub token_count: usize,

    /// Byte offset of the first member unit in the original source.
    pub start_offset: usize,

    /// Byte offset one past the last member unit in the original source.
    pub end_offset: usize,

    /// Heading path of the first member unit's owning block.
    pub heading_path: Vec<String>,

    /// Mean pairwise similarity among member units, when embeddings exist.
    /// Diagnostic only; never gates chunk admission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coherence_score: Option<f32>,

    /// True when an unsplittable run (an atomic block, or a forced merge)
    /// pushed the chunk past the token budget. Oversized chunks are emitted
    /// whole, never truncated.
    pub oversized: bool,

    /// Positions of the first and one-past-last member unit.
    #[serde(skip)]
    pub unit_range: (usize, usize),
}

impl Chunk {
    /// Get the length of the chunk text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Check if the chunk is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Heading path rendered in the `A / B / C` display form.
    pub fn heading_path_string(&self) -> String {
        self.heading_path.join(" / ")
    }
}
