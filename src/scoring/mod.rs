//! Semantic and structural boundary detection.
//!
//! Embeds adjacent non-atomic units, computes the similarity curve between
//! neighbors, and marks split candidates. Structural candidates (heading
//! starts, atomic block edges) are absolute; semantic candidates are
//! similarity valleys below the configured threshold.

use tracing::{debug, warn};

use crate::embedding::{embed_with_retry, Embedder, EMBED_RETRY_ATTEMPTS};
use crate::types::{BlockKind, EngineConfig, Unit};

/// How strongly a boundary candidate binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryStrength {
    /// Block transition that can never be crossed by a chunk.
    Structural,
    /// Similarity valley; preferred close point, but crossable.
    Semantic,
}

/// A position between unit `position` and unit `position + 1` eligible to
/// become a chunk split point.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCandidate {
    pub position: usize,
    pub strength: BoundaryStrength,
    /// Adjacent-unit similarity for semantic candidates; 0.0 for structural
    /// ones, whose priority is absolute regardless of score.
    pub score: f32,
}

/// Output of the boundary scorer for one document.
#[derive(Debug, Default)]
pub struct BoundaryAnalysis {
    /// Candidates ordered by position.
    pub candidates: Vec<BoundaryCandidate>,
    /// Per-unit embeddings, cached for the lifetime of the run. `None` for
    /// atomic units and for units whose batch failed.
    pub embeddings: Vec<Option<Vec<f32>>>,
    /// Units whose boundary decisions degraded to structural-only.
    pub degraded_units: usize,
}

impl BoundaryAnalysis {
    /// Positions of structural candidates.
    pub fn structural_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.candidates
            .iter()
            .filter(|c| c.strength == BoundaryStrength::Structural)
            .map(|c| c.position)
    }
}

/// Scores boundaries between adjacent units.
pub struct BoundaryScorer {
    min_sim: f32,
    valley_window: usize,
    batch_size: usize,
}

impl BoundaryScorer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            min_sim: config.min_sim,
            valley_window: config.valley_window,
            batch_size: config.embed_batch_size,
        }
    }

    /// Embed units, build the similarity curve, and collect candidates.
    pub async fn analyze(&self, units: &[Unit], embedder: &dyn Embedder) -> BoundaryAnalysis {
        let mut analysis = BoundaryAnalysis {
            embeddings: vec![None; units.len()],
            ..Default::default()
        };
        if units.is_empty() {
            return analysis;
        }

        self.embed_units(units, embedder, &mut analysis).await;

        let sims = similarity_curve(units, &analysis.embeddings);
        let structural = structural_positions(units);

        for position in 0..units.len().saturating_sub(1) {
            if structural[position] {
                analysis.candidates.push(BoundaryCandidate {
                    position,
                    strength: BoundaryStrength::Structural,
                    score: 0.0,
                });
                continue;
            }
            if let Some(sim) = sims[position] {
                if sim < self.min_sim && is_local_minimum(&sims, position, self.valley_window) {
                    analysis.candidates.push(BoundaryCandidate {
                        position,
                        strength: BoundaryStrength::Semantic,
                        score: sim,
                    });
                }
            }
        }

        debug!(
            units = units.len(),
            candidates = analysis.candidates.len(),
            degraded = analysis.degraded_units,
            "Boundary analysis complete"
        );
        analysis
    }

    /// Embed all non-atomic units in batches. A failed batch degrades only
    /// its own units.
    async fn embed_units(
        &self,
        units: &[Unit],
        embedder: &dyn Embedder,
        analysis: &mut BoundaryAnalysis,
    ) {
        let embeddable: Vec<usize> = units
            .iter()
            .filter(|u| !u.is_atomic())
            .map(|u| u.position)
            .collect();

        for batch in embeddable.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|&i| units[i].text.as_str()).collect();
            match embed_with_retry(embedder, &texts, EMBED_RETRY_ATTEMPTS).await {
                Ok(vectors) => {
                    for (&position, vector) in batch.iter().zip(vectors) {
                        analysis.embeddings[position] = Some(vector);
                    }
                }
                Err(e) => {
                    warn!(
                        batch_size = batch.len(),
                        error = %e,
                        "Embedding batch failed after retries, degrading to structural boundaries"
                    );
                    analysis.degraded_units += batch.len();
                }
            }
        }
    }
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Similarity between each adjacent unit pair, where both sides have
/// embeddings.
fn similarity_curve(units: &[Unit], embeddings: &[Option<Vec<f32>>]) -> Vec<Option<f32>> {
    (0..units.len().saturating_sub(1))
        .map(|i| match (&embeddings[i], &embeddings[i + 1]) {
            (Some(a), Some(b)) => Some(cosine_similarity(a, b)),
            _ => None,
        })
        .collect()
}

/// Flags for each boundary position whose crossing is structurally forbidden:
/// a heading starts, or an atomic block starts or ends.
fn structural_positions(units: &[Unit]) -> Vec<bool> {
    (0..units.len().saturating_sub(1))
        .map(|i| {
            let a = &units[i];
            let b = &units[i + 1];
            a.block_index != b.block_index
                && (b.kind == BlockKind::Heading || a.is_atomic() || b.is_atomic())
        })
        .collect()
}

/// A valley must not have a strictly lower neighbor within the window.
fn is_local_minimum(sims: &[Option<f32>], position: usize, window: usize) -> bool {
    let lo = position.saturating_sub(window);
    let hi = (position + window).min(sims.len().saturating_sub(1));
    for neighbor in lo..=hi {
        if neighbor == position {
            continue;
        }
        if let Some(s) = sims[neighbor] {
            if s < sims[position].unwrap_or(f32::MAX) {
                return false;
            }
        }
    }
    true
}
