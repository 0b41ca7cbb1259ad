//! Near-duplicate chunk collapsing.
//!
//! Optional final stage. Each chunk gets a fingerprint (mean of its cached
//! unit embeddings when available, shingled text hashes otherwise) and is
//! compared against a bounded window of surviving predecessors. The earlier
//! chunk always wins; surviving spans are never widened to cover a drop.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{DedupDrop, RunReport};
use crate::processing::normalize_whitespace;
use crate::scoring::cosine_similarity;
use crate::types::{Chunk, EngineConfig};

/// Graphemes per text shingle when no embeddings are available.
const SHINGLE_SIZE: usize = 8;

pub struct DedupCollapser {
    threshold: f32,
    window: usize,
}

struct Fingerprint {
    /// Mean of the chunk's unit embeddings, when any were computed.
    mean: Option<Vec<f32>>,
    /// Hashed grapheme shingles of the normalized text.
    shingles: HashSet<u64>,
    /// Normalized text, for exact-duplicate detection.
    key: String,
}

impl DedupCollapser {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            threshold: config.dedupe_sim,
            window: config.dedupe_window,
        }
    }

    /// Drop chunks that near-duplicate an earlier survivor within the
    /// comparison window. Exact duplicates always collapse.
    pub fn collapse(
        &self,
        chunks: Vec<Chunk>,
        embeddings: &[Option<Vec<f32>>],
        report: &mut RunReport,
    ) -> Vec<Chunk> {
        let mut survivors: Vec<Chunk> = Vec::new();
        let mut prints: Vec<Fingerprint> = Vec::new();

        for chunk in chunks {
            let print = fingerprint(&chunk, embeddings);
            let window_start = survivors.len().saturating_sub(self.window);

            let mut drop = None;
            for i in (window_start..survivors.len()).rev() {
                let exact = !print.key.is_empty() && prints[i].key == print.key;
                let sim = if exact {
                    1.0
                } else {
                    similarity(&prints[i], &print)
                };
                if exact || sim >= self.threshold {
                    drop = Some(DedupDrop {
                        dropped_id: chunk.id,
                        kept_id: survivors[i].id,
                        similarity: sim,
                    });
                    break;
                }
            }

            match drop {
                Some(record) => {
                    debug!(
                        dropped = record.dropped_id,
                        kept = record.kept_id,
                        similarity = record.similarity,
                        "Collapsed near-duplicate chunk"
                    );
                    report.dedup_drops.push(record);
                }
                None => {
                    survivors.push(chunk);
                    prints.push(print);
                }
            }
        }

        survivors
    }
}

fn fingerprint(chunk: &Chunk, embeddings: &[Option<Vec<f32>>]) -> Fingerprint {
    let key = normalize_whitespace(&chunk.text).to_lowercase();
    Fingerprint {
        mean: mean_embedding(chunk, embeddings),
        shingles: shingles(&key),
        key,
    }
}

/// Elementwise mean of the chunk's member-unit embeddings.
fn mean_embedding(chunk: &Chunk, embeddings: &[Option<Vec<f32>>]) -> Option<Vec<f32>> {
    let (start, end) = chunk.unit_range;
    let members: Vec<&Vec<f32>> = (start..end.min(embeddings.len()))
        .filter_map(|i| embeddings[i].as_ref())
        .collect();
    let first = members.first()?;

    let mut mean = vec![0.0f32; first.len()];
    for vector in &members {
        for (slot, value) in mean.iter_mut().zip(vector.iter()) {
            *slot += value;
        }
    }
    let n = members.len() as f32;
    for slot in &mut mean {
        *slot /= n;
    }
    Some(mean)
}

fn shingles(key: &str) -> HashSet<u64> {
    let graphemes: Vec<&str> = key.graphemes(true).collect();
    let mut set = HashSet::new();
    if graphemes.len() < SHINGLE_SIZE {
        if !key.is_empty() {
            set.insert(hash_shingle(&graphemes));
        }
        return set;
    }
    for window in graphemes.windows(SHINGLE_SIZE) {
        set.insert(hash_shingle(window));
    }
    set
}

fn hash_shingle(graphemes: &[&str]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for g in graphemes {
        g.hash(&mut hasher);
    }
    hasher.finish()
}

fn similarity(a: &Fingerprint, b: &Fingerprint) -> f32 {
    match (&a.mean, &b.mean) {
        (Some(ma), Some(mb)) => cosine_similarity(ma, mb),
        _ => jaccard(&a.shingles, &b.shingles),
    }
}

fn jaccard(a: &HashSet<u64>, b: &HashSet<u64>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32
}
