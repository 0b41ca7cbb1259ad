//! Token-budgeted chunk assembly.
//!
//! A single forward pass packs units into chunks. Structural boundaries are
//! never crossed; at the token ceiling the assembler prefers the nearest
//! semantic valley within a lookback window over an arbitrary cut. Atomic
//! blocks larger than the budget become their own oversized chunks, emitted
//! whole.

mod naive;

pub use naive::NaiveSplitter;

use std::collections::HashSet;

use tracing::debug;

use crate::error::RunReport;
use crate::scoring::{cosine_similarity, BoundaryAnalysis, BoundaryStrength};
use crate::types::{Chunk, EngineConfig, Unit};

pub struct ChunkAssembler {
    max_tokens: usize,
    overlap_tokens: usize,
    lookback: usize,
}

impl ChunkAssembler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            overlap_tokens: config.overlap_tokens,
            lookback: config.boundary_lookback,
        }
    }

    /// Pack units into chunks in document order. Ids are sequential from 0.
    pub fn assemble(
        &self,
        units: &[Unit],
        analysis: &BoundaryAnalysis,
        report: &mut RunReport,
    ) -> Vec<Chunk> {
        if units.is_empty() {
            return Vec::new();
        }

        let structural: HashSet<usize> = analysis.structural_positions().collect();
        let semantic: HashSet<usize> = analysis
            .candidates
            .iter()
            .filter(|c| c.strength == BoundaryStrength::Semantic)
            .map(|c| c.position)
            .collect();

        let mut chunks = Vec::new();
        let mut begin = 0; // first unit of the open chunk
        let mut end = 0; // one past the last accepted unit
        let mut tokens = 0;
        let mut last_cut = 0; // one past the last unit of the previous chunk

        while end < units.len() {
            // A structural boundary between end-1 and end closes the chunk;
            // overlap never reaches back across it.
            if end > begin && structural.contains(&(end - 1)) {
                self.close(units, analysis, begin, end, &mut chunks, report);
                last_cut = end;
                begin = end;
                tokens = 0;
                continue;
            }

            let unit_tokens = units[end].token_count;
            if end > begin && tokens + unit_tokens > self.max_tokens {
                let cut = self.pick_cut(begin, end, last_cut, &semantic);
                if cut <= last_cut {
                    // No close point past the previous chunk: merge forward to
                    // guarantee progress. The chunk gets flagged oversized.
                    tokens += unit_tokens;
                    end += 1;
                    continue;
                }
                self.close(units, analysis, begin, cut, &mut chunks, report);
                begin = self.overlap_start(units, &structural, begin, cut);
                last_cut = cut;
                end = cut;
                tokens = units[begin..end].iter().map(|u| u.token_count).sum();
                continue;
            }

            tokens += unit_tokens;
            end += 1;
        }

        if end > begin {
            self.close(units, analysis, begin, end, &mut chunks, report);
        }

        debug!(chunks = chunks.len(), "Chunk assembly complete");
        chunks
    }

    /// Choose where to close a chunk that hit the token ceiling at `end`.
    ///
    /// Boundary `p` sits between units `p` and `p + 1`; closing at `p` yields
    /// the cut `p + 1`. The nearest semantic candidate within the lookback
    /// window wins; otherwise the chunk closes at the last unit that fits.
    fn pick_cut(
        &self,
        begin: usize,
        end: usize,
        last_cut: usize,
        semantic: &HashSet<usize>,
    ) -> usize {
        let window_lo = end.saturating_sub(1 + self.lookback);
        for p in (window_lo..end).rev() {
            if p < begin {
                break;
            }
            if semantic.contains(&p) && p + 1 > last_cut {
                return p + 1;
            }
        }
        end
    }

    /// First unit of the next chunk: `overlap_tokens` worth of trailing units
    /// before `cut`, truncated at any structural boundary and at the start of
    /// the chunk just closed.
    fn overlap_start(
        &self,
        units: &[Unit],
        structural: &HashSet<usize>,
        closed_begin: usize,
        cut: usize,
    ) -> usize {
        if self.overlap_tokens == 0 || cut == 0 || structural.contains(&(cut - 1)) {
            return cut;
        }

        let mut k = cut;
        let mut acc = 0;
        while k > closed_begin {
            if k < cut && structural.contains(&(k - 1)) {
                break;
            }
            let t = units[k - 1].token_count;
            if acc + t > self.overlap_tokens {
                break;
            }
            acc += t;
            k -= 1;
        }
        k
    }

    fn close(
        &self,
        units: &[Unit],
        analysis: &BoundaryAnalysis,
        begin: usize,
        cut: usize,
        chunks: &mut Vec<Chunk>,
        report: &mut RunReport,
    ) {
        let id = chunks.len();
        let members = &units[begin..cut];

        let mut text = String::new();
        for (offset, unit) in members.iter().enumerate() {
            if offset > 0 {
                let previous = &members[offset - 1];
                if unit.block_index == previous.block_index {
                    text.push(' ');
                } else {
                    text.push_str("\n\n");
                }
            }
            text.push_str(&unit.text);
        }

        let token_count: usize = members.iter().map(|u| u.token_count).sum();
        let oversized = token_count > self.max_tokens;
        if oversized {
            report.oversized_chunks.push(id);
        }

        chunks.push(Chunk {
            id,
            text,
            token_count,
            start_offset: members[0].start_offset,
            end_offset: members[cut - begin - 1].end_offset,
            heading_path: members[0].heading_path.clone(),
            coherence_score: coherence(analysis, begin, cut),
            oversized,
            unit_range: (members[0].position, members[cut - begin - 1].position + 1),
        });
    }
}

/// Mean pairwise similarity among a chunk's embedded members.
fn coherence(analysis: &BoundaryAnalysis, begin: usize, cut: usize) -> Option<f32> {
    let embedded: Vec<&Vec<f32>> = (begin..cut)
        .filter_map(|i| analysis.embeddings.get(i).and_then(Option::as_ref))
        .collect();
    if embedded.len() < 2 {
        return None;
    }

    let mut total = 0.0f32;
    let mut pairs = 0usize;
    for i in 0..embedded.len() {
        for j in i + 1..embedded.len() {
            total += cosine_similarity(embedded[i], embedded[j]);
            pairs += 1;
        }
    }
    Some(total / pairs as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::BoundaryCandidate;
    use crate::types::BlockKind;

    fn unit(position: usize, block_index: usize, kind: BlockKind, tokens: usize) -> Unit {
        Unit {
            text: format!("unit {position}"),
            token_count: tokens,
            block_index,
            position,
            start_offset: position * 100,
            end_offset: position * 100 + 50,
            kind,
            heading_path: vec!["Doc".to_string()],
        }
    }

    fn analysis_with(units: &[Unit], candidates: Vec<BoundaryCandidate>) -> BoundaryAnalysis {
        BoundaryAnalysis {
            candidates,
            embeddings: vec![None; units.len()],
            degraded_units: 0,
        }
    }

    fn structural(position: usize) -> BoundaryCandidate {
        BoundaryCandidate {
            position,
            strength: BoundaryStrength::Structural,
            score: 0.0,
        }
    }

    fn semantic(position: usize, score: f32) -> BoundaryCandidate {
        BoundaryCandidate {
            position,
            strength: BoundaryStrength::Semantic,
            score,
        }
    }

    fn assembler(max_tokens: usize, overlap: usize) -> ChunkAssembler {
        ChunkAssembler {
            max_tokens,
            overlap_tokens: overlap,
            lookback: 8,
        }
    }

    #[test]
    fn everything_fits_in_one_chunk() {
        let units: Vec<Unit> = (0..4)
            .map(|i| unit(i, 0, BlockKind::Paragraph, 10))
            .collect();
        let analysis = analysis_with(&units, vec![]);
        let mut report = RunReport::default();
        let chunks = assembler(100, 0).assemble(&units, &analysis, &mut report);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].token_count, 40);
        assert_eq!(chunks[0].unit_range, (0, 4));
        assert!(!chunks[0].oversized);
    }

    #[test]
    fn semantic_valley_beats_token_ceiling() {
        // Ten 100-token units with a valley after unit 3. Budget 1000 would
        // fit all ten; budget 500 overflows at unit 5 and the valley at
        // boundary 3 wins over cutting at the ceiling.
        let units: Vec<Unit> = (0..10)
            .map(|i| unit(i, 0, BlockKind::Paragraph, 100))
            .collect();
        let analysis = analysis_with(&units, vec![semantic(3, 0.1)]);
        let mut report = RunReport::default();
        let chunks = assembler(500, 0).assemble(&units, &analysis, &mut report);

        assert_eq!(chunks[0].unit_range, (0, 4));
        assert_eq!(chunks[0].token_count, 400);
        assert_eq!(chunks[1].unit_range.0, 4);
    }

    #[test]
    fn ceiling_cut_without_semantic_candidates() {
        let units: Vec<Unit> = (0..7)
            .map(|i| unit(i, 0, BlockKind::Paragraph, 100))
            .collect();
        let analysis = analysis_with(&units, vec![]);
        let mut report = RunReport::default();
        let chunks = assembler(300, 0).assemble(&units, &analysis, &mut report);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].unit_range, (0, 3));
        assert_eq!(chunks[1].unit_range, (3, 6));
        assert_eq!(chunks[2].unit_range, (6, 7));
        assert!(chunks.iter().all(|c| c.token_count <= 300));
    }

    #[test]
    fn structural_boundaries_are_never_crossed() {
        let units = vec![
            unit(0, 0, BlockKind::Paragraph, 10),
            unit(1, 1, BlockKind::CodeFence, 10),
            unit(2, 2, BlockKind::Paragraph, 10),
        ];
        let analysis = analysis_with(&units, vec![structural(0), structural(1)]);
        let mut report = RunReport::default();
        let chunks = assembler(1000, 0).assemble(&units, &analysis, &mut report);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].unit_range, (1, 2));
    }

    #[test]
    fn oversized_atomic_unit_is_emitted_whole() {
        let units = vec![
            unit(0, 0, BlockKind::Paragraph, 50),
            unit(1, 1, BlockKind::CodeFence, 3000),
            unit(2, 2, BlockKind::Paragraph, 50),
        ];
        let analysis = analysis_with(&units, vec![structural(0), structural(1)]);
        let mut report = RunReport::default();
        let chunks = assembler(500, 0).assemble(&units, &analysis, &mut report);

        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].oversized);
        assert_eq!(chunks[1].token_count, 3000);
        assert_eq!(chunks[1].unit_range, (1, 2));
        assert_eq!(report.oversized_chunks, vec![1]);
        assert!(!chunks[0].oversized);
    }

    #[test]
    fn overlap_reopens_trailing_units() {
        let units: Vec<Unit> = (0..6)
            .map(|i| unit(i, 0, BlockKind::Paragraph, 100))
            .collect();
        let analysis = analysis_with(&units, vec![]);
        let mut report = RunReport::default();
        let chunks = assembler(300, 100).assemble(&units, &analysis, &mut report);

        // First chunk takes units 0-2; the next reopens one 100-token unit back.
        assert_eq!(chunks[0].unit_range, (0, 3));
        assert_eq!(chunks[1].unit_range.0, 2);
        // Every adjacent pair shares exactly one unit of overlap.
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].unit_range.0 + 1, pair[0].unit_range.1);
        }
    }

    #[test]
    fn overlap_is_truncated_at_section_boundaries() {
        // Heading starts a new section at unit 2.
        let units = vec![
            unit(0, 0, BlockKind::Paragraph, 100),
            unit(1, 0, BlockKind::Paragraph, 100),
            unit(2, 1, BlockKind::Heading, 10),
            unit(3, 2, BlockKind::Paragraph, 100),
        ];
        let analysis = analysis_with(&units, vec![structural(1)]);
        let mut report = RunReport::default();
        let chunks = assembler(300, 100).assemble(&units, &analysis, &mut report);

        assert_eq!(chunks.len(), 2);
        // The second chunk starts exactly at the heading: overlap 0.
        assert_eq!(chunks[1].unit_range.0, 2);
    }

    #[test]
    fn chunk_text_joins_with_original_separators() {
        let mut a = unit(0, 0, BlockKind::Paragraph, 5);
        a.text = "First sentence.".to_string();
        let mut b = unit(1, 0, BlockKind::Paragraph, 5);
        b.text = "Second sentence.".to_string();
        let mut c = unit(2, 1, BlockKind::Paragraph, 5);
        c.text = "New block.".to_string();
        let units = vec![a, b, c];

        let analysis = analysis_with(&units, vec![]);
        let mut report = RunReport::default();
        let chunks = assembler(100, 0).assemble(&units, &analysis, &mut report);

        assert_eq!(
            chunks[0].text,
            "First sentence. Second sentence.\n\nNew block."
        );
    }

    #[test]
    fn coherence_uses_cached_embeddings() {
        let units: Vec<Unit> = (0..3)
            .map(|i| unit(i, 0, BlockKind::Paragraph, 10))
            .collect();
        let mut analysis = analysis_with(&units, vec![]);
        analysis.embeddings[0] = Some(vec![1.0, 0.0]);
        analysis.embeddings[1] = Some(vec![1.0, 0.0]);
        analysis.embeddings[2] = Some(vec![0.0, 1.0]);

        let mut report = RunReport::default();
        let chunks = assembler(100, 0).assemble(&units, &analysis, &mut report);
        let score = chunks[0].coherence_score.unwrap();
        // Pairs: (1.0, 0.0, 0.0) -> mean 1/3.
        assert!((score - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn ids_are_sequential_in_document_order() {
        let units: Vec<Unit> = (0..9)
            .map(|i| unit(i, i / 3, BlockKind::Paragraph, 100))
            .collect();
        let analysis = analysis_with(&units, vec![]);
        let mut report = RunReport::default();
        let chunks = assembler(300, 0).assemble(&units, &analysis, &mut report);

        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id, index);
        }
        for pair in chunks.windows(2) {
            assert!(pair[0].unit_range.1 <= pair[1].unit_range.0 + 1);
        }
    }
}
