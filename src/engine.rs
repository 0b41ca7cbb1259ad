//! Pipeline orchestration.
//!
//! Wires the stages together in strict forward order: parse, filter noise,
//! segment, score boundaries, assemble, and optionally collapse duplicates.
//! Per-unit and per-block failures degrade quality and land in the run
//! report; only configuration problems abort a run.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::assembly::ChunkAssembler;
use crate::dedup::DedupCollapser;
use crate::embedding::Embedder;
use crate::error::{ConfigError, RunReport};
use crate::parser;
use crate::processing::{NoiseFilter, UnitSegmenter};
use crate::scoring::BoundaryScorer;
use crate::tokenizer::{MemoizedCounter, TokenCounter};
use crate::types::{Chunk, Document, EngineConfig};

/// The chunk sequence and run report for one document.
#[derive(Debug)]
pub struct ChunkRun {
    pub chunks: Vec<Chunk>,
    pub report: RunReport,
    /// When the run finished. Run metadata, not part of the chunk contract.
    pub generated_at: DateTime<Utc>,
}

/// The chunking engine.
///
/// Capabilities are injected so core logic can be driven by deterministic
/// stubs in tests: the embedder supplies vectors, the token counter supplies
/// counts, and both are treated as pure functions for the run.
pub struct ChunkingEngine {
    config: EngineConfig,
    embedder: Arc<dyn Embedder>,
    counter: Arc<MemoizedCounter>,
    segmenter: UnitSegmenter,
}

impl ChunkingEngine {
    /// Create an engine, rejecting invalid configuration up front.
    pub fn new(
        config: EngineConfig,
        embedder: Arc<dyn Embedder>,
        counter: Arc<dyn TokenCounter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            embedder,
            counter: Arc::new(MemoizedCounter::new(counter)),
            segmenter: UnitSegmenter::new(),
        })
    }

    /// Chunk a single document.
    pub async fn run(&self, document: &Document) -> Result<ChunkRun> {
        let mut runs = self.run_many(std::slice::from_ref(document)).await?;
        Ok(runs.pop().expect("one run per document"))
    }

    /// Chunk a batch of same-template documents.
    ///
    /// Submitting related pages together lets the noise filter drop
    /// boilerplate recurring across them. Output order matches input order.
    pub async fn run_many(&self, documents: &[Document]) -> Result<Vec<ChunkRun>> {
        let mut reports: Vec<RunReport> = Vec::with_capacity(documents.len());
        let mut block_seqs = Vec::with_capacity(documents.len());

        for document in documents {
            let (blocks, warnings) = parser::parse(&document.text, document.mode);
            info!(
                document = %document.id,
                blocks = blocks.len(),
                warnings = warnings.len(),
                "Parsed document"
            );
            reports.push(RunReport {
                warnings,
                ..RunReport::default()
            });
            block_seqs.push(blocks);
        }

        let removed = NoiseFilter::new().apply(&mut block_seqs);
        for (report, count) in reports.iter_mut().zip(removed) {
            report.boilerplate_blocks_removed = count;
        }

        let scorer = BoundaryScorer::new(&self.config);
        let assembler = ChunkAssembler::new(&self.config);

        let mut runs = Vec::with_capacity(documents.len());
        for (blocks, mut report) in block_seqs.into_iter().zip(reports) {
            let units = self.segmenter.segment(&blocks, self.counter.as_ref());
            let analysis = scorer.analyze(&units, self.embedder.as_ref()).await;
            report.degraded_units = analysis.degraded_units;

            let mut chunks = assembler.assemble(&units, &analysis, &mut report);
            if self.config.dedupe {
                chunks =
                    DedupCollapser::new(&self.config).collapse(chunks, &analysis.embeddings, &mut report);
            }

            info!(
                chunks = chunks.len(),
                oversized = report.oversized_chunks.len(),
                degraded_units = report.degraded_units,
                dedup_drops = report.dedup_drops.len(),
                "Chunking run complete"
            );
            runs.push(ChunkRun {
                chunks,
                report,
                generated_at: Utc::now(),
            });
        }

        Ok(runs)
    }

    /// The effective configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
