//! End-to-end pipeline tests driven by deterministic stub capabilities.

use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use smartchunk::embedding::{Embedder, EmbeddingError};
use smartchunk::error::StructuralWarning;
use smartchunk::tokenizer::TokenCounter;
use smartchunk::{ChunkingEngine, Document, EngineConfig, ParseMode};

/// Counts whitespace-separated words; deterministic and fast.
struct WhitespaceCounter;

impl TokenCounter for WhitespaceCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn identity(&self) -> &str {
        "whitespace"
    }
}

/// Maps each text onto a topic axis: anything mentioning "omega" is
/// orthogonal to everything else. Gives full control over the similarity
/// curve without a model.
struct TopicEmbedder;

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| {
                if t.to_lowercase().contains("omega") {
                    vec![0.0, 1.0]
                } else {
                    vec![1.0, 0.0]
                }
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        2
    }
}

/// Always fails, to exercise graceful degradation.
struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Api("backend offline".to_string()))
    }

    fn dimensions(&self) -> usize {
        2
    }
}

fn engine(config: EngineConfig) -> ChunkingEngine {
    ChunkingEngine::new(config, Arc::new(TopicEmbedder), Arc::new(WhitespaceCounter))
        .expect("valid config")
}

/// A sentence of exactly `words` whitespace tokens, capitalized so the
/// segmenter recognizes its start.
fn sentence(word: &str, words: usize) -> String {
    let mut first = word.to_string();
    if let Some(c) = first.get_mut(0..1) {
        c.make_ascii_uppercase();
    }
    let mut parts = vec![first];
    parts.extend(std::iter::repeat(word.to_string()).take(words.saturating_sub(1)));
    format!("{}.", parts.join(" "))
}

#[tokio::test]
async fn semantic_valley_beats_token_ceiling() {
    // One 2000-token paragraph: nine 100-token "alpha" sentences, then
    // eleven "omega" ones. The topic shift sits at token 900; the budget
    // would allow 1000. The assembler must close at the valley.
    let mut sentences: Vec<String> = (0..9).map(|_| sentence("alpha", 100)).collect();
    sentences.extend((0..11).map(|_| sentence("omega", 100)));
    let text = sentences.join(" ");

    let config = EngineConfig {
        max_tokens: 1000,
        overlap_tokens: 0,
        min_sim: 0.5,
        ..EngineConfig::default()
    };
    let run = engine(config)
        .run(&Document::new(text, ParseMode::Text))
        .await
        .unwrap();

    assert_eq!(run.chunks[0].token_count, 900);
    assert!(!run.chunks[0].text.to_lowercase().contains("omega"));
    assert!(run.chunks[1].text.to_lowercase().starts_with("omega"));
}

#[tokio::test]
async fn lone_oversized_code_fence_is_one_verbatim_chunk() {
    let body = vec!["word"; 3000].join(" ");
    let source = format!("```\n{body}\n```");

    let config = EngineConfig {
        max_tokens: 500,
        overlap_tokens: 0,
        ..EngineConfig::default()
    };
    let run = engine(config)
        .run(&Document::new(source.clone(), ParseMode::Markdown))
        .await
        .unwrap();

    assert_eq!(run.chunks.len(), 1);
    assert!(run.chunks[0].oversized);
    assert_eq!(run.chunks[0].text, source);
    assert_eq!(run.report.oversized_chunks, vec![0]);
}

#[tokio::test]
async fn near_duplicate_paragraphs_are_collapsed() {
    // Two paragraphs embedding to the same vector (cosine 1.0 >= 0.9).
    // A small budget forces them into separate chunks first.
    let text = format!("{}\n\n{}\n", sentence("alpha", 10), sentence("alpha", 10));

    let config = EngineConfig {
        max_tokens: 12,
        overlap_tokens: 0,
        dedupe: true,
        dedupe_sim: 0.9,
        ..EngineConfig::default()
    };
    let run = engine(config)
        .run(&Document::new(text, ParseMode::Markdown))
        .await
        .unwrap();

    assert_eq!(run.chunks.len(), 1);
    assert_eq!(run.chunks[0].id, 0);
    assert_eq!(run.chunks[0].start_offset, 0);
    assert_eq!(run.report.dedup_drops.len(), 1);
    assert_eq!(run.report.dedup_drops[0].dropped_id, 1);
}

#[tokio::test]
async fn dedupe_never_increases_chunk_count() {
    let text = format!(
        "# A\n\n{}\n\n{}\n\n# B\n\n{}\n",
        sentence("alpha", 10),
        sentence("alpha", 10),
        sentence("omega", 10)
    );

    let base = EngineConfig {
        max_tokens: 12,
        overlap_tokens: 0,
        ..EngineConfig::default()
    };
    let without = engine(base.clone())
        .run(&Document::new(text.clone(), ParseMode::Markdown))
        .await
        .unwrap();

    let with = engine(EngineConfig {
        dedupe: true,
        dedupe_sim: 0.9,
        ..base
    })
    .run(&Document::new(text, ParseMode::Markdown))
    .await
    .unwrap();

    assert!(with.chunks.len() <= without.chunks.len());
}

#[tokio::test]
async fn runs_are_idempotent() {
    let text = "\
# Guide

## Setup

Install the package. Configure the paths. Verify everything works.

- First step
- Second step

```sh
make install
```

## Usage

Run the tool. Inspect the omega output. Repeat as needed.
";

    let config = EngineConfig {
        max_tokens: 20,
        overlap_tokens: 4,
        min_sim: 0.5,
        ..EngineConfig::default()
    };

    let first = engine(config.clone())
        .run(&Document::new(text, ParseMode::Markdown))
        .await
        .unwrap();
    let second = engine(config)
        .run(&Document::new(text, ParseMode::Markdown))
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_string(&first.chunks).unwrap(),
        serde_json::to_string(&second.chunks).unwrap()
    );
}

#[tokio::test]
async fn token_budget_binds_every_non_oversized_chunk() {
    let mut sections = String::new();
    for i in 0..5 {
        sections.push_str(&format!("## Section {i}\n\n"));
        for _ in 0..6 {
            sections.push_str(&sentence("alpha", 17));
            sections.push(' ');
        }
        sections.push_str("\n\n");
    }

    let config = EngineConfig {
        max_tokens: 40,
        overlap_tokens: 8,
        ..EngineConfig::default()
    };
    let run = engine(config)
        .run(&Document::new(sections, ParseMode::Markdown))
        .await
        .unwrap();

    assert!(run.chunks.len() > 1);
    for chunk in &run.chunks {
        if !chunk.oversized {
            assert!(
                chunk.token_count <= 40,
                "chunk {} has {} tokens",
                chunk.id,
                chunk.token_count
            );
        }
    }
}

#[tokio::test]
async fn overlap_reappears_unless_truncated_by_a_section() {
    let text = format!(
        "## One\n\n{} {} {} {}\n\n## Two\n\n{}\n",
        sentence("alpha", 10),
        sentence("bravo", 10),
        sentence("delta", 10),
        sentence("echo", 10),
        sentence("omega", 10)
    );

    let config = EngineConfig {
        max_tokens: 25,
        overlap_tokens: 10,
        min_sim: 0.0,
        ..EngineConfig::default()
    };
    let run = engine(config)
        .run(&Document::new(text, ParseMode::Markdown))
        .await
        .unwrap();

    for pair in run.chunks.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.heading_path == next.heading_path {
            // Overlap: the next chunk reopens trailing units.
            assert!(next.unit_range.0 < prev.unit_range.1);
        } else {
            // Truncated at the section boundary: no shared units.
            assert!(next.unit_range.0 >= prev.unit_range.1);
        }
    }

    // At least one of each case occurs in this document.
    assert!(run
        .chunks
        .windows(2)
        .any(|p| p[1].unit_range.0 < p[0].unit_range.1));
    assert!(run
        .chunks
        .windows(2)
        .any(|p| p[1].unit_range.0 >= p[0].unit_range.1));
}

#[tokio::test]
async fn atomic_blocks_are_fully_contained_in_one_chunk() {
    let fence = "```rust\nfn alpha() {}\nfn omega() {}\n```";
    let text = format!(
        "# Doc\n\n{} {}\n\n{fence}\n\n{}\n",
        sentence("alpha", 20),
        sentence("bravo", 20),
        sentence("omega", 20)
    );

    let config = EngineConfig {
        max_tokens: 30,
        overlap_tokens: 5,
        ..EngineConfig::default()
    };
    let run = engine(config)
        .run(&Document::new(text, ParseMode::Markdown))
        .await
        .unwrap();

    let holders: Vec<_> = run
        .chunks
        .iter()
        .filter(|c| c.text.contains("fn alpha() {}"))
        .collect();
    assert_eq!(holders.len(), 1);
    assert!(holders[0].text.contains(fence));
}

#[tokio::test]
async fn chunk_order_follows_document_order() {
    let text = format!(
        "# A\n\n{}\n\n# B\n\n{}\n\n# C\n\n{}\n",
        sentence("alpha", 30),
        sentence("bravo", 30),
        sentence("omega", 30)
    );

    let config = EngineConfig {
        max_tokens: 50,
        overlap_tokens: 10,
        ..EngineConfig::default()
    };
    let run = engine(config)
        .run(&Document::new(text, ParseMode::Markdown))
        .await
        .unwrap();

    for (index, chunk) in run.chunks.iter().enumerate() {
        assert_eq!(chunk.id, index);
    }
    for pair in run.chunks.windows(2) {
        assert!(pair[0].unit_range.0 <= pair[1].unit_range.0);
        assert!(pair[0].start_offset <= pair[1].start_offset);
    }
}

#[tokio::test]
async fn invalid_config_is_rejected_before_processing() {
    let config = EngineConfig {
        max_tokens: 100,
        overlap_tokens: 100,
        ..EngineConfig::default()
    };
    let result = ChunkingEngine::new(config, Arc::new(TopicEmbedder), Arc::new(WhitespaceCounter));
    assert!(result.is_err());
}

#[tokio::test]
async fn embedding_outage_degrades_without_failing_the_run() {
    let text = format!(
        "# Doc\n\n{} {}\n\n{}\n",
        sentence("alpha", 10),
        sentence("bravo", 10),
        sentence("omega", 10)
    );

    let engine = ChunkingEngine::new(
        EngineConfig::default(),
        Arc::new(DownEmbedder),
        Arc::new(WhitespaceCounter),
    )
    .unwrap();

    let run = engine
        .run(&Document::new(text, ParseMode::Markdown))
        .await
        .unwrap();

    assert!(!run.chunks.is_empty());
    assert!(run.report.degraded_units > 0);
    assert!(run.chunks.iter().all(|c| c.coherence_score.is_none()));
}

#[tokio::test]
async fn unterminated_fence_is_reported_not_fatal() {
    let text = "# Doc\n\nIntro sentence here.\n\n```python\nx = 1\n";
    let run = engine(EngineConfig::default())
        .run(&Document::new(text, ParseMode::Markdown))
        .await
        .unwrap();

    assert_eq!(run.report.warnings.len(), 1);
    assert!(matches!(
        run.report.warnings[0],
        StructuralWarning::UnterminatedFence { .. }
    ));
    assert!(run.chunks.iter().any(|c| c.text.contains("x = 1")));
}

#[tokio::test]
async fn boilerplate_is_removed_across_pages() {
    let footer = "Copyright Example Corp all rights reserved";
    let pages: Vec<Document> = (0..3)
        .map(|i| {
            Document::new(
                format!("# Page {i}\n\nUnique alpha content number {i} here.\n\n{footer}\n"),
                ParseMode::Markdown,
            )
        })
        .collect();

    let runs = engine(EngineConfig::default()).run_many(&pages).await.unwrap();

    assert_eq!(runs.len(), 3);
    for run in &runs {
        assert_eq!(run.report.boilerplate_blocks_removed, 1);
        assert!(!run.chunks.iter().any(|c| c.text.contains("Copyright")));
        assert!(run.chunks.iter().any(|c| c.text.contains("Unique alpha")));
    }
}

#[tokio::test]
async fn heading_paths_are_carried_onto_chunks() {
    let text = "# Manual\n\n## Install\n\nAlpha steps here.\n\n## Remove\n\nOmega steps here.\n";
    let run = engine(EngineConfig::default())
        .run(&Document::new(text, ParseMode::Markdown))
        .await
        .unwrap();

    let install = run
        .chunks
        .iter()
        .find(|c| c.text.contains("Alpha steps"))
        .unwrap();
    assert_eq!(install.heading_path_string(), "Manual / Install");

    let remove = run
        .chunks
        .iter()
        .find(|c| c.text.contains("Omega steps"))
        .unwrap();
    assert_eq!(remove.heading_path_string(), "Manual / Remove");
}

#[tokio::test]
async fn html_documents_run_through_the_same_pipeline() {
    let text = "<h1>Manual</h1><h2>Install</h2><p>Alpha steps here. More alpha follows.</p>\
                <pre>make install</pre><h2>Remove</h2><p>Omega steps here.</p>";
    let run = engine(EngineConfig::default())
        .run(&Document::new(text, ParseMode::Html))
        .await
        .unwrap();

    assert!(run.report.warnings.is_empty());
    let fence_chunk = run
        .chunks
        .iter()
        .find(|c| c.text.contains("make install"))
        .unwrap();
    assert_eq!(fence_chunk.heading_path_string(), "Manual / Install");
    assert!(run
        .chunks
        .iter()
        .any(|c| c.heading_path_string() == "Manual / Remove"));
}

#[tokio::test]
async fn empty_input_produces_no_chunks() {
    let run = engine(EngineConfig::default())
        .run(&Document::new("", ParseMode::Markdown))
        .await
        .unwrap();
    assert!(run.chunks.is_empty());
    assert!(run.report.is_clean());
}
