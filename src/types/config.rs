//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{DEFAULT_DEDUPE_SIM, DEFAULT_MAX_TOKENS, DEFAULT_MIN_SIM, DEFAULT_OVERLAP_TOKENS};

/// Configuration for a chunking run.
///
/// Invalid configurations are rejected by [`EngineConfig::validate`] before
/// any processing begins; everything downstream may assume a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum tokens per chunk. Chunks exceed this only when flagged
    /// oversized.
    pub max_tokens: usize,

    /// Tokens of trailing context repeated at the start of the next chunk.
    /// Must be strictly less than `max_tokens`.
    pub overlap_tokens: usize,

    /// Similarity threshold below which an adjacent-unit valley becomes a
    /// semantic boundary candidate. In [0, 1].
    pub min_sim: f32,

    /// Whether to run the dedup collapser.
    pub dedupe: bool,

    /// Similarity threshold at which two chunks are considered
    /// near-duplicates. In [0, 1].
    pub dedupe_sim: f32,

    /// Neighbors on each side a similarity valley must undercut to count as
    /// a local minimum.
    pub valley_window: usize,

    /// How many trailing unit boundaries the assembler inspects for a
    /// semantic close point before falling back to the token ceiling.
    pub boundary_lookback: usize,

    /// Units per embedding batch.
    pub embed_batch_size: usize,

    /// Surviving predecessors each chunk is compared against during dedup.
    pub dedupe_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
            min_sim: DEFAULT_MIN_SIM,
            dedupe: false,
            dedupe_sim: DEFAULT_DEDUPE_SIM,
            valley_window: 1,
            boundary_lookback: 8,
            embed_batch_size: 32,
            dedupe_window: 8,
        }
    }
}

impl EngineConfig {
    /// Create a config with the given token budget.
    pub fn with_max_tokens(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            ..Default::default()
        }
    }

    /// Set the overlap budget.
    pub fn with_overlap(mut self, overlap_tokens: usize) -> Self {
        self.overlap_tokens = overlap_tokens;
        self
    }

    /// Set the semantic boundary threshold.
    pub fn with_min_sim(mut self, min_sim: f32) -> Self {
        self.min_sim = min_sim;
        self
    }

    /// Enable deduplication with the given threshold.
    pub fn with_dedupe(mut self, dedupe_sim: f32) -> Self {
        self.dedupe = true;
        self.dedupe_sim = dedupe_sim;
        self
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_tokens: env_parse("CHUNK_MAX_TOKENS", defaults.max_tokens),
            overlap_tokens: env_parse("CHUNK_OVERLAP_TOKENS", defaults.overlap_tokens),
            min_sim: env_parse("CHUNK_MIN_SIM", defaults.min_sim),
            dedupe: env_parse("CHUNK_DEDUPE", defaults.dedupe),
            dedupe_sim: env_parse("CHUNK_DEDUPE_SIM", defaults.dedupe_sim),
            ..defaults
        }
    }

    /// Reject invalid configurations before any processing begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::ZeroMaxTokens);
        }
        if self.overlap_tokens >= self.max_tokens {
            return Err(ConfigError::OverlapTooLarge {
                overlap: self.overlap_tokens,
                max: self.max_tokens,
            });
        }
        for (name, value) in [("min_sim", self.min_sim), ("dedupe_sim", self.dedupe_sim)] {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if self.embed_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
