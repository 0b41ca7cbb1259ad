//! Token counting capability.
//!
//! The engine treats token counting as a pure function of text under a fixed
//! tokenizer identity, which makes it safe to memoize for the lifetime of a
//! run.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use anyhow::Result;

/// Token counter trait for counting tokens in text.
///
/// Implementations must be deterministic: the same text always yields the
/// same count for a given [`identity`](TokenCounter::identity).
pub trait TokenCounter: Send + Sync {
    /// Count the number of tokens in the given text.
    fn count_tokens(&self, text: &str) -> usize;

    /// Stable identifier of the tokenizer (encoding name).
    fn identity(&self) -> &str;
}

/// Default token counter using tiktoken (cl100k_base encoding).
pub struct TiktokenCounter {
    bpe: tiktoken_rs::CoreBPE,
    identity: String,
}

impl TiktokenCounter {
    /// Create a new token counter with the cl100k_base encoding.
    pub fn new() -> Self {
        // cl100k_base is used by GPT-4, ChatGPT, and text-embedding-ada-002
        let bpe = tiktoken_rs::cl100k_base().expect("Failed to load cl100k_base encoding");
        Self {
            bpe,
            identity: "cl100k_base".to_string(),
        }
    }

    /// Create a token counter with a specific encoding.
    pub fn with_encoding(encoding_name: &str) -> Result<Self> {
        let bpe = match encoding_name {
            "cl100k_base" => tiktoken_rs::cl100k_base()?,
            "p50k_base" => tiktoken_rs::p50k_base()?,
            "p50k_edit" => tiktoken_rs::p50k_edit()?,
            "r50k_base" => tiktoken_rs::r50k_base()?,
            _ => tiktoken_rs::cl100k_base()?,
        };
        Ok(Self {
            bpe,
            identity: encoding_name.to_string(),
        })
    }
}

impl Default for TiktokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn identity(&self) -> &str {
        &self.identity
    }
}

/// Memoizing wrapper around a [`TokenCounter`].
///
/// The cache lives for the lifetime of the wrapper and is keyed by a hash of
/// the text; counts are never recomputed for text the run has seen before.
pub struct MemoizedCounter {
    inner: Arc<dyn TokenCounter>,
    cache: Mutex<HashMap<u64, usize>>,
}

impl MemoizedCounter {
    /// Wrap the given counter with a fresh cache.
    pub fn new(inner: Arc<dyn TokenCounter>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn key(text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }
}

impl TokenCounter for MemoizedCounter {
    fn count_tokens(&self, text: &str) -> usize {
        let key = Self::key(text);
        if let Some(count) = self.cache.lock().unwrap().get(&key) {
            return *count;
        }
        let count = self.inner.count_tokens(text);
        self.cache.lock().unwrap().insert(key, count);
        count
    }

    fn identity(&self) -> &str {
        self.inner.identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStub {
        calls: AtomicUsize,
    }

    impl TokenCounter for CountingStub {
        fn count_tokens(&self, text: &str) -> usize {
            self.calls.fetch_add(1, Ordering::SeqCst);
            text.split_whitespace().count()
        }

        fn identity(&self) -> &str {
            "whitespace"
        }
    }

    #[test]
    fn memoization_avoids_recounting() {
        let stub = Arc::new(CountingStub {
            calls: AtomicUsize::new(0),
        });
        let counter = MemoizedCounter::new(stub.clone());

        assert_eq!(counter.count_tokens("one two three"), 3);
        assert_eq!(counter.count_tokens("one two three"), 3);
        assert_eq!(counter.count_tokens("four"), 1);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn identity_passes_through() {
        let stub = Arc::new(CountingStub {
            calls: AtomicUsize::new(0),
        });
        let counter = MemoizedCounter::new(stub);
        assert_eq!(counter.identity(), "whitespace");
    }
}
