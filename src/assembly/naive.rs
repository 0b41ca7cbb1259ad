//! Fixed-width character splitter.
//!
//! A comparison baseline with no structural awareness. Useful for
//! demonstrating what the structure-aware pipeline buys; never part of it.

use crate::tokenizer::TokenCounter;
use crate::types::Chunk;

pub struct NaiveSplitter {
    max_chars: usize,
}

impl NaiveSplitter {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    /// Split text into fixed-width character chunks, cutting wherever the
    /// width lands (including mid-sentence and mid-fence).
    pub fn split(&self, text: &str, counter: &dyn TokenCounter) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut taken = 0;

        for (byte_idx, _) in text.char_indices() {
            if taken == self.max_chars {
                chunks.push(self.chunk(chunks.len(), text, start, byte_idx, counter));
                start = byte_idx;
                taken = 0;
            }
            taken += 1;
        }

        if start < text.len() {
            chunks.push(self.chunk(chunks.len(), text, start, text.len(), counter));
        }
        chunks
    }

    fn chunk(
        &self,
        id: usize,
        text: &str,
        start: usize,
        end: usize,
        counter: &dyn TokenCounter,
    ) -> Chunk {
        let piece = &text[start..end];
        Chunk {
            id,
            text: piece.to_string(),
            token_count: counter.count_tokens(piece),
            start_offset: start,
            end_offset: end,
            heading_path: Vec::new(),
            coherence_score: None,
            oversized: false,
            unit_range: (0, 0),
        }
    }
}
