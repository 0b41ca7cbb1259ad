//! Sentence-level unit segmentation.

use std::collections::HashSet;

use unicode_segmentation::UnicodeSegmentation;

use crate::tokenizer::TokenCounter;
use crate::types::{Block, BlockKind, Unit};

/// Words whose trailing period does not terminate a sentence.
const ABBREVIATIONS: &[&str] = &[
    "e.g", "i.e", "etc", "vs", "cf", "al", "approx", "dept", "est", "fig", "no", "st", "dr",
    "mr", "mrs", "ms", "prof", "jr", "sr", "inc", "ltd", "co",
];

/// Splits non-atomic blocks into sentence-level units and tags every unit
/// with a token count.
///
/// List items, headings, and atomic blocks each produce exactly one unit.
pub struct UnitSegmenter {
    abbreviations: HashSet<&'static str>,
}

impl UnitSegmenter {
    pub fn new() -> Self {
        Self {
            abbreviations: ABBREVIATIONS.iter().copied().collect(),
        }
    }

    /// Segment every block in order, assigning monotonic positions.
    pub fn segment(&self, blocks: &[Block], counter: &dyn TokenCounter) -> Vec<Unit> {
        let mut units = Vec::new();

        for (block_index, block) in blocks.iter().enumerate() {
            let whole = block.is_atomic()
                || matches!(block.kind, BlockKind::ListItem | BlockKind::Heading);

            if whole {
                push_unit(
                    &mut units,
                    block,
                    block_index,
                    block.text.clone(),
                    block.start_offset,
                    block.end_offset,
                    counter,
                );
                continue;
            }

            for (text, rel_start, rel_end) in self.split_sentences(&block.text) {
                // Sentence offsets are measured in the normalized block text;
                // clamping keeps them inside the block's source span.
                let start = (block.start_offset + rel_start).min(block.end_offset);
                let end = (block.start_offset + rel_end).min(block.end_offset);
                push_unit(&mut units, block, block_index, text, start, end, counter);
            }
        }

        units
    }

    /// Split text into sentences with their byte spans.
    ///
    /// A terminator ends a sentence only when followed by whitespace and an
    /// uppercase/digit/opening character (or end of text), and the preceding
    /// word is not a known abbreviation. A period followed by a lowercase
    /// letter or glued to a digit never terminates.
    fn split_sentences(&self, text: &str) -> Vec<(String, usize, usize)> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let n = chars.len();
        let mut sentences = Vec::new();
        let mut start = 0; // char index of the current sentence start

        let mut i = 0;
        while i < n {
            let (byte_idx, c) = chars[i];
            if matches!(c, '.' | '!' | '?') {
                // Swallow terminator runs and closing quotes/brackets.
                let mut j = i + 1;
                while j < n
                    && matches!(
                        chars[j].1,
                        '.' | '!' | '?' | '"' | '\'' | ')' | ']' | '\u{201d}' | '\u{2019}'
                    )
                {
                    j += 1;
                }

                let mut k = j;
                while k < n && chars[k].1.is_whitespace() {
                    k += 1;
                }

                let ends_text = j >= n;
                let opens_next = k < n && k > j && opens_sentence(chars[k].1);
                let abbreviated = c == '.' && self.is_abbreviation(&text[..byte_idx]);

                if (ends_text || opens_next) && !abbreviated {
                    push_span(&mut sentences, text, &chars, start, j);
                    start = k;
                    i = k;
                    continue;
                }
            }
            i += 1;
        }

        push_span(&mut sentences, text, &chars, start, n);
        sentences
    }

    fn is_abbreviation(&self, before: &str) -> bool {
        match before.unicode_words().last() {
            Some(word) => {
                let word = word.to_lowercase();
                self.abbreviations
                    .contains(word.trim_end_matches('.'))
            }
            None => false,
        }
    }
}

impl Default for UnitSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

fn opens_sentence(c: char) -> bool {
    c.is_uppercase()
        || c.is_numeric()
        || matches!(c, '"' | '\'' | '(' | '[' | '#' | '-' | '*' | '\u{201c}' | '\u{2018}')
}

fn push_span(
    sentences: &mut Vec<(String, usize, usize)>,
    text: &str,
    chars: &[(usize, char)],
    start: usize,
    end: usize,
) {
    if start >= end {
        return;
    }
    let start_byte = chars[start].0;
    let end_byte = chars[end - 1].0 + chars[end - 1].1.len_utf8();
    let slice = text[start_byte..end_byte].trim();
    if !slice.is_empty() {
        sentences.push((slice.to_string(), start_byte, end_byte));
    }
}

fn push_unit(
    units: &mut Vec<Unit>,
    block: &Block,
    block_index: usize,
    text: String,
    start_offset: usize,
    end_offset: usize,
    counter: &dyn TokenCounter,
) {
    let token_count = counter.count_tokens(&text);
    let position = units.len();
    units.push(Unit {
        text,
        token_count,
        block_index,
        position,
        start_offset,
        end_offset,
        kind: block.kind,
        heading_path: block.heading_path.clone(),
    });
}
