//! Boilerplate removal and whitespace normalization.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::types::Block;

/// Removes boilerplate blocks recurring across same-template documents and
/// normalizes whitespace in the survivors.
///
/// Removal is irreversible for the run. Atomic block content is never touched
/// beyond edge-trimming; internal formatting (code indentation, table
/// alignment) is preserved verbatim.
pub struct NoiseFilter;

impl NoiseFilter {
    pub fn new() -> Self {
        Self
    }

    /// Filter every document's block sequence in place. Returns the number of
    /// boilerplate blocks removed per document.
    ///
    /// A block counts as boilerplate when its normalized text occurs in more
    /// than half of the submitted documents. Single-document runs remove
    /// nothing.
    pub fn apply(&self, documents: &mut [Vec<Block>]) -> Vec<usize> {
        let mut removed = vec![0usize; documents.len()];

        if documents.len() > 1 {
            let mut doc_counts: HashMap<String, usize> = HashMap::new();
            for doc in documents.iter() {
                let keys: HashSet<String> = doc
                    .iter()
                    .map(|block| normalize_key(&block.text))
                    .filter(|key| !key.is_empty())
                    .collect();
                for key in keys {
                    *doc_counts.entry(key).or_insert(0) += 1;
                }
            }

            let majority: HashSet<String> = doc_counts
                .into_iter()
                .filter(|(_, count)| *count * 2 > documents.len())
                .map(|(key, _)| key)
                .collect();

            if !majority.is_empty() {
                for (index, doc) in documents.iter_mut().enumerate() {
                    let before = doc.len();
                    doc.retain(|block| !majority.contains(&normalize_key(&block.text)));
                    removed[index] = before - doc.len();
                }
                debug!(
                    boilerplate_keys = majority.len(),
                    removed = removed.iter().sum::<usize>(),
                    "Removed recurring boilerplate blocks"
                );
            }
        }

        for doc in documents.iter_mut() {
            for block in doc.iter_mut() {
                if block.is_atomic() {
                    block.text = edge_trim(&block.text);
                } else {
                    block.text = normalize_whitespace(&block.text);
                }
            }
            doc.retain(|block| !block.text.is_empty());
        }

        removed
    }
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse whitespace runs to single spaces.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip leading blank lines and trailing whitespace, keeping inner
/// formatting intact.
fn edge_trim(text: &str) -> String {
    text.trim_start_matches(['\r', '\n']).trim_end().to_string()
}

/// Case- and whitespace-insensitive key for boilerplate matching.
fn normalize_key(text: &str) -> String {
    normalize_whitespace(text).to_lowercase()
}
