//! Structural block parsing.
//!
//! Turns raw source text into an ordered sequence of typed [`Block`]s with
//! heading-path context. Parsing is a pure function of the input: same text
//! and mode always produce the same blocks and warnings.

mod html;
mod markdown;
mod text;

use crate::error::StructuralWarning;
use crate::types::{Block, ParseMode};

/// Parse raw document text into blocks under the given mode.
pub fn parse(source: &str, mode: ParseMode) -> (Vec<Block>, Vec<StructuralWarning>) {
    match mode {
        ParseMode::Markdown => markdown::parse(source),
        ParseMode::Html => html::parse(source),
        ParseMode::Text => text::parse(source),
    }
}

/// Maintains the stack of ancestor headings while scanning a document.
///
/// Pushing a heading pops every entry of equal or shallower depth first, so
/// the stack always reads root-to-leaf. Each block receives a snapshot of the
/// current path, never a live reference.
#[derive(Debug, Default)]
pub(crate) struct HeadingTracker {
    stack: Vec<(usize, String)>,
}

impl HeadingTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a heading of the given depth, replacing siblings and deeper
    /// entries.
    pub(crate) fn observe(&mut self, level: usize, title: &str) {
        while self
            .stack
            .last()
            .map(|(depth, _)| *depth >= level)
            .unwrap_or(false)
        {
            self.stack.pop();
        }
        self.stack.push((level, title.to_string()));
    }

    /// Snapshot of the current ancestor titles, root first.
    pub(crate) fn path(&self) -> Vec<String> {
        self.stack.iter().map(|(_, title)| title.clone()).collect()
    }
}

/// A source line with its byte offset, shared by the line-oriented parsers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub(crate) text: &'a str,
    pub(crate) start: usize,
}

impl<'a> Line<'a> {
    pub(crate) fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Split the source into lines, tracking each line's byte offset.
pub(crate) fn lines_with_offsets(source: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for text in source.split('\n') {
        lines.push(Line { text, start });
        start += text.len() + 1;
    }
    lines
}
