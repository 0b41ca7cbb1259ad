//! Plain-text block parsing.
//!
//! Blank-line-delimited paragraphs with empty heading paths. List-looking
//! lines still become list items so bulleted plain text keeps its shape.

use lazy_static::lazy_static;
use regex::Regex;

use super::lines_with_offsets;
use crate::error::StructuralWarning;
use crate::types::{Block, BlockKind};

lazy_static! {
    static ref LIST_RE: Regex = Regex::new(r"^\s*(?:[-*+]\s+|\d+[.)]\s+)\S").unwrap();
}

pub(super) fn parse(source: &str) -> (Vec<Block>, Vec<StructuralWarning>) {
    let lines = lines_with_offsets(source);
    let mut blocks = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        if lines[i].is_blank() {
            i += 1;
            continue;
        }

        if LIST_RE.is_match(lines[i].text) {
            blocks.push(Block::new(
                BlockKind::ListItem,
                0,
                lines[i].text.trim(),
                Vec::new(),
                lines[i].start,
                lines[i].end(),
            ));
            i += 1;
            continue;
        }

        let start_line = i;
        let mut j = i + 1;
        while j < lines.len() && !lines[j].is_blank() && !LIST_RE.is_match(lines[j].text) {
            j += 1;
        }

        let start = lines[start_line].start;
        let end = lines[j - 1].end();
        blocks.push(Block::new(
            BlockKind::Paragraph,
            0,
            &source[start..end],
            Vec::new(),
            start,
            end,
        ));
        i = j;
    }

    (blocks, Vec::new())
}
