//! Markdown block parsing.

use lazy_static::lazy_static;
use regex::Regex;

use super::{lines_with_offsets, HeadingTracker, Line};
use crate::error::StructuralWarning;
use crate::types::{Block, BlockKind};

lazy_static! {
    static ref HEADING_RE: Regex = Regex::new(r"^(#{1,6})\s+(.+?)\s*$").unwrap();
    static ref FENCE_RE: Regex = Regex::new(r"^(`{3,}|~{3,})").unwrap();
    static ref LIST_RE: Regex = Regex::new(r"^\s*(?:[-*+]\s+|\d+[.)]\s+)\S").unwrap();
    static ref TABLE_ROW_RE: Regex = Regex::new(r"^\s*\|.*\|\s*$").unwrap();
    static ref TABLE_SEP_RE: Regex = Regex::new(r"^\s*\|[\s:\-|]+\|\s*$").unwrap();
    static ref QUOTE_RE: Regex = Regex::new(r"^\s*>\s?(.*)$").unwrap();
}

pub(super) fn parse(source: &str) -> (Vec<Block>, Vec<StructuralWarning>) {
    let lines = lines_with_offsets(source);
    let mut blocks = Vec::new();
    let mut warnings = Vec::new();
    let mut tracker = HeadingTracker::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if line.is_blank() {
            i += 1;
            continue;
        }

        if let Some(caps) = FENCE_RE.captures(line.text) {
            let marker = caps.get(1).map(|m| m.as_str()).unwrap_or("```");
            i = consume_fence(source, &lines, i, marker, &tracker, &mut blocks, &mut warnings);
            continue;
        }

        if let Some(caps) = HEADING_RE.captures(line.text) {
            let level = caps.get(1).map(|m| m.as_str().len()).unwrap_or(1);
            let title = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            tracker.observe(level, title);
            blocks.push(Block::new(
                BlockKind::Heading,
                level,
                line.text.trim(),
                tracker.path(),
                line.start,
                line.end(),
            ));
            i += 1;
            continue;
        }

        if is_table_start(&lines, i) {
            i = consume_table(source, &lines, i, &tracker, &mut blocks);
            continue;
        }

        if QUOTE_RE.is_match(line.text) {
            i = consume_quote(&lines, i, &tracker, &mut blocks);
            continue;
        }

        if LIST_RE.is_match(line.text) {
            i = consume_list_item(source, &lines, i, &tracker, &mut blocks);
            continue;
        }

        i = consume_paragraph(source, &lines, i, &tracker, &mut blocks);
    }

    (blocks, warnings)
}

/// Whether the line opens a new block of any non-paragraph kind.
fn starts_block(line: &str) -> bool {
    FENCE_RE.is_match(line)
        || HEADING_RE.is_match(line)
        || QUOTE_RE.is_match(line)
        || LIST_RE.is_match(line)
        || TABLE_ROW_RE.is_match(line)
}

fn is_table_start(lines: &[Line<'_>], i: usize) -> bool {
    TABLE_ROW_RE.is_match(lines[i].text)
        && i + 1 < lines.len()
        && TABLE_SEP_RE.is_match(lines[i + 1].text)
}

/// Consume a fenced code block. A fence closes on a line starting with at
/// least as many of the same fence characters and nothing else; an unclosed
/// fence swallows the rest of the document and is reported as a warning.
fn consume_fence(
    source: &str,
    lines: &[Line<'_>],
    open: usize,
    marker: &str,
    tracker: &HeadingTracker,
    blocks: &mut Vec<Block>,
    warnings: &mut Vec<StructuralWarning>,
) -> usize {
    let fence_char = marker.chars().next().unwrap_or('`');
    let fence_len = marker.len();

    let mut close = None;
    for (j, line) in lines.iter().enumerate().skip(open + 1) {
        let trimmed = line.text.trim_end();
        let run = trimmed.chars().take_while(|c| *c == fence_char).count();
        if run >= fence_len && trimmed.chars().all(|c| c == fence_char) {
            close = Some(j);
            break;
        }
    }

    let (last, next) = match close {
        Some(j) => (j, j + 1),
        None => {
            warnings.push(StructuralWarning::UnterminatedFence { line: open + 1 });
            (lines.len() - 1, lines.len())
        }
    };

    let start = lines[open].start;
    let end = lines[last].end();
    blocks.push(Block::new(
        BlockKind::CodeFence,
        0,
        &source[start..end],
        tracker.path(),
        start,
        end,
    ));
    next
}

/// Consume a pipe table: header row, separator row, and every consecutive
/// pipe row after them.
fn consume_table(
    source: &str,
    lines: &[Line<'_>],
    open: usize,
    tracker: &HeadingTracker,
    blocks: &mut Vec<Block>,
) -> usize {
    let mut j = open + 2;
    while j < lines.len() && TABLE_ROW_RE.is_match(lines[j].text) {
        j += 1;
    }

    let start = lines[open].start;
    let end = lines[j - 1].end();
    blocks.push(Block::new(
        BlockKind::Table,
        0,
        &source[start..end],
        tracker.path(),
        start,
        end,
    ));
    j
}

/// Consume consecutive quote lines into one block, with markers stripped.
fn consume_quote(
    lines: &[Line<'_>],
    open: usize,
    tracker: &HeadingTracker,
    blocks: &mut Vec<Block>,
) -> usize {
    let mut j = open;
    let mut content = Vec::new();
    while j < lines.len() {
        match QUOTE_RE.captures(lines[j].text) {
            Some(caps) => {
                content.push(caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string());
                j += 1;
            }
            None => break,
        }
    }

    blocks.push(Block::new(
        BlockKind::Quote,
        0,
        content.join("\n"),
        tracker.path(),
        lines[open].start,
        lines[j - 1].end(),
    ));
    j
}

/// Consume one list item plus its indented continuation lines.
fn consume_list_item(
    source: &str,
    lines: &[Line<'_>],
    open: usize,
    tracker: &HeadingTracker,
    blocks: &mut Vec<Block>,
) -> usize {
    let mut j = open + 1;
    while j < lines.len() {
        let line = lines[j];
        let continuation = !line.is_blank()
            && !starts_block(line.text)
            && line.text.starts_with("  ");
        if !continuation {
            break;
        }
        j += 1;
    }

    let start = lines[open].start;
    let end = lines[j - 1].end();
    blocks.push(Block::new(
        BlockKind::ListItem,
        0,
        &source[start..end],
        tracker.path(),
        start,
        end,
    ));
    j
}

/// Consume prose lines until a blank line or another block kind starts.
fn consume_paragraph(
    source: &str,
    lines: &[Line<'_>],
    open: usize,
    tracker: &HeadingTracker,
    blocks: &mut Vec<Block>,
) -> usize {
    let mut j = open + 1;
    while j < lines.len() && !lines[j].is_blank() && !starts_block(lines[j].text) {
        j += 1;
    }

    let start = lines[open].start;
    let end = lines[j - 1].end();
    blocks.push(Block::new(
        BlockKind::Paragraph,
        0,
        &source[start..end],
        tracker.path(),
        start,
        end,
    ));
    j
}
