//! HTML block parsing.
//!
//! A lightweight tag scanner, not a full DOM: headings feed the same
//! heading-path stack as markdown, `<pre>` and `<table>` become atomic
//! blocks, script/style content is dropped, and everything else flows into
//! paragraphs. Unclosed atomic elements run to end-of-document and are
//! reported as structural warnings.

use super::HeadingTracker;
use crate::error::StructuralWarning;
use crate::types::{Block, BlockKind};

pub(super) fn parse(source: &str) -> (Vec<Block>, Vec<StructuralWarning>) {
    let mut parser = HtmlParser {
        source,
        blocks: Vec::new(),
        warnings: Vec::new(),
        tracker: HeadingTracker::new(),
        para: String::new(),
        para_start: 0,
        para_end: 0,
    };
    parser.run();
    (parser.blocks, parser.warnings)
}

struct HtmlParser<'a> {
    source: &'a str,
    blocks: Vec<Block>,
    warnings: Vec<StructuralWarning>,
    tracker: HeadingTracker,
    para: String,
    para_start: usize,
    para_end: usize,
}

impl<'a> HtmlParser<'a> {
    fn run(&mut self) {
        let mut pos = 0;
        while pos < self.source.len() {
            let Some(rel) = self.source[pos..].find('<') else {
                self.append_text(pos, self.source.len());
                break;
            };
            let tag_start = pos + rel;
            self.append_text(pos, tag_start);

            let Some(end_rel) = self.source[tag_start..].find('>') else {
                // Dangling '<' with no closing '>': keep it as text.
                self.append_text(tag_start, self.source.len());
                break;
            };
            let tag_end = tag_start + end_rel + 1;
            let body = &self.source[tag_start + 1..tag_end - 1];
            let closing = body.starts_with('/');
            let name = tag_name(body);
            pos = tag_end;

            if closing {
                if is_block_level(&name) {
                    self.flush_para();
                }
                continue;
            }

            match name.as_str() {
                "script" | "style" => {
                    pos = self.skip_element(pos, &name);
                }
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    self.flush_para();
                    let level = name[1..].parse().unwrap_or(1);
                    pos = self.consume_heading(tag_start, pos, &name, level);
                }
                "pre" => {
                    self.flush_para();
                    pos = self.consume_atomic(tag_start, pos, "pre", BlockKind::CodeFence);
                }
                "table" => {
                    self.flush_para();
                    pos = self.consume_atomic(tag_start, pos, "table", BlockKind::Table);
                }
                "li" => {
                    self.flush_para();
                    pos = self.consume_list_item(tag_start, pos);
                }
                "blockquote" => {
                    self.flush_para();
                    pos = self.consume_quote(tag_start, pos);
                }
                "br" => self.para.push('\n'),
                _ if is_block_level(&name) => self.flush_para(),
                _ => {}
            }
        }
        self.flush_para();
    }

    /// Append decoded text content to the open paragraph.
    fn append_text(&mut self, start: usize, end: usize) {
        let raw = &self.source[start..end];
        if raw.trim().is_empty() {
            if !self.para.is_empty() {
                self.para.push(' ');
            }
            return;
        }
        if self.para.trim().is_empty() {
            self.para_start = start;
        }
        self.para.push_str(&decode_entities(raw));
        self.para_end = end;
    }

    fn flush_para(&mut self) {
        let text = self.para.trim().to_string();
        if !text.is_empty() {
            self.blocks.push(Block::new(
                BlockKind::Paragraph,
                0,
                text,
                self.tracker.path(),
                self.para_start,
                self.para_end,
            ));
        }
        self.para.clear();
    }

    /// Skip past the matching close tag, dropping the content entirely.
    fn skip_element(&self, from: usize, name: &str) -> usize {
        match find_close_tag(self.source, from, name) {
            Some((_, after)) => after,
            None => self.source.len(),
        }
    }

    fn consume_heading(&mut self, tag_start: usize, from: usize, name: &str, level: usize) -> usize {
        let (inner_end, after) = match find_close_tag(self.source, from, name) {
            Some(found) => found,
            None => (self.source.len(), self.source.len()),
        };
        let title = decode_entities(&strip_tags(&self.source[from..inner_end]))
            .trim()
            .to_string();
        if title.is_empty() {
            return after;
        }
        self.tracker.observe(level, &title);
        self.blocks.push(Block::new(
            BlockKind::Heading,
            level,
            title,
            self.tracker.path(),
            tag_start,
            after,
        ));
        after
    }

    fn consume_atomic(
        &mut self,
        tag_start: usize,
        from: usize,
        name: &str,
        kind: BlockKind,
    ) -> usize {
        let (inner_end, after) = match find_close_tag(self.source, from, name) {
            Some(found) => found,
            None => {
                self.warnings.push(StructuralWarning::UnclosedElement {
                    tag: name.to_string(),
                    offset: tag_start,
                });
                (self.source.len(), self.source.len())
            }
        };
        let inner = &self.source[from..inner_end];
        let text = match kind {
            // Preserve <pre> whitespace verbatim; only markup is removed.
            BlockKind::CodeFence => decode_entities(&strip_tags(inner)),
            _ => table_text(inner),
        };
        self.blocks.push(Block::new(
            kind,
            0,
            text,
            self.tracker.path(),
            tag_start,
            after,
        ));
        after
    }

    /// A list item ends at `</li>` or, for sloppy markup, at the next `<li>`
    /// or the end of the enclosing list.
    fn consume_list_item(&mut self, tag_start: usize, from: usize) -> usize {
        let mut inner_end = self.source.len();
        let mut after = self.source.len();
        if let Some((end, next)) = find_close_tag(self.source, from, "li") {
            inner_end = end;
            after = next;
        }
        for stop in ["<li", "</ul", "</ol"] {
            if let Some(at) = find_ci(self.source, from, stop) {
                if at < inner_end {
                    inner_end = at;
                    after = at;
                }
            }
        }

        let text = decode_entities(&strip_tags(&self.source[from..inner_end]))
            .trim()
            .to_string();
        if !text.is_empty() {
            self.blocks.push(Block::new(
                BlockKind::ListItem,
                0,
                text,
                self.tracker.path(),
                tag_start,
                inner_end,
            ));
        }
        after
    }

    fn consume_quote(&mut self, tag_start: usize, from: usize) -> usize {
        let (inner_end, after) = match find_close_tag(self.source, from, "blockquote") {
            Some(found) => found,
            None => (self.source.len(), self.source.len()),
        };
        let text = decode_entities(&strip_tags(&self.source[from..inner_end]))
            .trim()
            .to_string();
        if !text.is_empty() {
            self.blocks.push(Block::new(
                BlockKind::Quote,
                0,
                text,
                self.tracker.path(),
                tag_start,
                after,
            ));
        }
        after
    }
}

/// Lowercased element name from a tag body (`/div class=x` -> `div`).
fn tag_name(body: &str) -> String {
    body.trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn is_block_level(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "main"
            | "nav"
            | "aside"
            | "ul"
            | "ol"
            | "tr"
            | "td"
            | "th"
            | "body"
            | "html"
    )
}

/// ASCII-case-insensitive substring search starting at `from`.
fn find_ci(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.is_empty() || from + pat.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - pat.len())
        .find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}

/// Find `</name ...>`; returns (inner end, offset after the close tag).
fn find_close_tag(source: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let pattern = format!("</{name}");
    let mut search = from;
    while let Some(at) = find_ci(source, search, &pattern) {
        // Reject prefixes like </table> matching </t...>.
        let rest = &source[at + pattern.len()..];
        let boundary = rest
            .chars()
            .next()
            .map(|c| c == '>' || c.is_ascii_whitespace())
            .unwrap_or(true);
        if boundary {
            let after = match source[at..].find('>') {
                Some(rel) => at + rel + 1,
                None => source.len(),
            };
            return Some((at, after));
        }
        search = at + 1;
    }
    None
}

/// Remove every `<...>` span, keeping text content.
fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pos = 0;
    while pos < s.len() {
        match s[pos..].find('<') {
            None => {
                out.push_str(&s[pos..]);
                break;
            }
            Some(rel) => {
                out.push_str(&s[pos..pos + rel]);
                match s[pos + rel..].find('>') {
                    Some(end_rel) => pos = pos + rel + end_rel + 1,
                    None => {
                        out.push_str(&s[pos + rel..]);
                        break;
                    }
                }
            }
        }
    }
    out
}

/// Flatten table markup into ` | `-joined cells, one row per line.
fn table_text(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut pos = 0;
    while pos < inner.len() {
        match inner[pos..].find('<') {
            None => {
                out.push_str(&inner[pos..]);
                break;
            }
            Some(rel) => {
                out.push_str(&inner[pos..pos + rel]);
                let tag_start = pos + rel;
                let Some(end_rel) = inner[tag_start..].find('>') else {
                    break;
                };
                let body = &inner[tag_start + 1..tag_start + end_rel];
                match tag_name(body).as_str() {
                    "td" | "th" if body.starts_with('/') => out.push_str(" | "),
                    "tr" if body.starts_with('/') => out.push('\n'),
                    _ => {}
                }
                pos = tag_start + end_rel + 1;
            }
        }
    }

    decode_entities(&out)
        .lines()
        .map(|line| line.trim().trim_end_matches('|').trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode the handful of entities that matter for prose.
fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        let Some(end) = tail.find(';').filter(|&e| e <= 8) else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };
        let entity = &tail[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            "nbsp" => out.push(' '),
            _ => {
                let decoded = entity
                    .strip_prefix('#')
                    .and_then(|num| num.parse::<u32>().ok())
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => out.push(c),
                    None => {
                        out.push('&');
                        rest = &tail[1..];
                        continue;
                    }
                }
            }
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}
