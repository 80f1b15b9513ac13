//! Whitespace handling for structural edits.
//!
//! The host reformatter is modelled by the [`Reformatter`] trait. Edits only
//! ever reformat the text they insert, never the surrounding file, so an
//! edit's blast radius stays bounded to the node it touched.

use crate::path::ElementKind;
use std::ops::Range;

pub trait Reformatter: Send + Sync + std::fmt::Debug {
    /// Re-indent node text whose first line is already positioned.
    ///
    /// `from_indent` is the indentation the text was written against,
    /// `to_indent` the indentation of the line it is being placed on.
    /// `literals` are multi-line string literal spans within `text`; their
    /// contents must come out unchanged.
    fn reformat_node(
        &self,
        text: &str,
        literals: &[Range<usize>],
        from_indent: &str,
        to_indent: &str,
    ) -> String;

    /// Normalize a whole file after its content was replaced.
    fn reformat_file(&self, text: &str, literals: &[Range<usize>]) -> String;

    /// Line breaks placed between an inserted member and its neighbour.
    fn member_separator(&self, kind: ElementKind) -> &'static str;

    /// One level of indentation.
    fn indent_unit(&self) -> &str;
}

/// Default reformatter: shifts continuation lines by the indentation delta
/// and strips trailing whitespace.
#[derive(Debug, Clone)]
pub struct IndentReformatter {
    indent: String,
    blank_line_between_members: bool,
}

impl IndentReformatter {
    pub fn new(indent: impl Into<String>, blank_line_between_members: bool) -> Self {
        Self {
            indent: indent.into(),
            blank_line_between_members,
        }
    }
}

impl Default for IndentReformatter {
    fn default() -> Self {
        Self::new("    ", true)
    }
}

impl Reformatter for IndentReformatter {
    fn reformat_node(
        &self,
        text: &str,
        literals: &[Range<usize>],
        from_indent: &str,
        to_indent: &str,
    ) -> String {
        let mut out = String::with_capacity(text.len());
        for (i, line) in lines_with_offsets(text) {
            let end = line.start + line.text.len();
            let kept = if within(literals, end) {
                line.text
            } else {
                line.text.trim_end()
            };
            if i == 0 {
                out.push_str(kept.trim_start());
                continue;
            }
            out.push('\n');
            if within(literals, line.start) {
                out.push_str(kept);
                continue;
            }
            if kept.is_empty() {
                continue;
            }
            out.push_str(to_indent);
            match kept.strip_prefix(from_indent) {
                Some(rest) => out.push_str(rest),
                None => out.push_str(kept.trim_start()),
            }
        }
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        out
    }

    fn reformat_file(&self, text: &str, literals: &[Range<usize>]) -> String {
        let mut out = String::with_capacity(text.len());
        for (i, line) in lines_with_offsets(text) {
            if i > 0 {
                out.push('\n');
            }
            if within(literals, line.start + line.text.len()) {
                out.push_str(line.text);
            } else {
                out.push_str(line.text.trim_end());
            }
        }
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    fn member_separator(&self, kind: ElementKind) -> &'static str {
        match kind {
            ElementKind::Property | ElementKind::EnumEntry => "\n",
            _ if self.blank_line_between_members => "\n\n",
            _ => "\n",
        }
    }

    fn indent_unit(&self) -> &str {
        &self.indent
    }
}

struct Line<'a> {
    start: usize,
    text: &'a str,
}

fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, Line<'_>)> {
    let mut start = 0;
    text.split('\n').enumerate().map(move |(i, line)| {
        let at = start;
        start += line.len() + 1;
        (i, Line { start: at, text: line })
    })
}

/// Whether `offset` falls strictly inside one of `spans`.
fn within(spans: &[Range<usize>], offset: usize) -> bool {
    spans.iter().any(|s| s.start < offset && offset < s.end)
}

/// Offset of the first byte of the line containing `offset`.
pub fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map_or(0, |i| i + 1)
}

/// Offset just past the line break ending the line containing `offset`,
/// or the end of the text.
pub fn line_end_inclusive(text: &str, offset: usize) -> usize {
    text[offset..]
        .find('\n')
        .map_or(text.len(), |i| offset + i + 1)
}

/// Leading whitespace of the line containing `offset`, bounded by `offset`.
pub fn line_indent(text: &str, offset: usize) -> &str {
    let start = line_start(text, offset);
    let line = &text[start..offset];
    let ws = line.len() - line.trim_start().len();
    &line[..ws]
}

/// Whether `offset` is preceded only by whitespace on its line.
pub fn starts_line(text: &str, offset: usize) -> bool {
    text[line_start(text, offset)..offset].trim().is_empty()
}

/// 1-based line number of `offset`.
pub fn line_number(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}
