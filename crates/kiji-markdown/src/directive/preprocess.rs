//! Line-based directive preprocessing.
//!
//! The CommonMark parser knows nothing about directives, so before parsing,
//! every directive occurrence is swapped for a marker the parser passes through
//! untouched:
//!
//! - container openers/closers and leaf directives become a one-line HTML
//!   comment (`<!--kiji:directive:N-->`), which CommonMark turns into its own
//!   HTML block, even when it interrupts a paragraph
//! - text directives become a private-use sentinel (`U+E000 N U+E001`) that
//!   survives as plain text
//!
//! `N` indexes [`Preprocessed::directives`]. Each line is replaced by exactly
//! one line, so line numbers reported later stay exact.

use std::ops::Range;

use super::DirectiveArgs;
use super::fence::FenceTracker;
use super::parser::{
    ParsedDirective, find_text_directive, parse_container_line, parse_leaf_line,
};
use crate::ast::Position;

const BLOCK_MARKER_PREFIX: &str = "<!--kiji:directive:";
const BLOCK_MARKER_SUFFIX: &str = "-->";
pub(crate) const TEXT_MARKER_OPEN: char = '\u{E000}';
pub(crate) const TEXT_MARKER_CLOSE: char = '\u{E001}';

/// What a marker stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Marker {
    Open { name: String, args: DirectiveArgs },
    Close,
    Leaf { name: String, args: DirectiveArgs },
    Text { name: String, args: DirectiveArgs },
}

impl From<ParsedDirective> for Marker {
    fn from(directive: ParsedDirective) -> Self {
        match directive {
            ParsedDirective::Text { name, args } => Marker::Text { name, args },
            ParsedDirective::Leaf { name, args } => Marker::Leaf { name, args },
            ParsedDirective::ContainerStart { name, args } => Marker::Open { name, args },
            ParsedDirective::ContainerEnd => Marker::Close,
        }
    }
}

/// A directive found during preprocessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingDirective {
    pub marker: Marker,
    /// Position in the preprocessed body.
    pub position: Position,
}

/// Markdown with directives replaced by markers.
#[derive(Debug, Default)]
pub(crate) struct Preprocessed {
    pub text: String,
    pub directives: Vec<PendingDirective>,
}

impl Preprocessed {
    /// Look up the directive behind an HTML block, if it is a block marker.
    pub(crate) fn block_marker(&self, html: &str) -> Option<&PendingDirective> {
        let index = html
            .trim()
            .strip_prefix(BLOCK_MARKER_PREFIX)?
            .strip_suffix(BLOCK_MARKER_SUFFIX)?
            .parse::<usize>()
            .ok()?;
        self.directives
            .get(index)
            .filter(|d| !matches!(d.marker, Marker::Text { .. }))
    }

    /// Look up the directive behind a text sentinel's digits.
    pub(crate) fn text_marker(&self, digits: &str) -> Option<&PendingDirective> {
        let index = digits.parse::<usize>().ok()?;
        self.directives
            .get(index)
            .filter(|d| matches!(d.marker, Marker::Text { .. }))
    }
}

/// Rewrite directive syntax in `input` into parser-transparent markers.
pub(crate) fn preprocess(input: &str) -> Preprocessed {
    let mut out = Preprocessed {
        text: String::with_capacity(input.len()),
        directives: Vec::new(),
    };
    let mut fence = FenceTracker::new();
    let line_count = input.lines().count();

    for (idx, line) in input.lines().enumerate() {
        let line_num = idx + 1;

        if fence.update(line) {
            out.text.push_str(line);
        } else {
            process_line(line, line_num, &mut out);
        }

        // Preserve line endings
        if idx + 1 < line_count || input.ends_with('\n') {
            out.text.push('\n');
        }
    }

    out
}

fn process_line(line: &str, line_num: usize, out: &mut Preprocessed) {
    let whole_line = parse_container_line(line).or_else(|| parse_leaf_line(line));
    if let Some(directive) = whole_line {
        let indent_len = line.len() - line.trim_start().len();
        let column = line[..indent_len].chars().count() + 1;
        let index = push(out, directive.into(), Position::new(line_num, column));

        out.text.push_str(&line[..indent_len]);
        out.text.push_str(BLOCK_MARKER_PREFIX);
        out.text.push_str(&index.to_string());
        out.text.push_str(BLOCK_MARKER_SUFFIX);
        return;
    }

    let code_spans = code_span_ranges(line);
    let mut copied = 0;
    let mut search = 0;

    while let Some((directive, start, end)) = find_text_directive(line, search) {
        if let Some(span) = code_spans.iter().find(|span| span.contains(&start)) {
            search = span.end;
            continue;
        }
        let column = line[..start].chars().count() + 1;
        let index = push(out, directive.into(), Position::new(line_num, column));

        out.text.push_str(&line[copied..start]);
        out.text.push(TEXT_MARKER_OPEN);
        out.text.push_str(&index.to_string());
        out.text.push(TEXT_MARKER_CLOSE);
        copied = end;
        search = end;
    }

    out.text.push_str(&line[copied..]);
}

fn push(out: &mut Preprocessed, marker: Marker, position: Position) -> usize {
    out.directives.push(PendingDirective { marker, position });
    out.directives.len() - 1
}

/// Byte ranges of inline code spans that open and close on this line.
fn code_span_ranges(line: &str) -> Vec<Range<usize>> {
    let bytes = line.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let open_start = i;
        while i < bytes.len() && bytes[i] == b'`' {
            i += 1;
        }
        let run = i - open_start;

        let mut j = i;
        while j < bytes.len() {
            if bytes[j] == b'`' {
                let close_start = j;
                while j < bytes.len() && bytes[j] == b'`' {
                    j += 1;
                }
                if j - close_start == run {
                    spans.push(open_start..j);
                    i = j;
                    break;
                }
            } else {
                j += 1;
            }
        }
    }

    spans
}
