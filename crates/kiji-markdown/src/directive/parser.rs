//! Directive syntax parsing.
//!
//! Parses the generic directive syntax: `:name`, `::name`, `:::name`

use super::DirectiveArgs;

/// Parsed directive syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedDirective {
    /// Text directive: `:name[label]{attrs}`
    Text { name: String, args: DirectiveArgs },
    /// Leaf directive: `::name[label]{attrs}` on a line of its own
    Leaf { name: String, args: DirectiveArgs },
    /// Container opening: `:::name[label]{attrs}`
    ContainerStart { name: String, args: DirectiveArgs },
    /// Container closing: `:::`
    ContainerEnd,
}

/// Check if a name is a valid directive name.
///
/// Names start with an ASCII letter and continue with alphanumerics,
/// hyphens, and underscores.
fn is_valid_directive_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Split a directive name off the front of `s`.
///
/// Returns the name and the remainder, or `None` when no valid name is present.
fn split_name(s: &str) -> Option<(&str, &str)> {
    let name_end = s
        .find(|c: char| c == '[' || c == '{' || c.is_whitespace())
        .unwrap_or(s.len());
    let name = &s[..name_end];
    is_valid_directive_name(name).then(|| (name, &s[name_end..]))
}

/// Parse `[label]{attrs}` following a name.
///
/// Returns the arguments and the number of bytes consumed.
fn parse_tail(s: &str) -> (DirectiveArgs, usize) {
    let (label, label_consumed) = parse_delimited(s, '[', ']');
    let (attrs, attrs_consumed) = parse_delimited(&s[label_consumed..], '{', '}');
    (
        DirectiveArgs::parse(&label, &attrs),
        label_consumed + attrs_consumed,
    )
}

/// Parse content between balanced delimiters at the start of `s`.
///
/// Returns (content, `bytes_consumed`); `(String::new(), 0)` when `s` does
/// not start with `open` or the delimiter is never closed.
fn parse_delimited(s: &str, open: char, close: char) -> (String, usize) {
    if !s.starts_with(open) {
        return (String::new(), 0);
    }

    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return (s[open.len_utf8()..i].to_owned(), i + close.len_utf8());
                }
            }
            _ => {}
        }
    }

    (String::new(), 0)
}

/// Number of leading spaces (tabs count as four).
pub(crate) fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Parse a whole line as a container directive opening or closing fence.
///
/// Returns `None` if the line is not a container directive.
pub(crate) fn parse_container_line(line: &str) -> Option<ParsedDirective> {
    if indentation(line) >= 4 {
        return None;
    }
    let trimmed = line.trim();
    if !trimmed.starts_with(":::") {
        return None;
    }

    let colon_count = trimmed.chars().take_while(|&c| c == ':').count();
    let after_colons = trimmed[colon_count..].trim_start();

    if after_colons.is_empty() {
        return Some(ParsedDirective::ContainerEnd);
    }

    let (name, rest) = split_name(after_colons)?;
    let (args, _) = parse_tail(rest);

    Some(ParsedDirective::ContainerStart {
        name: name.to_owned(),
        args,
    })
}

/// Parse a whole line as a leaf directive: `::name[label]{attrs}`.
///
/// Anything but whitespace after the attributes disqualifies the line.
pub(crate) fn parse_leaf_line(line: &str) -> Option<ParsedDirective> {
    if indentation(line) >= 4 {
        return None;
    }
    let trimmed = line.trim();
    let after_colons = trimmed.strip_prefix("::")?;
    if after_colons.starts_with(':') {
        return None;
    }

    let (name, rest) = split_name(after_colons)?;
    let (args, consumed) = parse_tail(rest);
    if !rest[consumed..].trim().is_empty() {
        return None;
    }

    Some(ParsedDirective::Leaf {
        name: name.to_owned(),
        args,
    })
}

/// Find the first text directive in `line` at or after byte `from`.
///
/// A text directive needs a `[label]` or `{attrs}` tail, and its colon may not
/// directly follow an alphanumeric character or another colon (so times like
/// `10:30` and URLs stay text). Returns the directive with its byte range.
pub(crate) fn find_text_directive(
    line: &str,
    from: usize,
) -> Option<(ParsedDirective, usize, usize)> {
    let mut search = from;

    while let Some(offset) = line[search..].find(':') {
        let start = search + offset;
        search = start + 1;

        let preceded_ok = line[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric() && c != ':');
        if !preceded_ok {
            continue;
        }

        let Some((name, rest)) = split_name(&line[start + 1..]) else {
            continue;
        };
        let (args, consumed) = parse_tail(rest);
        if consumed == 0 {
            continue;
        }

        let end = start + 1 + name.len() + consumed;
        return Some((
            ParsedDirective::Text {
                name: name.to_owned(),
                args,
            },
            start,
            end,
        ));
    }

    None
}
