//! Identifier normalization for definitions and footnotes.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters kept verbatim in footnote anchors. Everything else is
/// percent-encoded, including all non-ASCII bytes.
const ANCHOR_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b';')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',');

/// Prefix of every footnote anchor.
pub const FOOTNOTE_ANCHOR_PREFIX: &str = "footnote-";

/// Normalize a definition or reference label for matching.
///
/// Trims, collapses whitespace runs to a single space and case-folds, so
/// `[Foo  Bar]` and `[foo bar]` refer to the same definition.
///
/// # Example
///
/// ```
/// use kiji_markdown::normalize_identifier;
///
/// assert_eq!(normalize_identifier("  My\n  Note "), "my note");
/// assert_eq!(normalize_identifier("STRASSE"), normalize_identifier("Straße"));
/// ```
#[must_use]
pub fn normalize_identifier(label: &str) -> String {
    let mut collapsed = String::with_capacity(label.len());
    for word in label.split_whitespace() {
        if !collapsed.is_empty() {
            collapsed.push(' ');
        }
        collapsed.push_str(word);
    }

    let folded = collapsed.to_lowercase();
    if folded.contains('ß') {
        folded.replace('ß', "ss")
    } else {
        folded
    }
}

/// Anchor id for a footnote, derived from its identifier.
///
/// # Example
///
/// ```
/// use kiji_markdown::footnote_anchor;
///
/// assert_eq!(footnote_anchor("1"), "footnote-1");
/// assert_eq!(footnote_anchor("My Note"), "footnote-my%20note");
/// ```
#[must_use]
pub fn footnote_anchor(identifier: &str) -> String {
    let lowered = identifier.to_lowercase();
    format!(
        "{FOOTNOTE_ANCHOR_PREFIX}{}",
        utf8_percent_encode(&lowered, ANCHOR_SAFE)
    )
}
