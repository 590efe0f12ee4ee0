//! Directive argument parsing.
//!
//! Parses the `[label]{#id .class key="value"}` tail of a directive.

use std::collections::BTreeMap;

/// Label and attributes of a directive.
///
/// # Example
///
/// ```
/// use kiji_markdown::directive::DirectiveArgs;
///
/// let args = DirectiveArgs::parse("Heads up", r#"#intro .wide title="Read me""#);
/// assert_eq!(args.label, "Heads up");
/// assert_eq!(args.id.as_deref(), Some("intro"));
/// assert_eq!(args.classes, vec!["wide"]);
/// assert_eq!(args.get("title"), Some("Read me"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DirectiveArgs {
    /// Text from brackets: `[label]` (empty string if not provided).
    pub label: String,
    /// ID from attributes: `{#id}`.
    pub id: Option<String>,
    /// Classes from attributes: `{.class1 .class2}`.
    pub classes: Vec<String>,
    /// Key-value attributes: `{key="value"}`.
    pub attrs: BTreeMap<String, String>,
}

impl DirectiveArgs {
    /// Parse a label and an attribute string (without braces).
    #[must_use]
    pub fn parse(label: &str, attrs_str: &str) -> Self {
        let mut args = Self {
            label: label.trim().to_owned(),
            ..Default::default()
        };

        let mut remaining = attrs_str.trim();

        while !remaining.is_empty() {
            remaining = remaining.trim_start();

            if let Some(rest) = remaining.strip_prefix('#') {
                let end = shorthand_end(rest);
                if end > 0 {
                    args.id = Some(rest[..end].to_owned());
                }
                remaining = &rest[end..];
            } else if let Some(rest) = remaining.strip_prefix('.') {
                let end = shorthand_end(rest);
                if end > 0 {
                    args.classes.push(rest[..end].to_owned());
                }
                remaining = &rest[end..];
            } else if let Some((key, value, rest)) = parse_key_value(remaining) {
                args.attrs.insert(key.to_owned(), value.to_owned());
                remaining = rest;
            } else {
                let skip = remaining.chars().next().map_or(0, char::len_utf8);
                remaining = &remaining[skip..];
            }
        }

        args
    }

    /// Get an attribute value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Label, or `None` when it is empty.
    #[must_use]
    pub fn non_empty_label(&self) -> Option<&str> {
        (!self.label.is_empty()).then_some(self.label.as_str())
    }
}

/// End of a `#id` / `.class` shorthand token.
fn shorthand_end(s: &str) -> usize {
    s.find(|c: char| c.is_whitespace() || c == '.' || c == '#')
        .unwrap_or(s.len())
}

/// Parse a key-value pair from the attributes string.
///
/// Supports: `key="value"`, `key='value'`, `key=value`
fn parse_key_value(s: &str) -> Option<(&str, &str, &str)> {
    let eq_pos = s.find('=')?;
    let key = s[..eq_pos].trim();

    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }

    let after_eq = &s[eq_pos + 1..];

    for quote in ['"', '\''] {
        if let Some(stripped) = after_eq.strip_prefix(quote) {
            let end_quote = stripped.find(quote)?;
            return Some((key, &stripped[..end_quote], &stripped[end_quote + 1..]));
        }
    }

    let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
    Some((key, &after_eq[..end], &after_eq[end..]))
}
