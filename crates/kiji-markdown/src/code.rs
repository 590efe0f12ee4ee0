//! Code block fence info and language aliases.

use std::collections::BTreeMap;

/// Language and caption taken from a fence info string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FenceInfo {
    pub language: Option<String>,
    pub title: Option<String>,
}

/// Parse fence info into language and caption.
///
/// Format: `language [caption]`, where the caption is either the rest of the
/// line or a `title="..."` attribute.
pub(crate) fn parse_fence_info(info: &str) -> FenceInfo {
    let info = info.trim();
    let (language, rest) = match info.split_once(char::is_whitespace) {
        Some((language, rest)) => (language, rest.trim()),
        None => (info, ""),
    };

    FenceInfo {
        language: (!language.is_empty()).then(|| language.to_owned()),
        title: title_attribute(rest)
            .or_else(|| (!rest.is_empty()).then_some(rest))
            .map(str::to_owned),
    }
}

/// Value of a quoted `title=` attribute.
fn title_attribute(s: &str) -> Option<&str> {
    let start = s.find("title=")?;
    if start > 0 && !s[..start].ends_with(char::is_whitespace) {
        return None;
    }
    let value = &s[start + "title=".len()..];
    ['"', '\''].into_iter().find_map(|quote| {
        let inner = value.strip_prefix(quote)?;
        inner.find(quote).map(|end| &inner[..end])
    })
}

/// Maps fence languages to the names the highlighter knows.
///
/// Defaults map `command` and `shell-session` to `shellsession`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageAliases {
    aliases: BTreeMap<String, String>,
}

impl Default for LanguageAliases {
    fn default() -> Self {
        Self::empty()
            .with_alias("command", "shellsession")
            .with_alias("shell-session", "shellsession")
    }
}

impl LanguageAliases {
    /// Alias table without the default entries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            aliases: BTreeMap::new(),
        }
    }

    /// Add or replace an alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>, language: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), language.into());
        self
    }

    /// Resolve a fence language through the table.
    #[must_use]
    pub fn resolve<'a>(&'a self, language: &'a str) -> &'a str {
        self.aliases.get(language).map_or(language, String::as_str)
    }

    /// Iterate over `(alias, language)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases
            .iter()
            .map(|(alias, language)| (alias.as_str(), language.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LanguageAliases {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |aliases, (k, v)| aliases.with_alias(k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_only() {
        let info = parse_fence_info("rust");
        assert_eq!(info.language.as_deref(), Some("rust"));
        assert_eq!(info.title, None);
    }

    #[test]
    fn test_empty_info() {
        assert_eq!(parse_fence_info(""), FenceInfo::default());
        assert_eq!(parse_fence_info("   "), FenceInfo::default());
    }

    #[test]
    fn test_rest_is_caption() {
        let info = parse_fence_info("ts src/lib/post.ts");
        assert_eq!(info.language.as_deref(), Some("ts"));
        assert_eq!(info.title.as_deref(), Some("src/lib/post.ts"));
    }

    #[test]
    fn test_title_attribute() {
        let info = parse_fence_info(r#"python title="Hello world" linenums"#);
        assert_eq!(info.title.as_deref(), Some("Hello world"));

        let info = parse_fence_info("sh title='run.sh'");
        assert_eq!(info.title.as_deref(), Some("run.sh"));
    }

    #[test]
    fn test_title_attribute_needs_word_boundary() {
        let info = parse_fence_info(r#"txt subtitle="x""#);
        assert_eq!(info.title.as_deref(), Some(r#"subtitle="x""#));
    }

    #[test]
    fn test_default_aliases() {
        let aliases = LanguageAliases::default();
        assert_eq!(aliases.resolve("command"), "shellsession");
        assert_eq!(aliases.resolve("shell-session"), "shellsession");
        assert_eq!(aliases.resolve("rust"), "rust");
    }

    #[test]
    fn test_custom_aliases() {
        let aliases: LanguageAliases = [("js", "javascript")].into_iter().collect();
        assert_eq!(aliases.resolve("js"), "javascript");
        assert_eq!(aliases.resolve("command"), "command");
        assert_eq!(aliases.iter().count(), 1);
    }
}
