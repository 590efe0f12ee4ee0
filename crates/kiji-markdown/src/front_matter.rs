//! Front matter extraction.
//!
//! A post may start with a metadata block fenced by `---` (YAML, closed by
//! `---` or `...`) or `+++` (TOML). The block is returned verbatim; parsing
//! its fields is left to the caller.

/// Metadata syntax, known from the opening delimiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FrontMatterFormat {
    Yaml,
    Toml,
}

/// Raw front matter block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FrontMatter {
    /// `None` when the source has no front matter.
    pub format: Option<FrontMatterFormat>,
    /// Block content between the delimiters, without the trailing newline.
    pub raw: String,
}

impl FrontMatter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.format.is_none()
    }
}

/// Source split into front matter and body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extracted<'a> {
    pub front_matter: FrontMatter,
    /// Markdown after the closing delimiter.
    pub body: &'a str,
    /// Number of source lines before the body starts.
    pub body_line_offset: usize,
}

/// Split a leading front matter block off `source`.
///
/// Never fails: without a complete block the whole source is the body.
///
/// # Example
///
/// ```
/// use kiji_markdown::{FrontMatterFormat, extract_front_matter};
///
/// let extracted = extract_front_matter("+++\ntitle = \"Hi\"\n+++\n# Hello\n");
/// assert_eq!(extracted.front_matter.format, Some(FrontMatterFormat::Toml));
/// assert_eq!(extracted.front_matter.raw, "title = \"Hi\"");
/// assert_eq!(extracted.body, "# Hello\n");
/// assert_eq!(extracted.body_line_offset, 3);
/// ```
#[must_use]
pub fn extract_front_matter(source: &str) -> Extracted<'_> {
    let text = source.strip_prefix('\u{FEFF}').unwrap_or(source);
    let bom_len = source.len() - text.len();

    let mut lines = text.split_inclusive('\n');
    let opener = lines.next().map(str::trim_end);
    let (format, closers): (_, &[&str]) = match opener {
        Some("---") => (FrontMatterFormat::Yaml, &["---", "..."]),
        Some("+++") => (FrontMatterFormat::Toml, &["+++"]),
        _ => return whole_body(source),
    };

    let inner_start = text.find('\n').map_or(text.len(), |i| i + 1);
    let mut offset = inner_start;
    let mut line_count = 1;

    for line in lines {
        line_count += 1;
        if closers.contains(&line.trim_end()) {
            let raw = text[inner_start..offset].trim_end_matches(['\n', '\r']);
            let body_start = bom_len + offset + line.len();
            return Extracted {
                front_matter: FrontMatter {
                    format: Some(format),
                    raw: raw.to_owned(),
                },
                body: &source[body_start..],
                body_line_offset: line_count,
            };
        }
        offset += line.len();
    }

    whole_body(source)
}

fn whole_body(source: &str) -> Extracted<'_> {
    Extracted {
        front_matter: FrontMatter::default(),
        body: source,
        body_line_offset: 0,
    }
}
