//! Post metadata parsed from front matter.
//!
//! Recognized fields:
//! - `title`: optional display title
//! - `published` (alias `date`): required ISO-8601 date or date-time
//! - `tags`, `categories`: term lists, also accepted under a TOML
//!   `[taxonomies]` table and merged with the top-level lists
//!
//! Unknown fields are ignored.

use std::sync::LazyLock;

use kiji_markdown::{FrontMatter, FrontMatterFormat};
use regex::Regex;
use serde::{Deserialize, Serialize};

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])([Tt ]([01]\d|2[0-3]):[0-5]\d(:[0-5]\d(\.\d+)?)? ?([Zz]|[+-]\d{2}:?\d{2})?)?$",
    )
    .expect("invalid ISO date regex")
});

/// Metadata of a single post.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Publication date as written, validated as ISO-8601.
    pub published: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

/// Error type for metadata parsing.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("invalid YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML front matter: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("missing required field `published`")]
    MissingPublished,

    #[error("`published` is not an ISO-8601 date: {0:?}")]
    InvalidPublished(String),
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawMetadata {
    title: Option<String>,
    #[serde(alias = "date")]
    published: Option<String>,
    tags: Vec<String>,
    categories: Vec<String>,
    taxonomies: Taxonomies,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct Taxonomies {
    tags: Vec<String>,
    categories: Vec<String>,
}

impl PostMetadata {
    /// Parse metadata from an extracted front matter block.
    ///
    /// A post without front matter fails with
    /// [`MetadataError::MissingPublished`].
    pub fn from_front_matter(front_matter: &FrontMatter) -> Result<Self, MetadataError> {
        let raw = match front_matter.format {
            Some(FrontMatterFormat::Toml) => parse_toml(&front_matter.raw)?,
            Some(FrontMatterFormat::Yaml) => parse_yaml(&front_matter.raw)?,
            None => RawMetadata::default(),
        };
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawMetadata) -> Result<Self, MetadataError> {
        let published = raw
            .published
            .map(|p| p.trim().to_owned())
            .ok_or(MetadataError::MissingPublished)?;
        if !ISO_DATE.is_match(&published) {
            return Err(MetadataError::InvalidPublished(published));
        }

        Ok(Self {
            title: raw.title.filter(|t| !t.trim().is_empty()),
            published,
            tags: merge_terms(raw.tags, raw.taxonomies.tags),
            categories: merge_terms(raw.categories, raw.taxonomies.categories),
        })
    }
}

fn parse_yaml(content: &str) -> Result<RawMetadata, MetadataError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(RawMetadata::default());
    }
    Ok(serde_yaml::from_str(trimmed)?)
}

fn parse_toml(content: &str) -> Result<RawMetadata, MetadataError> {
    let mut table: toml::Table = toml::from_str(content)?;
    // Native TOML dates become strings so both formats share one shape.
    for key in ["published", "date"] {
        if let Some(toml::Value::Datetime(datetime)) = table.get(key) {
            let text = datetime.to_string();
            table.insert(key.to_owned(), toml::Value::String(text));
        }
    }
    Ok(toml::Value::Table(table).try_into()?)
}

/// Concatenate term lists, dropping blanks and repeats.
fn merge_terms(first: Vec<String>, second: Vec<String>) -> Vec<String> {
    let mut terms: Vec<String> = Vec::with_capacity(first.len() + second.len());
    for term in first.into_iter().chain(second) {
        let term = term.trim();
        if !term.is_empty() && !terms.iter().any(|t| t == term) {
            terms.push(term.to_owned());
        }
    }
    terms
}
