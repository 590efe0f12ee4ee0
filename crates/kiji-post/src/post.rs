//! Loaded posts and loading errors.

use std::path::{Path, PathBuf};

use kiji_markdown::{CompileError, Diagnostic, Document};
use serde::Serialize;

use crate::{MetadataError, PostMetadata};

/// A compiled post with its metadata.
#[derive(Clone, Debug, Serialize)]
pub struct Post {
    /// File stem of the source, unique within a batch.
    pub id: String,
    /// Source path, relative to the loader root when one is set.
    pub source_path: PathBuf,
    pub metadata: PostMetadata,
    pub document: Document,
    pub warnings: Vec<Diagnostic>,
}

/// Post identifier derived from the file stem.
pub(crate) fn post_id(path: &Path) -> String {
    path.file_stem()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Error type for loading a single post.
#[derive(Debug, thiserror::Error)]
pub enum PostError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Compile {
        path: PathBuf,
        #[source]
        source: CompileError,
    },

    #[error("{}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    #[error("invalid posts directory pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl PostError {
    /// Path of the post that failed, if the error concerns one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Io { path, .. } | Self::Compile { path, .. } | Self::Metadata { path, .. } => {
                Some(path)
            }
            Self::Pattern(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_id_is_file_stem() {
        assert_eq!(post_id(Path::new("posts/2024/hello-world.md")), "hello-world");
        assert_eq!(post_id(Path::new("notes.v2.md")), "notes.v2");
    }

    #[test]
    fn test_error_display_names_path() {
        let err = PostError::Metadata {
            path: PathBuf::from("posts/a.md"),
            source: MetadataError::MissingPublished,
        };
        assert_eq!(err.to_string(), "posts/a.md: missing required field `published`");
        assert_eq!(err.path(), Some(Path::new("posts/a.md")));
    }
}
