//! Post loading: read, compile, parse metadata.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use kiji_markdown::Compiler;
use rayon::prelude::*;

use crate::{Post, PostError, PostMetadata, post::post_id};

/// Stack size of loader worker threads.
///
/// Rayon's default of 2 MiB is tight for trees near
/// [`kiji_markdown::MAX_DEPTH_LIMIT`] in unoptimized builds.
const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Posts loaded from a batch of files, with per-file failures.
#[derive(Debug, Default)]
pub struct LoadedPosts {
    /// Successfully loaded posts, newest first.
    pub posts: Vec<Post>,
    /// Files that failed to load, in input order.
    pub errors: Vec<PostError>,
}

/// Loads posts with a shared [`Compiler`].
#[derive(Clone, Debug, Default)]
pub struct PostLoader {
    compiler: Compiler,
    root: Option<PathBuf>,
}

impl PostLoader {
    #[must_use]
    pub fn new(compiler: Compiler) -> Self {
        Self {
            compiler,
            root: None,
        }
    }

    /// Report source paths relative to `root` (usually the posts directory).
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    #[must_use]
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Read, compile and parse the metadata of one post.
    ///
    /// Diagnostics use the root-relative path as source identifier.
    pub fn load(&self, path: &Path) -> Result<Post, PostError> {
        let source = std::fs::read_to_string(path).map_err(|source| PostError::Io {
            path: path.to_owned(),
            source,
        })?;

        let source_path = self.relative_path(path);
        let source_id = source_path.to_string_lossy();
        let compiled = self
            .compiler
            .compile(&source, &source_id)
            .map_err(|source| PostError::Compile {
                path: path.to_owned(),
                source,
            })?;
        let metadata = PostMetadata::from_front_matter(&compiled.front_matter).map_err(|source| {
            PostError::Metadata {
                path: path.to_owned(),
                source,
            }
        })?;

        tracing::debug!(
            path = %path.display(),
            warnings = compiled.warnings.len(),
            "Loaded post"
        );

        Ok(Post {
            id: post_id(path),
            source_path,
            metadata,
            document: compiled.document,
            warnings: compiled.warnings,
        })
    }

    /// Load many posts in parallel.
    ///
    /// Runs on a dedicated rayon pool with 8 MiB worker stacks. A
    /// failing file does not abort the batch. When two files share an id
    /// the one listed first is kept.
    pub fn load_all(&self, paths: &[PathBuf]) -> LoadedPosts {
        let results: Vec<Result<Post, PostError>> = match rayon::ThreadPoolBuilder::new()
            .stack_size(WORKER_STACK_SIZE)
            .build()
        {
            Ok(pool) => pool.install(|| paths.par_iter().map(|path| self.load(path)).collect()),
            Err(error) => {
                tracing::warn!(%error, "Failed to create loader thread pool, loading sequentially");
                paths.iter().map(|path| self.load(path)).collect()
            }
        };

        let mut loaded = LoadedPosts {
            posts: Vec::with_capacity(results.len()),
            errors: Vec::new(),
        };
        let mut seen = HashSet::new();

        for result in results {
            match result {
                Ok(post) if seen.contains(&post.id) => {
                    tracing::warn!(
                        id = %post.id,
                        path = %post.source_path.display(),
                        "Duplicate post id, skipping"
                    );
                }
                Ok(post) => {
                    seen.insert(post.id.clone());
                    loaded.posts.push(post);
                }
                Err(error) => loaded.errors.push(error),
            }
        }

        sort_newest_first(&mut loaded.posts);
        loaded
    }

    /// Find every Markdown file under `dir`, sorted by path.
    pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, PostError> {
        if !dir.is_dir() {
            return Err(PostError::Io {
                path: dir.to_owned(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "posts directory not found",
                ),
            });
        }

        let pattern = format!("{}/**/*.md", glob::Pattern::escape(&dir.to_string_lossy()));
        let mut paths = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry.map_err(|e| PostError::Io {
                path: e.path().to_owned(),
                source: e.into_error(),
            })?;
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn relative_path(&self, path: &Path) -> PathBuf {
        self.root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
            .to_owned()
    }
}

/// Sort by publication date, newest first. Equal dates keep their order.
fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.metadata.published.cmp(&a.metadata.published));
}

#[cfg(test)]
mod tests {
    use std::fs;

    use kiji_markdown::{CompileError, CompilerConfig, DiagnosticKind, MAX_DEPTH_LIMIT};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn post(date: &str) -> String {
        format!("---\ntitle: Post\npublished: {date}\n---\nBody.\n")
    }

    #[test]
    fn test_load_single_post() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            "2024/hello.md",
            "---\ntitle: Hello\npublished: 2024-05-01\ntags: [rust]\n---\n# Hi\n\n<div>x</div>\n",
        );

        let loader = PostLoader::default().with_root(temp.path());
        let post = loader.load(&path).unwrap();

        assert_eq!(post.id, "hello");
        assert_eq!(post.source_path, PathBuf::from("2024/hello.md"));
        assert_eq!(post.metadata.title.as_deref(), Some("Hello"));
        assert_eq!(post.metadata.tags, vec!["rust".to_owned()]);
        assert_eq!(post.warnings.len(), 1);
        assert_eq!(post.warnings[0].kind, DiagnosticKind::RawHtml);
        assert_eq!(post.warnings[0].source, "2024/hello.md");
        assert_eq!(post.warnings[0].position.line, 8);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = PostLoader::default()
            .load(&temp.path().join("nope.md"))
            .unwrap_err();
        assert!(matches!(err, PostError::Io { .. }));
    }

    #[test]
    fn test_load_without_published_fails() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "draft.md", "# Draft\n");
        let err = PostLoader::default().load(&path).unwrap_err();
        assert!(matches!(err, PostError::Metadata { .. }));
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn test_load_nesting_error() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            "deep.md",
            "---\npublished: 2024-01-01\n---\n> > > > deep\n",
        );
        let loader = PostLoader::new(Compiler::new(CompilerConfig::new().with_max_depth(2)));
        let err = loader.load(&path).unwrap_err();
        assert!(matches!(err, PostError::Compile { .. }));
    }

    #[test]
    fn test_load_all_at_depth_limit() {
        let temp = TempDir::new().unwrap();
        let nested = |depth: usize| {
            format!(
                "---\npublished: 2024-01-01\n---\n{}deep\n",
                "> ".repeat(depth)
            )
        };
        let paths = vec![
            write(temp.path(), "limit.md", &nested(MAX_DEPTH_LIMIT - 8)),
            write(temp.path(), "over.md", &nested(1000)),
        ];
        let loader = PostLoader::new(Compiler::new(
            CompilerConfig::new().with_max_depth(MAX_DEPTH_LIMIT),
        ));

        let loaded = loader.load_all(&paths);

        assert_eq!(loaded.posts.len(), 1);
        assert_eq!(loaded.posts[0].id, "limit");
        assert!(matches!(
            &loaded.errors[..],
            [PostError::Compile {
                source: CompileError::NestingTooDeep { .. },
                ..
            }]
        ));
    }

    #[test]
    fn test_load_all_sorts_and_collects_errors() {
        let temp = TempDir::new().unwrap();
        let paths = vec![
            write(temp.path(), "old.md", &post("2023-01-01")),
            write(temp.path(), "broken.md", "---\npublished: someday\n---\n"),
            write(temp.path(), "new.md", &post("2024-06-01T09:00:00Z")),
            write(temp.path(), "mid.md", &post("2024-06-01")),
        ];

        let loaded = PostLoader::default().load_all(&paths);

        let ids: Vec<&str> = loaded.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        assert_eq!(loaded.errors.len(), 1);
        assert!(matches!(
            &loaded.errors[0],
            PostError::Metadata { path, .. } if path.ends_with("broken.md")
        ));
    }

    #[test]
    fn test_load_all_skips_duplicate_ids() {
        let temp = TempDir::new().unwrap();
        let paths = vec![
            write(temp.path(), "a/same.md", &post("2024-01-01")),
            write(temp.path(), "b/same.md", &post("2025-01-01")),
        ];

        let loaded = PostLoader::default().with_root(temp.path()).load_all(&paths);

        assert_eq!(loaded.posts.len(), 1);
        assert_eq!(loaded.posts[0].source_path, PathBuf::from("a/same.md"));
        assert!(loaded.errors.is_empty());
    }

    #[test]
    fn test_discover_finds_nested_markdown() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "b.md", "");
        write(temp.path(), "nested/a.md", "");
        write(temp.path(), "notes.txt", "");

        let paths = PostLoader::discover(temp.path()).unwrap();
        let names: Vec<PathBuf> = paths
            .iter()
            .map(|p| p.strip_prefix(temp.path()).unwrap().to_owned())
            .collect();
        assert_eq!(names, vec![PathBuf::from("b.md"), PathBuf::from("nested/a.md")]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let temp = TempDir::new().unwrap();
        let err = PostLoader::discover(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, PostError::Io { .. }));
    }
}
