//! Blog post loading for kiji.
//!
//! Turns Markdown files into [`Post`]s: the source is compiled with
//! [`kiji_markdown::Compiler`], its front matter parsed into
//! [`PostMetadata`], and batches are loaded in parallel by
//! [`PostLoader::load_all`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use kiji_markdown::Compiler;
//! use kiji_post::{PostLoader, tag_counts};
//!
//! let dir = Path::new("posts");
//! let loader = PostLoader::new(Compiler::default()).with_root(dir);
//! let paths = PostLoader::discover(dir).unwrap();
//! let loaded = loader.load_all(&paths);
//!
//! for post in &loaded.posts {
//!     println!("{} {}", post.metadata.published, post.id);
//! }
//! println!("{} tags", tag_counts(&loaded.posts).len());
//! ```

mod loader;
mod metadata;
mod post;
mod terms;

pub use loader::{LoadedPosts, PostLoader};
pub use metadata::{MetadataError, PostMetadata};
pub use post::{Post, PostError};
pub use terms::{TermCount, category_counts, tag_counts};
