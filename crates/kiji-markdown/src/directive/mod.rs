//! CommonMark directive syntax (`:name`, `::name`, `:::name`).
//!
//! # Architecture
//!
//! Directives are handled in two phases:
//!
//! 1. **Preprocessing**: directive syntax is replaced with markers that pass
//!    through pulldown-cmark unchanged. The tree builder turns the markers
//!    back into [`Directive`](crate::Directive) nodes with their children.
//!
//! 2. **Resolution**: directives named after an alert kind (`note`, `tip`,
//!    `important`, `warning`, `caution`) become [`Alert`](crate::Block::Alert)
//!    blocks. Every other directive is removed together with its children.
//!
//! # Directive Types
//!
//! - **Text**: `:name[label]{attrs}`, always removed
//! - **Leaf**: `::name[label]{attrs}` on a line of its own
//! - **Container**: `:::name[label]{attrs}` ... `:::`
//!
//! # Example
//!
//! ```
//! use kiji_markdown::{AlertKind, Block, Compiler};
//!
//! let source = ":::warning[Careful]\nHot surface.\n:::\n\n:::spoiler\nHidden\n:::\n";
//! let result = Compiler::default().compile(source, "post.md").unwrap();
//!
//! assert!(matches!(
//!     &result.document.blocks[..],
//!     [Block::Alert { kind: AlertKind::Warning, title: Some(title), .. }] if title == "Careful"
//! ));
//! assert_eq!(result.warnings.len(), 1);
//! ```

mod args;
pub(crate) mod fence;
pub(crate) mod parser;
pub(crate) mod preprocess;
pub(crate) mod resolve;

pub use args::DirectiveArgs;
