//! Markdown post compiler.
//!
//! Turns a blog post (front matter plus Markdown body) into a resolved,
//! render-ready [`Document`] tree. Rendering the tree is left to the caller.
//!
//! # Architecture
//!
//! A compile runs these passes in order, each a pure tree rebuild:
//!
//! 1. Front matter is split off ([`extract_front_matter`]).
//! 2. Directive syntax is replaced with markers ([`directive`]).
//! 3. pulldown-cmark events are folded into a pre-resolution tree.
//! 4. Raw HTML is elided or ingested per [`HtmlPolicy`].
//! 5. Directives become alerts or are removed.
//! 6. Link, image and footnote references are resolved and footnotes
//!    collected in first-reference order.
//!
//! Problems in the input never fail a compile. They are reported as
//! [`Diagnostic`]s next to the best-effort output. Only nesting beyond the
//! configured limit and internal invariant violations return a
//! [`CompileError`].
//!
//! # Example
//!
//! ```
//! use kiji_markdown::{Block, Compiler, CompilerConfig, HtmlPolicy};
//!
//! let compiler = Compiler::new(CompilerConfig::new().with_html_policy(HtmlPolicy::Elide));
//! let result = compiler.compile("# Title\n\n<div>raw</div>\n", "post.md").unwrap();
//!
//! assert!(matches!(&result.document.blocks[..], [Block::Heading { level: 1, .. }]));
//! assert_eq!(result.warnings[0].to_string(), "post.md:3:1: raw HTML `<div>raw</div>` removed");
//! ```

mod ast;
mod code;
mod compiler;
pub mod directive;
mod diagnostics;
mod error;
mod fold;
mod front_matter;
mod html;
mod normalize;
mod parse;
mod references;

pub use ast::{
    AlertKind, Alignment, Block, Directive, DirectiveKind, Document, Footnote, Inline, ListItem,
    Position, plain_text,
};
pub use code::LanguageAliases;
pub use compiler::{
    CompileResult, Compiler, CompilerConfig, DEFAULT_MAX_DEPTH, MAX_DEPTH_LIMIT,
    resolve_references,
};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::CompileError;
pub use front_matter::{Extracted, FrontMatter, FrontMatterFormat, extract_front_matter};
pub use html::{HtmlPolicy, ParseHtmlPolicyError};
pub use normalize::{FOOTNOTE_ANCHOR_PREFIX, footnote_anchor, normalize_identifier};
