//! Compile entry point: source text in, resolved document out.

use crate::ast::Document;
use crate::code::LanguageAliases;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::directive::preprocess::preprocess;
use crate::directive::resolve::DirectiveResolver;
use crate::error::CompileError;
use crate::fold::Fold;
use crate::front_matter::{FrontMatter, extract_front_matter};
use crate::html::{HtmlPolicy, HtmlSanitizer};
use crate::parse::parse_blocks;
use crate::references;

/// Default nesting limit for blocks and inlines.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Highest accepted nesting limit.
///
/// The passes after tree building recurse once per level, so deeper trees
/// could exhaust a worker thread's stack.
pub const MAX_DEPTH_LIMIT: usize = 256;

/// Compiler settings.
///
/// Immutable once handed to a [`Compiler`].
#[derive(Clone, Debug)]
pub struct CompilerConfig {
    html_policy: HtmlPolicy,
    max_depth: usize,
    gfm_alerts: bool,
    language_aliases: LanguageAliases,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerConfig {
    /// Defaults: elide raw HTML, nesting limit of 64, GFM alerts on,
    /// built-in language aliases.
    #[must_use]
    pub fn new() -> Self {
        Self {
            html_policy: HtmlPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            gfm_alerts: true,
            language_aliases: LanguageAliases::default(),
        }
    }

    #[must_use]
    pub fn with_html_policy(mut self, policy: HtmlPolicy) -> Self {
        self.html_policy = policy;
        self
    }

    /// Set the nesting limit. Deeper input fails to compile.
    ///
    /// The limit is clamped to `1..=MAX_DEPTH_LIMIT`.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.clamp(1, MAX_DEPTH_LIMIT);
        self
    }

    /// Enable or disable `> [!NOTE]` blockquote alerts.
    #[must_use]
    pub fn with_gfm_alerts(mut self, enabled: bool) -> Self {
        self.gfm_alerts = enabled;
        self
    }

    /// Replace the code block language alias table.
    #[must_use]
    pub fn with_language_aliases(mut self, aliases: LanguageAliases) -> Self {
        self.language_aliases = aliases;
        self
    }

    pub fn html_policy(&self) -> HtmlPolicy {
        self.html_policy
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn gfm_alerts(&self) -> bool {
        self.gfm_alerts
    }

    pub fn language_aliases(&self) -> &LanguageAliases {
        &self.language_aliases
    }
}

/// Output of a successful compile.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CompileResult {
    /// Raw front matter block, empty when the post has none.
    pub front_matter: FrontMatter,
    /// Resolved document tree.
    pub document: Document,
    /// Non-fatal problems in source order of the passes that found them.
    pub warnings: Vec<Diagnostic>,
}

/// Markdown post compiler.
///
/// Holds read-only configuration only, so one instance can compile many
/// posts from many threads.
///
/// # Example
///
/// ```
/// use kiji_markdown::{Block, Compiler, Inline};
///
/// let source = "---\ntitle: Hi\n---\n# Hello\n\nSee [^1].\n\n[^1]: a note\n";
/// let result = Compiler::default().compile(source, "hello.md").unwrap();
///
/// assert_eq!(result.front_matter.raw, "title: Hi");
/// assert_eq!(result.document.blocks.len(), 2);
/// assert_eq!(result.document.footnotes[0].label, "1");
/// assert!(matches!(
///     &result.document.blocks[1],
///     Block::Paragraph(inlines) if matches!(&inlines[1], Inline::FootnoteRef { label, .. } if label == "1")
/// ));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile one post.
    ///
    /// `source_id` names the post in diagnostics (usually its path).
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::NestingTooDeep`] when the input nests deeper
    /// than [`CompilerConfig::max_depth`], and [`CompileError::Invariant`]
    /// if the compiler produces an inconsistent tree.
    pub fn compile(&self, source: &str, source_id: &str) -> Result<CompileResult, CompileError> {
        let extracted = extract_front_matter(source);
        let mut diagnostics = Diagnostics::new(source_id);

        let pre = preprocess(extracted.body);
        tracing::debug!(
            source = source_id,
            directives = pre.directives.len(),
            "Preprocessed directives"
        );

        let blocks = parse_blocks(
            &pre,
            extracted.body_line_offset,
            &self.config,
            &mut diagnostics,
        )?;
        let blocks = HtmlSanitizer::new(&self.config, &pre, &mut diagnostics).fold_blocks(blocks);
        let blocks = DirectiveResolver::new(&mut diagnostics).fold_blocks(blocks);
        let document = references::resolve(
            Document {
                blocks,
                footnotes: Vec::new(),
            },
            &mut diagnostics,
        );

        check_resolved(&document)?;
        let warnings = diagnostics.into_vec();
        tracing::debug!(
            source = source_id,
            blocks = document.blocks.len(),
            footnotes = document.footnotes.len(),
            warnings = warnings.len(),
            "Compiled post"
        );

        Ok(CompileResult {
            front_matter: extracted.front_matter,
            document,
            warnings,
        })
    }
}

/// Re-run reference resolution on a document.
///
/// Reference nodes left in `document` are resolved against definitions
/// still present in it. A fully resolved document comes back unchanged
/// with no diagnostics.
#[must_use]
pub fn resolve_references(document: Document, source_id: &str) -> (Document, Vec<Diagnostic>) {
    let mut diagnostics = Diagnostics::new(source_id);
    let document = references::resolve(document, &mut diagnostics);
    (document, diagnostics.into_vec())
}

/// Fail if any pre-resolution node survived the passes.
fn check_resolved(document: &Document) -> Result<(), CompileError> {
    use crate::ast::{Block, Inline};
    use crate::fold::{Visit, visit_block_children, visit_blocks, visit_inline_children};

    #[derive(Default)]
    struct Leftover(Option<String>);

    impl Visit for Leftover {
        fn visit_block(&mut self, block: &Block) {
            if self.0.is_none() && !block.is_resolved() {
                self.0 = Some(format!("{block:?}"));
            }
            visit_block_children(self, block);
        }

        fn visit_inline(&mut self, inline: &Inline) {
            if self.0.is_none() && !inline.is_resolved() {
                self.0 = Some(format!("{inline:?}"));
            }
            visit_inline_children(self, inline);
        }
    }

    let mut leftover = Leftover::default();
    visit_blocks(&mut leftover, &document.blocks);
    for footnote in &document.footnotes {
        visit_blocks(&mut leftover, &footnote.blocks);
    }
    match leftover.0 {
        Some(node) => Err(CompileError::Invariant(format!(
            "unresolved node in output: {node}"
        ))),
        None => Ok(()),
    }
}
