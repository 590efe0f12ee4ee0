//! Document tree produced by the compiler.
//!
//! The tree is a closed sum type: every node kind a renderer may meet is a
//! variant of [`Block`] or [`Inline`], so renderers can match exhaustively.
//!
//! Some variants only exist between parsing and resolution (reference
//! nodes, definitions, directives, raw HTML). A tree returned from
//! [`Compiler::compile`](crate::Compiler::compile) never contains them;
//! [`Block::is_resolved`] and [`Inline::is_resolved`] tell the two forms apart.

use pulldown_cmark::BlockQuoteKind;

use crate::directive::DirectiveArgs;

/// 1-based source location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column in characters (1-indexed).
    pub column: usize,
}

impl Position {
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Root of a compiled post.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Document {
    /// Body content in document order.
    pub blocks: Vec<Block>,
    /// Footnotes in label order (first reference first).
    pub footnotes: Vec<Footnote>,
}

/// A resolved footnote, rendered in the end section.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Footnote {
    /// Normalized identifier.
    pub identifier: String,
    /// Anchor id shared with every reference to this footnote.
    pub anchor: String,
    /// Display label ("1", "2", ...).
    pub label: String,
    /// Footnote body.
    pub blocks: Vec<Block>,
}

/// Callout kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AlertKind {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

impl AlertKind {
    /// Every recognized kind.
    pub const ALL: [AlertKind; 5] = [
        AlertKind::Note,
        AlertKind::Tip,
        AlertKind::Important,
        AlertKind::Warning,
        AlertKind::Caution,
    ];

    /// Look up a kind by directive name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }

    /// Lowercase directive name of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Note => "note",
            AlertKind::Tip => "tip",
            AlertKind::Important => "important",
            AlertKind::Warning => "warning",
            AlertKind::Caution => "caution",
        }
    }
}

impl From<BlockQuoteKind> for AlertKind {
    fn from(kind: BlockQuoteKind) -> Self {
        match kind {
            BlockQuoteKind::Note => AlertKind::Note,
            BlockQuoteKind::Tip => AlertKind::Tip,
            BlockQuoteKind::Important => AlertKind::Important,
            BlockQuoteKind::Warning => AlertKind::Warning,
            BlockQuoteKind::Caution => AlertKind::Caution,
        }
    }
}

/// Column alignment in a table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Alignment {
    #[default]
    None,
    Left,
    Center,
    Right,
}

impl From<pulldown_cmark::Alignment> for Alignment {
    fn from(alignment: pulldown_cmark::Alignment) -> Self {
        match alignment {
            pulldown_cmark::Alignment::None => Alignment::None,
            pulldown_cmark::Alignment::Left => Alignment::Left,
            pulldown_cmark::Alignment::Center => Alignment::Center,
            pulldown_cmark::Alignment::Right => Alignment::Right,
        }
    }
}

/// Directive syntax form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DirectiveKind {
    /// `:::name` ... `:::`
    Container,
    /// `::name[label]{attrs}`
    Leaf,
    /// `:name[label]{attrs}`
    Text,
}

/// Unresolved directive node.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Directive {
    pub kind: DirectiveKind,
    pub name: String,
    pub args: DirectiveArgs,
    /// Block children (containers only).
    pub children: Vec<Block>,
    pub position: Position,
}

/// List item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ListItem {
    /// Task list state, `None` for plain items.
    pub checked: Option<bool>,
    pub children: Vec<Block>,
}

/// Block-level node.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Block {
    Paragraph(Vec<Inline>),
    Heading {
        /// 1 to 6.
        level: u8,
        children: Vec<Inline>,
    },
    BlockQuote(Vec<Block>),
    List {
        /// Start number for ordered lists, `None` for bullet lists.
        start: Option<u64>,
        /// Items hold bare inline content (no blank lines between items).
        tight: bool,
        items: Vec<ListItem>,
    },
    CodeBlock {
        /// Highlighting language after alias resolution.
        language: Option<String>,
        /// Caption taken from the fence info string.
        title: Option<String>,
        code: String,
    },
    /// Display math.
    Math(String),
    Table {
        alignments: Vec<Alignment>,
        head: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    Alert {
        kind: AlertKind,
        title: Option<String>,
        children: Vec<Block>,
    },
    ThematicBreak,
    /// Unresolved directive (container or leaf).
    Directive(Directive),
    /// Link reference definition `[id]: url "title"`.
    Definition {
        identifier: String,
        url: String,
        title: Option<String>,
        position: Position,
    },
    /// Footnote definition `[^id]: ...`.
    FootnoteDefinition {
        identifier: String,
        children: Vec<Block>,
        position: Position,
    },
    /// Raw HTML block before sanitization.
    Html { raw: String, position: Position },
}

impl Block {
    /// Whether this node kind may appear in a compiled document.
    ///
    /// Only checks this node, not its children.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(
            self,
            Block::Directive(_)
                | Block::Definition { .. }
                | Block::FootnoteDefinition { .. }
                | Block::Html { .. }
        )
    }
}

/// Inline-level node.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Inline {
    Text(String),
    Code(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Math {
        expr: String,
        display: bool,
    },
    Link {
        url: String,
        title: Option<String>,
        children: Vec<Inline>,
    },
    Image {
        url: String,
        title: Option<String>,
        alt: String,
    },
    /// Resolved footnote reference.
    FootnoteRef {
        identifier: String,
        anchor: String,
        label: String,
    },
    SoftBreak,
    HardBreak,
    /// `[text][id]`, `[id][]` or `[id]` before resolution.
    LinkReference {
        identifier: String,
        children: Vec<Inline>,
        position: Position,
    },
    /// `![alt][id]` before resolution.
    ImageReference {
        identifier: String,
        alt: String,
        position: Position,
    },
    /// `[^id]` before resolution.
    FootnoteReference {
        identifier: String,
        position: Position,
    },
    /// Text directive `:name[label]{attrs}`.
    Directive(Directive),
    /// Inline raw HTML before sanitization.
    Html { raw: String, position: Position },
}

impl Inline {
    /// Whether this node kind may appear in a compiled document.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(
            self,
            Inline::LinkReference { .. }
                | Inline::ImageReference { .. }
                | Inline::FootnoteReference { .. }
                | Inline::Directive(_)
                | Inline::Html { .. }
        )
    }

    /// Create a text node.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Inline::Text(value.into())
    }
}

/// Concatenate the plain text of inline nodes (used for image alt text).
#[must_use]
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    push_plain_text(inlines, &mut out);
    out
}

fn push_plain_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) | Inline::Code(text) => out.push_str(text),
            Inline::Math { expr, .. } => out.push_str(expr),
            Inline::Emphasis(children)
            | Inline::Strong(children)
            | Inline::Strikethrough(children)
            | Inline::Link { children, .. }
            | Inline::LinkReference { children, .. } => push_plain_text(children, out),
            Inline::Image { alt, .. } | Inline::ImageReference { alt, .. } => out.push_str(alt),
            Inline::SoftBreak | Inline::HardBreak => out.push(' '),
            Inline::FootnoteRef { .. }
            | Inline::FootnoteReference { .. }
            | Inline::Directive(_)
            | Inline::Html { .. } => {}
        }
    }
}
