//! Raw HTML policy.
//!
//! Post bodies never pass raw HTML through. Comments are dropped silently;
//! anything else is either elided with a diagnostic ([`HtmlPolicy::Elide`])
//! or, for HTML blocks, converted into tree nodes through an allow-list
//! ([`HtmlPolicy::Ingest`]).

use std::fmt;
use std::str::FromStr;

use crate::ast::{Block, Inline, ListItem, Position};
use crate::compiler::CompilerConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::directive::preprocess::Preprocessed;
use crate::fold::{Fold, drop_if_empty, walk_block, walk_inline};
use crate::parse::parse_fragment;

/// What to do with raw HTML in a post.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum HtmlPolicy {
    /// Remove raw HTML and report it.
    #[default]
    Elide,
    /// Convert allow-listed elements of HTML blocks into tree nodes.
    Ingest,
}

impl HtmlPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HtmlPolicy::Elide => "elide",
            HtmlPolicy::Ingest => "ingest",
        }
    }
}

impl fmt::Display for HtmlPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an [`HtmlPolicy`] name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown HTML policy `{0}` (expected `elide` or `ingest`)")]
pub struct ParseHtmlPolicyError(String);

impl FromStr for HtmlPolicy {
    type Err = ParseHtmlPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "elide" => Ok(HtmlPolicy::Elide),
            "ingest" => Ok(HtmlPolicy::Ingest),
            _ => Err(ParseHtmlPolicyError(s.to_owned())),
        }
    }
}

/// Elements removed with everything inside them.
const DROPPED_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "applet", "frame", "frameset", "form",
    "input", "button", "textarea", "select", "option", "template", "noscript", "svg", "math",
    "link", "meta", "base", "head", "title",
];

/// Whether `raw` consists of HTML comments and whitespace only.
///
/// An unterminated comment runs to the end of the fragment.
fn is_comment_only(raw: &str) -> bool {
    let mut rest = raw.trim_start();
    while !rest.is_empty() {
        let Some(comment) = rest.strip_prefix("<!--") else {
            return false;
        };
        rest = match comment.find("-->") {
            Some(end) => comment[end + 3..].trim_start(),
            None => "",
        };
    }
    true
}

fn is_closing_tag(raw: &str) -> bool {
    raw.trim_start().starts_with("</")
}

fn is_line_break(raw: &str) -> bool {
    let tag: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    tag.eq_ignore_ascii_case("<br>") || tag.eq_ignore_ascii_case("<br/>")
}

/// First line of a fragment, shortened for messages.
fn summary(raw: &str) -> String {
    const MAX_CHARS: usize = 40;
    let line = raw.trim().lines().next().unwrap_or_default();
    if line.chars().count() > MAX_CHARS {
        let cut: String = line.chars().take(MAX_CHARS).collect();
        format!("{cut}...")
    } else {
        line.to_owned()
    }
}

/// Decode the character references `tl` leaves in text and attributes.
fn decode_entities(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

/// Links and images keep only relative or http(s)/mailto URLs.
fn is_safe_url(url: &str) -> bool {
    let url = url.trim();
    match url.find(':') {
        Some(colon) if !url[..colon].contains(['/', '?', '#']) => {
            let scheme = url[..colon].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => true,
    }
}

/// Collapse whitespace runs to single spaces, as HTML rendering does.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Inline content of a block parsed out of HTML text.
fn block_inlines(block: Block, out: &mut Vec<Inline>) {
    match block {
        Block::Paragraph(children) | Block::Heading { children, .. } => out.extend(children),
        Block::BlockQuote(children) | Block::Alert { children, .. } => {
            for child in children {
                block_inlines(child, out);
            }
        }
        Block::List { items, .. } => {
            for child in items.into_iter().flat_map(|item| item.children) {
                block_inlines(child, out);
            }
        }
        Block::CodeBlock { code, .. } => out.push(Inline::Code(code)),
        Block::Math(expr) => out.push(Inline::Math {
            expr,
            display: true,
        }),
        Block::Table { .. }
        | Block::ThematicBreak
        | Block::Directive(_)
        | Block::Definition { .. }
        | Block::FootnoteDefinition { .. }
        | Block::Html { .. } => {}
    }
}

/// Result of converting one HTML node.
enum Converted {
    Blocks(Vec<Block>),
    Inlines(Vec<Inline>),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Context {
    Block,
    Inline,
}

/// Applies the [`HtmlPolicy`] to every raw HTML node.
pub(crate) struct HtmlSanitizer<'a, 'd, 's> {
    config: &'a CompilerConfig,
    markers: &'a Preprocessed,
    diagnostics: &'d mut Diagnostics<'s>,
    /// Position of the HTML block being ingested.
    position: Position,
    depth: usize,
}

impl<'a, 'd, 's> HtmlSanitizer<'a, 'd, 's> {
    pub(crate) fn new(
        config: &'a CompilerConfig,
        markers: &'a Preprocessed,
        diagnostics: &'d mut Diagnostics<'s>,
    ) -> Self {
        Self {
            config,
            markers,
            diagnostics,
            position: Position::default(),
            depth: 0,
        }
    }

    fn elide(&mut self, raw: &str, position: Position) {
        self.diagnostics.push(
            DiagnosticKind::RawHtml,
            position,
            format!("raw HTML `{}` removed", summary(raw)),
        );
    }

    fn disallow(&mut self, message: String) {
        self.diagnostics
            .push(DiagnosticKind::DisallowedHtml, self.position, message);
    }

    fn sanitize_block(&mut self, raw: &str, position: Position) -> Vec<Block> {
        if is_comment_only(raw) {
            return Vec::new();
        }
        match self.config.html_policy() {
            HtmlPolicy::Elide => {
                self.elide(raw, position);
                Vec::new()
            }
            HtmlPolicy::Ingest => {
                let blocks = self.ingest(raw, position);
                // Text re-parsed as Markdown may carry raw inline HTML again.
                self.fold_blocks(blocks)
            }
        }
    }

    fn ingest(&mut self, raw: &str, position: Position) -> Vec<Block> {
        let Ok(dom) = tl::parse(raw, tl::ParserOptions::default()) else {
            self.elide(raw, position);
            return Vec::new();
        };
        tracing::debug!(line = position.line, "Ingesting raw HTML block");

        self.position = position;
        self.depth = 0;
        let parser = dom.parser();
        let handles: Vec<tl::NodeHandle> = dom.children().to_vec();
        self.blocks(&handles, parser)
    }

    fn blocks(&mut self, handles: &[tl::NodeHandle], parser: &tl::Parser<'_>) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut run: Vec<Inline> = Vec::new();

        for handle in handles {
            match self.node(*handle, parser, Context::Block) {
                Some(Converted::Blocks(converted)) => {
                    flush_run(&mut run, &mut blocks);
                    blocks.extend(converted);
                }
                Some(Converted::Inlines(converted)) => append(&mut run, converted),
                None => {}
            }
        }
        flush_run(&mut run, &mut blocks);
        blocks
    }

    fn inlines(&mut self, handles: &[tl::NodeHandle], parser: &tl::Parser<'_>) -> Vec<Inline> {
        let mut inlines = Vec::new();
        for handle in handles {
            match self.node(*handle, parser, Context::Inline) {
                Some(Converted::Inlines(converted)) => append(&mut inlines, converted),
                Some(Converted::Blocks(converted)) => {
                    let mut flattened = Vec::new();
                    for block in converted {
                        block_inlines(block, &mut flattened);
                    }
                    append(&mut inlines, flattened);
                }
                None => {}
            }
        }
        inlines
    }

    fn node(
        &mut self,
        handle: tl::NodeHandle,
        parser: &tl::Parser<'_>,
        context: Context,
    ) -> Option<Converted> {
        match handle.get(parser)? {
            tl::Node::Tag(tag) => {
                if self.depth >= self.config.max_depth() {
                    self.disallow(format!(
                        "HTML nested deeper than {} levels removed",
                        self.config.max_depth()
                    ));
                    return None;
                }
                self.depth += 1;
                let converted = self.element(tag, parser, context);
                self.depth -= 1;
                converted
            }
            tl::Node::Raw(bytes) => Some(Converted::Inlines(
                self.markdown_inlines(&bytes.as_utf8_str()),
            )),
            tl::Node::Comment(_) => None,
        }
    }

    #[allow(clippy::too_many_lines)]
    fn element(
        &mut self,
        tag: &tl::HTMLTag<'_>,
        parser: &tl::Parser<'_>,
        context: Context,
    ) -> Option<Converted> {
        let name = tag.name().as_utf8_str().to_ascii_lowercase();
        let children: Vec<tl::NodeHandle> = tag.children().top().iter().copied().collect();

        let converted = match name.as_str() {
            "p" => Converted::Blocks(drop_if_empty(Block::Paragraph(trim_inlines(
                self.inlines(&children, parser),
            )))),
            "div" | "section" | "li" => Converted::Blocks(self.blocks(&children, parser)),
            "blockquote" => Converted::Blocks(vec![Block::BlockQuote(self.blocks(&children, parser))]),
            "ul" | "ol" => {
                let start = (name == "ol").then(|| {
                    attribute(tag, "start")
                        .and_then(|start| start.trim().parse().ok())
                        .unwrap_or(1)
                });
                Converted::Blocks(vec![Block::List {
                    start,
                    tight: true,
                    items: self.list_items(&children, parser),
                }])
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse().unwrap_or(1);
                Converted::Blocks(vec![Block::Heading {
                    level,
                    children: trim_inlines(self.inlines(&children, parser)),
                }])
            }
            "pre" => Converted::Blocks(vec![self.preformatted(tag, parser)]),
            "hr" => Converted::Blocks(vec![Block::ThematicBreak]),
            "em" | "i" => Converted::Inlines(vec![Inline::Emphasis(self.inlines(&children, parser))]),
            "strong" | "b" => Converted::Inlines(vec![Inline::Strong(self.inlines(&children, parser))]),
            "del" | "s" => {
                Converted::Inlines(vec![Inline::Strikethrough(self.inlines(&children, parser))])
            }
            "code" => Converted::Inlines(vec![Inline::Code(decode_entities(
                &tag.inner_text(parser),
            ))]),
            "span" | "sup" => Converted::Inlines(self.inlines(&children, parser)),
            "br" => Converted::Inlines(vec![Inline::HardBreak]),
            "a" => {
                let children = self.inlines(&children, parser);
                match attribute(tag, "href") {
                    Some(url) if is_safe_url(&url) => Converted::Inlines(vec![Inline::Link {
                        url,
                        title: attribute(tag, "title"),
                        children,
                    }]),
                    Some(url) => {
                        self.disallow(format!("unsafe link target `{url}` removed"));
                        Converted::Inlines(children)
                    }
                    None => Converted::Inlines(children),
                }
            }
            "img" => match attribute(tag, "src") {
                Some(url) if is_safe_url(&url) => Converted::Inlines(vec![Inline::Image {
                    url,
                    title: attribute(tag, "title"),
                    alt: attribute(tag, "alt").unwrap_or_default(),
                }]),
                Some(url) => {
                    self.disallow(format!("unsafe image source `{url}` removed"));
                    return None;
                }
                None => return None,
            },
            name if DROPPED_ELEMENTS.contains(&name) => {
                self.disallow(format!("`<{name}>` element removed from raw HTML"));
                return None;
            }
            name => {
                self.disallow(format!("`<{name}>` tag removed from raw HTML, content kept"));
                match context {
                    Context::Block => Converted::Blocks(self.blocks(&children, parser)),
                    Context::Inline => Converted::Inlines(self.inlines(&children, parser)),
                }
            }
        };
        Some(converted)
    }

    fn list_items(&mut self, handles: &[tl::NodeHandle], parser: &tl::Parser<'_>) -> Vec<ListItem> {
        let mut items = Vec::new();
        for handle in handles {
            let Some(tl::Node::Tag(tag)) = handle.get(parser) else {
                continue;
            };
            if !tag.name().as_utf8_str().eq_ignore_ascii_case("li") {
                continue;
            }
            if let Some(Converted::Blocks(children)) = self.node(*handle, parser, Context::Block) {
                items.push(ListItem {
                    checked: None,
                    children,
                });
            }
        }
        items
    }

    fn preformatted(&self, tag: &tl::HTMLTag<'_>, parser: &tl::Parser<'_>) -> Block {
        let language = tag
            .children()
            .top()
            .iter()
            .find_map(|handle| match handle.get(parser) {
                Some(tl::Node::Tag(code)) if code.name().as_utf8_str().eq_ignore_ascii_case("code") => {
                    attribute(code, "class")
                }
                _ => None,
            })
            .and_then(|class| {
                class
                    .split_whitespace()
                    .find_map(|class| class.strip_prefix("language-").map(str::to_owned))
            })
            .map(|language| self.config.language_aliases().resolve(&language).to_owned());

        let text = decode_entities(&tag.inner_text(parser));
        Block::CodeBlock {
            language,
            title: None,
            code: text.strip_suffix('\n').unwrap_or(&text).to_owned(),
        }
    }

    /// Run an HTML text node through the Markdown inline parser.
    fn markdown_inlines(&mut self, raw: &str) -> Vec<Inline> {
        let collapsed = collapse_whitespace(raw);
        let trimmed = collapsed.trim();
        if trimmed.is_empty() {
            return if collapsed.is_empty() {
                Vec::new()
            } else {
                vec![Inline::text(" ")]
            };
        }

        let line_offset = self.position.line.saturating_sub(1);
        let blocks = match parse_fragment(
            trimmed,
            self.markers,
            line_offset,
            self.config,
            self.diagnostics,
        ) {
            Ok(blocks) => blocks,
            Err(err) => {
                self.disallow(format!("HTML text removed: {err}"));
                return Vec::new();
            }
        };

        let mut parsed = Vec::new();
        for block in blocks {
            block_inlines(block, &mut parsed);
        }
        let mut inlines = Vec::new();
        if collapsed.starts_with(' ') {
            inlines.push(Inline::text(" "));
        }
        append(&mut inlines, parsed);
        if collapsed.ends_with(' ') {
            append(&mut inlines, [Inline::text(" ")]);
        }
        inlines
    }
}

/// Attribute value with character references decoded.
fn attribute(tag: &tl::HTMLTag<'_>, name: &str) -> Option<String> {
    tag.attributes()
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value)
        .map(|value| decode_entities(&value))
}

/// Append inlines, merging adjacent text.
fn append(out: &mut Vec<Inline>, inlines: impl IntoIterator<Item = Inline>) {
    for inline in inlines {
        if let Inline::Text(text) = &inline
            && let Some(Inline::Text(last)) = out.last_mut()
        {
            last.push_str(text);
            continue;
        }
        out.push(inline);
    }
}

/// Strip whitespace-only text at both ends.
fn trim_inlines(mut inlines: Vec<Inline>) -> Vec<Inline> {
    let blank = |inline: &Inline| matches!(inline, Inline::Text(text) if text.trim().is_empty());
    while inlines.last().is_some_and(blank) {
        inlines.pop();
    }
    let leading = inlines.iter().take_while(|inline| blank(inline)).count();
    inlines.drain(..leading);
    inlines
}

/// Close an inline run into a paragraph unless it is blank.
fn flush_run(run: &mut Vec<Inline>, blocks: &mut Vec<Block>) {
    let inlines = trim_inlines(std::mem::take(run));
    if !inlines.is_empty() {
        blocks.push(Block::Paragraph(inlines));
    }
}

impl Fold for HtmlSanitizer<'_, '_, '_> {
    fn fold_block(&mut self, block: Block) -> Vec<Block> {
        match block {
            Block::Html { raw, position } => self.sanitize_block(&raw, position),
            other => drop_if_empty(walk_block(self, other)),
        }
    }

    fn fold_inline(&mut self, inline: Inline) -> Vec<Inline> {
        match inline {
            Inline::Html { raw, position } => {
                if self.config.html_policy() == HtmlPolicy::Ingest && is_line_break(&raw) {
                    return vec![Inline::HardBreak];
                }
                if !is_comment_only(&raw) && !is_closing_tag(&raw) {
                    self.elide(&raw, position);
                }
                Vec::new()
            }
            other => vec![walk_inline(self, other)],
        }
    }
}
