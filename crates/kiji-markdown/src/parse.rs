//! Tree builder: pulldown-cmark events to the pre-resolution tree.
//!
//! Events are folded into nodes with an explicit frame stack, so input
//! nesting never turns into native recursion here. The stack depth is
//! capped by [`CompilerConfig::max_depth`].

use std::iter::Peekable;
use std::ops::Range;
use std::vec;

use pulldown_cmark::{
    BrokenLink, CodeBlockKind, CowStr, Event, HeadingLevel, LinkType, Options, Parser, Tag,
    TagEnd,
};

use crate::ast::{
    AlertKind, Alignment, Block, Directive, DirectiveKind, Inline, ListItem, Position, plain_text,
};
use crate::code::{FenceInfo, parse_fence_info};
use crate::compiler::CompilerConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::directive::DirectiveArgs;
use crate::directive::preprocess::{
    Marker, PendingDirective, Preprocessed, TEXT_MARKER_CLOSE, TEXT_MARKER_OPEN,
};
use crate::error::CompileError;

/// Parser extensions used for post bodies.
///
/// Old-style footnotes turn every `[^id]` into a reference event, defined
/// or not, so undefined ones reach the resolver instead of staying text.
pub(crate) fn parser_options(gfm_alerts: bool) -> Options {
    let mut options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_OLD_FOOTNOTES
        | Options::ENABLE_MATH;
    if gfm_alerts {
        options |= Options::ENABLE_GFM;
    }
    options
}

/// Parse preprocessed Markdown into blocks.
///
/// `line_offset` is the number of source lines before the body (front matter),
/// added to every position.
pub(crate) fn parse_blocks(
    pre: &Preprocessed,
    line_offset: usize,
    config: &CompilerConfig,
    diagnostics: &mut Diagnostics<'_>,
) -> Result<Vec<Block>, CompileError> {
    let options = parser_options(config.gfm_alerts());
    parse_text(&pre.text, options, pre, line_offset, config, diagnostics)
}

/// Parse a text fragment cut out of the body (HTML text content).
///
/// The fragment cannot see the body's footnote definitions; its `[^id]`
/// references are checked against them during resolution.
pub(crate) fn parse_fragment(
    text: &str,
    pre: &Preprocessed,
    line_offset: usize,
    config: &CompilerConfig,
    diagnostics: &mut Diagnostics<'_>,
) -> Result<Vec<Block>, CompileError> {
    let options = parser_options(config.gfm_alerts());
    parse_text(text, options, pre, line_offset, config, diagnostics)
}

/// Parse Markdown whose directive markers refer to `pre`.
fn parse_text(
    text: &str,
    options: Options,
    pre: &Preprocessed,
    line_offset: usize,
    config: &CompilerConfig,
    diagnostics: &mut Diagnostics<'_>,
) -> Result<Vec<Block>, CompileError> {
    let lines = LineIndex::new(text, line_offset);
    let parser = Parser::new_with_broken_link_callback(text, options, Some(keep_reference));

    let mut definitions: Vec<(usize, Block)> = parser
        .reference_definitions()
        .iter()
        .map(|(label, def)| {
            let block = Block::Definition {
                identifier: label.to_owned(),
                url: def.dest.to_string(),
                title: def.title.as_ref().map(ToString::to_string),
                position: lines.position(def.span.start),
            };
            (def.span.start, block)
        })
        .collect();
    definitions.sort_by_key(|(start, _)| *start);

    let mut builder = TreeBuilder {
        pre,
        lines,
        config,
        diagnostics,
        definitions: definitions.into_iter().peekable(),
        root: Frame::new(FrameKind::Root),
        stack: Vec::new(),
    };
    for (event, range) in parser.into_offset_iter() {
        builder.event(event, range)?;
    }
    builder.finish()
}

/// Keep undefined full and collapsed references as reference nodes.
///
/// Shortcut references (`[word]`) without a definition stay literal text.
fn keep_reference<'a>(link: BrokenLink<'a>) -> Option<(CowStr<'a>, CowStr<'a>)> {
    matches!(link.link_type, LinkType::Reference | LinkType::Collapsed)
        .then_some((CowStr::Borrowed(""), CowStr::Borrowed("")))
}

fn is_reference(link_type: LinkType) -> bool {
    matches!(
        link_type,
        LinkType::Reference
            | LinkType::ReferenceUnknown
            | LinkType::Collapsed
            | LinkType::CollapsedUnknown
            | LinkType::Shortcut
            | LinkType::ShortcutUnknown
    )
}

fn link_url(link_type: LinkType, dest_url: CowStr<'_>) -> String {
    if link_type == LinkType::Email {
        format!("mailto:{dest_url}")
    } else {
        dest_url.into_string()
    }
}

fn non_empty(s: CowStr<'_>) -> Option<String> {
    (!s.is_empty()).then(|| s.into_string())
}

fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Byte offset to line/column conversion.
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
    line_offset: usize,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str, line_offset: usize) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            text,
            starts,
            line_offset,
        }
    }

    fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = self.starts.partition_point(|&start| start <= offset);
        let start = self.starts.get(line.saturating_sub(1)).copied().unwrap_or(0);
        let column = self
            .text
            .get(start..offset)
            .map_or(0, |prefix| prefix.chars().count());
        Position::new(line + self.line_offset, column + 1)
    }

    /// Shift a body-relative position to a source position.
    fn shift(&self, position: Position) -> Position {
        Position::new(position.line + self.line_offset, position.column)
    }
}

#[derive(Debug)]
enum FrameKind {
    Root,
    Paragraph,
    Heading(u8),
    BlockQuote(Option<AlertKind>),
    CodeBlock {
        info: FenceInfo,
        code: String,
    },
    HtmlBlock {
        raw: String,
        position: Position,
    },
    List {
        start: Option<u64>,
        loose: bool,
        items: Vec<ListItem>,
    },
    Item {
        checked: Option<bool>,
        loose: bool,
    },
    FootnoteDefinition {
        identifier: String,
        position: Position,
    },
    Table {
        alignments: Vec<Alignment>,
        head: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    TableRow {
        cells: Vec<Vec<Inline>>,
    },
    TableCell,
    Emphasis,
    Strong,
    Strikethrough,
    Link {
        url: String,
        title: Option<String>,
    },
    LinkReference {
        identifier: String,
        position: Position,
    },
    Image {
        url: String,
        title: Option<String>,
    },
    ImageReference {
        identifier: String,
        position: Position,
    },
    /// Extension tags without a node of their own; children are spliced
    /// into the parent.
    Transparent,
    Directive {
        name: String,
        args: DirectiveArgs,
        position: Position,
    },
}

impl FrameKind {
    /// Frames that start a new block in their parent.
    fn is_block(&self) -> bool {
        matches!(
            self,
            FrameKind::Paragraph
                | FrameKind::Heading(_)
                | FrameKind::BlockQuote(_)
                | FrameKind::CodeBlock { .. }
                | FrameKind::HtmlBlock { .. }
                | FrameKind::List { .. }
                | FrameKind::FootnoteDefinition { .. }
                | FrameKind::Table { .. }
                | FrameKind::Directive { .. }
        )
    }

    /// Frames whose children are blocks.
    fn is_block_container(&self) -> bool {
        matches!(
            self,
            FrameKind::Root
                | FrameKind::BlockQuote(_)
                | FrameKind::Item { .. }
                | FrameKind::FootnoteDefinition { .. }
                | FrameKind::Directive { .. }
        )
    }
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    blocks: Vec<Block>,
    inlines: Vec<Inline>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            blocks: Vec::new(),
            inlines: Vec::new(),
        }
    }

    /// Wrap loose inline content (tight list items) in a paragraph.
    fn flush_inlines(&mut self) {
        if !self.inlines.is_empty() {
            let inlines = std::mem::take(&mut self.inlines);
            self.blocks.push(Block::Paragraph(inlines));
        }
    }
}

fn into_blocks(mut blocks: Vec<Block>, inlines: Vec<Inline>) -> Vec<Block> {
    if !inlines.is_empty() {
        blocks.push(Block::Paragraph(inlines));
    }
    blocks
}

/// A paragraph holding nothing but display math is a math block.
fn paragraph(inlines: Vec<Inline>) -> Block {
    match <[Inline; 1]>::try_from(inlines) {
        Ok([Inline::Math {
            expr,
            display: true,
        }]) => Block::Math(expr),
        Ok([other]) => Block::Paragraph(vec![other]),
        Err(inlines) => Block::Paragraph(inlines),
    }
}

struct TreeBuilder<'a, 'd, 's> {
    pre: &'a Preprocessed,
    lines: LineIndex<'a>,
    config: &'a CompilerConfig,
    diagnostics: &'d mut Diagnostics<'s>,
    /// Link reference definitions not yet placed, by source offset.
    definitions: Peekable<vec::IntoIter<(usize, Block)>>,
    root: Frame,
    stack: Vec<Frame>,
}

impl TreeBuilder<'_, '_, '_> {
    fn top(&self) -> &Frame {
        self.stack.last().unwrap_or(&self.root)
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.stack.last_mut().unwrap_or(&mut self.root)
    }

    fn push_frame(&mut self, kind: FrameKind, line: usize) -> Result<(), CompileError> {
        let limit = self.config.max_depth();
        if self.stack.len() >= limit {
            return Err(CompileError::NestingTooDeep {
                source_id: self.diagnostics.source().to_owned(),
                line,
                limit,
            });
        }
        if kind.is_block() {
            let top = self.top_mut();
            if top.kind.is_block_container() {
                top.flush_inlines();
            }
        }
        self.stack.push(Frame::new(kind));
        Ok(())
    }

    fn pop(&mut self) -> Result<Frame, CompileError> {
        self.stack
            .pop()
            .ok_or_else(|| CompileError::Invariant("end event without an open node".to_owned()))
    }

    fn push_block(&mut self, block: Block) {
        let top = self.top_mut();
        top.flush_inlines();
        top.blocks.push(block);
    }

    fn push_inline(&mut self, inline: Inline) {
        self.top_mut().inlines.push(inline);
    }

    /// Append text, merging with a preceding text node.
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let inlines = &mut self.top_mut().inlines;
        if let Some(Inline::Text(last)) = inlines.last_mut() {
            last.push_str(text);
        } else {
            inlines.push(Inline::text(text));
        }
    }

    /// Place definitions that start before `boundary` into the current
    /// block container.
    fn place_definitions(&mut self, boundary: usize) {
        while self.top().kind.is_block_container()
            && let Some((_, definition)) = self
                .definitions
                .next_if(|(start, _)| *start < boundary)
        {
            self.push_block(definition);
        }
    }

    fn event(&mut self, event: Event<'_>, range: Range<usize>) -> Result<(), CompileError> {
        let boundary = if matches!(event, Event::End(_)) {
            range.end
        } else {
            range.start
        };
        self.place_definitions(boundary);

        match event {
            Event::Start(tag) => self.start(tag, range.start)?,
            Event::End(tag) => self.end(tag)?,
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.push_inline(Inline::Code(code.into_string())),
            Event::InlineMath(expr) => self.push_inline(Inline::Math {
                expr: expr.into_string(),
                display: false,
            }),
            Event::DisplayMath(expr) => self.push_inline(Inline::Math {
                expr: expr.into_string(),
                display: true,
            }),
            Event::Html(html) | Event::InlineHtml(html) => {
                if let FrameKind::HtmlBlock { raw, .. } = &mut self.top_mut().kind {
                    raw.push_str(&html);
                } else {
                    let position = self.lines.position(range.start);
                    self.push_inline(Inline::Html {
                        raw: html.into_string(),
                        position,
                    });
                }
            }
            Event::FootnoteReference(label) => {
                let position = self.lines.position(range.start);
                self.push_inline(Inline::FootnoteReference {
                    identifier: label.into_string(),
                    position,
                });
            }
            Event::SoftBreak => self.push_inline(Inline::SoftBreak),
            Event::HardBreak => self.push_inline(Inline::HardBreak),
            Event::Rule => self.push_block(Block::ThematicBreak),
            Event::TaskListMarker(checked) => self.task_list_marker(checked),
        }
        Ok(())
    }

    fn start(&mut self, tag: Tag<'_>, offset: usize) -> Result<(), CompileError> {
        let position = self.lines.position(offset);
        let kind = match tag {
            Tag::Paragraph => {
                if let FrameKind::Item { loose, .. } = &mut self.top_mut().kind {
                    *loose = true;
                }
                FrameKind::Paragraph
            }
            Tag::Heading { level, .. } => FrameKind::Heading(heading_level_to_num(level)),
            Tag::BlockQuote(kind) => FrameKind::BlockQuote(kind.map(AlertKind::from)),
            Tag::CodeBlock(kind) => FrameKind::CodeBlock {
                info: match kind {
                    CodeBlockKind::Fenced(info) => parse_fence_info(&info),
                    CodeBlockKind::Indented => FenceInfo::default(),
                },
                code: String::new(),
            },
            Tag::HtmlBlock => FrameKind::HtmlBlock {
                raw: String::new(),
                position,
            },
            Tag::List(start) => FrameKind::List {
                start,
                loose: false,
                items: Vec::new(),
            },
            Tag::Item => FrameKind::Item {
                checked: None,
                loose: false,
            },
            Tag::FootnoteDefinition(label) => FrameKind::FootnoteDefinition {
                identifier: label.into_string(),
                position,
            },
            Tag::Table(alignments) => FrameKind::Table {
                alignments: alignments.into_iter().map(Alignment::from).collect(),
                head: Vec::new(),
                rows: Vec::new(),
            },
            Tag::TableHead | Tag::TableRow => FrameKind::TableRow { cells: Vec::new() },
            Tag::TableCell => FrameKind::TableCell,
            Tag::Emphasis => FrameKind::Emphasis,
            Tag::Strong => FrameKind::Strong,
            Tag::Strikethrough => FrameKind::Strikethrough,
            Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            } => {
                if is_reference(link_type) {
                    FrameKind::LinkReference {
                        identifier: id.into_string(),
                        position,
                    }
                } else {
                    FrameKind::Link {
                        url: link_url(link_type, dest_url),
                        title: non_empty(title),
                    }
                }
            }
            Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            } => {
                if is_reference(link_type) {
                    FrameKind::ImageReference {
                        identifier: id.into_string(),
                        position,
                    }
                } else {
                    FrameKind::Image {
                        url: dest_url.into_string(),
                        title: non_empty(title),
                    }
                }
            }
            Tag::Superscript
            | Tag::Subscript
            | Tag::DefinitionList
            | Tag::DefinitionListTitle
            | Tag::DefinitionListDefinition
            | Tag::MetadataBlock(_) => FrameKind::Transparent,
        };
        self.push_frame(kind, position.line)
    }

    fn end(&mut self, tag: TagEnd) -> Result<(), CompileError> {
        self.close_open_directives();
        let Frame {
            kind,
            blocks,
            inlines,
        } = self.pop()?;

        match kind {
            FrameKind::Paragraph => self.push_block(paragraph(inlines)),
            FrameKind::Heading(level) => self.push_block(Block::Heading {
                level,
                children: inlines,
            }),
            FrameKind::BlockQuote(alert) => {
                let children = into_blocks(blocks, inlines);
                self.push_block(match alert {
                    Some(kind) => Block::Alert {
                        kind,
                        title: None,
                        children,
                    },
                    None => Block::BlockQuote(children),
                });
            }
            FrameKind::CodeBlock { info, code } => {
                let block = self.code_block(info, code);
                self.push_block(block);
            }
            FrameKind::HtmlBlock { raw, position } => self.html_block(raw, position)?,
            FrameKind::List {
                start,
                loose,
                items,
            } => self.push_block(Block::List {
                start,
                tight: !loose,
                items,
            }),
            FrameKind::Item { checked, loose } => {
                let children = into_blocks(blocks, inlines);
                let FrameKind::List {
                    items,
                    loose: list_loose,
                    ..
                } = &mut self.top_mut().kind
                else {
                    return Err(CompileError::Invariant(
                        "list item outside of a list".to_owned(),
                    ));
                };
                items.push(ListItem { checked, children });
                *list_loose |= loose;
            }
            FrameKind::FootnoteDefinition {
                identifier,
                position,
            } => self.push_block(Block::FootnoteDefinition {
                identifier,
                children: into_blocks(blocks, inlines),
                position,
            }),
            FrameKind::Table {
                alignments,
                head,
                rows,
            } => self.push_block(Block::Table {
                alignments,
                head,
                rows,
            }),
            FrameKind::TableRow { cells } => {
                let FrameKind::Table { head, rows, .. } = &mut self.top_mut().kind else {
                    return Err(CompileError::Invariant(
                        "table row outside of a table".to_owned(),
                    ));
                };
                if tag == TagEnd::TableHead {
                    *head = cells;
                } else {
                    rows.push(cells);
                }
            }
            FrameKind::TableCell => {
                let FrameKind::TableRow { cells } = &mut self.top_mut().kind else {
                    return Err(CompileError::Invariant(
                        "table cell outside of a table row".to_owned(),
                    ));
                };
                cells.push(inlines);
            }
            FrameKind::Emphasis => self.push_inline(Inline::Emphasis(inlines)),
            FrameKind::Strong => self.push_inline(Inline::Strong(inlines)),
            FrameKind::Strikethrough => self.push_inline(Inline::Strikethrough(inlines)),
            FrameKind::Link { url, title } => self.push_inline(Inline::Link {
                url,
                title,
                children: inlines,
            }),
            FrameKind::LinkReference {
                identifier,
                position,
            } => self.push_inline(Inline::LinkReference {
                identifier,
                children: inlines,
                position,
            }),
            FrameKind::Image { url, title } => self.push_inline(Inline::Image {
                url,
                title,
                alt: plain_text(&inlines),
            }),
            FrameKind::ImageReference {
                identifier,
                position,
            } => self.push_inline(Inline::ImageReference {
                identifier,
                alt: plain_text(&inlines),
                position,
            }),
            FrameKind::Transparent => {
                for block in blocks {
                    self.push_block(block);
                }
                self.top_mut().inlines.extend(inlines);
            }
            FrameKind::Root | FrameKind::Directive { .. } => {
                return Err(CompileError::Invariant(format!(
                    "unexpected end of {tag:?} while building the tree"
                )));
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        match &mut self.top_mut().kind {
            FrameKind::CodeBlock { code, .. } => {
                code.push_str(text);
                return;
            }
            FrameKind::HtmlBlock { raw, .. } => {
                raw.push_str(text);
                return;
            }
            _ => {}
        }

        let pre = self.pre;
        let mut rest = text;
        while let Some(open) = rest.find(TEXT_MARKER_OPEN) {
            let after = &rest[open + TEXT_MARKER_OPEN.len_utf8()..];
            let Some(close) = after.find(TEXT_MARKER_CLOSE) else {
                break;
            };
            let Some(pending) = pre.text_marker(&after[..close]) else {
                // Not ours: keep the character and scan on.
                self.push_text(&rest[..open + TEXT_MARKER_OPEN.len_utf8()]);
                rest = after;
                continue;
            };
            self.push_text(&rest[..open]);
            if let Some(directive) = self.directive(DirectiveKind::Text, pending) {
                self.push_inline(Inline::Directive(directive));
            }
            rest = &after[close + TEXT_MARKER_CLOSE.len_utf8()..];
        }
        self.push_text(rest);
    }

    fn task_list_marker(&mut self, value: bool) {
        let item = self.stack.iter_mut().rev().find_map(|frame| match &mut frame.kind {
            FrameKind::Item { checked, .. } => Some(checked),
            _ => None,
        });
        if let Some(checked) = item {
            *checked = Some(value);
        }
    }

    fn code_block(&self, info: FenceInfo, mut code: String) -> Block {
        if code.ends_with('\n') {
            code.pop();
        }
        match info.language.as_deref() {
            Some("math") => Block::Math(code),
            language => Block::CodeBlock {
                language: language
                    .map(|language| self.config.language_aliases().resolve(language).to_owned()),
                title: info.title,
                code,
            },
        }
    }

    /// Build a directive node from a marker.
    fn directive(&self, kind: DirectiveKind, pending: &PendingDirective) -> Option<Directive> {
        let (name, args) = match &pending.marker {
            Marker::Open { name, args } | Marker::Leaf { name, args } | Marker::Text { name, args } => {
                (name, args)
            }
            Marker::Close => return None,
        };
        Some(Directive {
            kind,
            name: name.clone(),
            args: args.clone(),
            children: Vec::new(),
            position: self.lines.shift(pending.position),
        })
    }

    fn html_block(&mut self, raw: String, position: Position) -> Result<(), CompileError> {
        let pre = self.pre;
        let Some(pending) = pre.block_marker(&raw) else {
            self.push_block(Block::Html { raw, position });
            return Ok(());
        };

        match &pending.marker {
            Marker::Open { name, args } => {
                let position = self.lines.shift(pending.position);
                self.push_frame(
                    FrameKind::Directive {
                        name: name.clone(),
                        args: args.clone(),
                        position,
                    },
                    position.line,
                )?;
            }
            Marker::Close => {
                if matches!(self.top().kind, FrameKind::Directive { .. }) {
                    self.close_directive();
                } else {
                    self.diagnostics.push(
                        DiagnosticKind::StrayDirectiveClose,
                        self.lines.shift(pending.position),
                        "`:::` without an open directive ignored",
                    );
                }
            }
            Marker::Leaf { .. } => {
                if let Some(directive) = self.directive(DirectiveKind::Leaf, pending) {
                    self.push_block(Block::Directive(directive));
                }
            }
            Marker::Text { .. } => self.push_block(Block::Html { raw, position }),
        }
        Ok(())
    }

    /// Close the container directive on top of the stack.
    fn close_directive(&mut self) {
        let Some(Frame {
            kind:
                FrameKind::Directive {
                    name,
                    args,
                    position,
                },
            blocks,
            inlines,
        }) = self.stack.pop_if(|frame| matches!(frame.kind, FrameKind::Directive { .. }))
        else {
            return;
        };
        self.push_block(Block::Directive(Directive {
            kind: DirectiveKind::Container,
            name,
            args,
            children: into_blocks(blocks, inlines),
            position,
        }));
    }

    /// Close container directives left open when their parent ends.
    fn close_open_directives(&mut self) {
        while let FrameKind::Directive { name, position, .. } = &self.top().kind {
            let message = format!("directive `{name}` is never closed");
            let position = *position;
            self.diagnostics
                .push(DiagnosticKind::UnclosedDirective, position, message);
            self.close_directive();
        }
    }

    fn finish(mut self) -> Result<Vec<Block>, CompileError> {
        self.place_definitions(usize::MAX);
        self.close_open_directives();
        if !self.stack.is_empty() {
            return Err(CompileError::Invariant(format!(
                "{} node(s) left open at end of input",
                self.stack.len()
            )));
        }
        let Frame {
            kind: FrameKind::Root,
            blocks,
            inlines,
        } = self.root
        else {
            return Err(CompileError::Invariant(
                "document root is not a root node".to_owned(),
            ));
        };
        Ok(into_blocks(blocks, inlines))
    }
}
