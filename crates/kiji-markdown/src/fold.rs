//! Tree traversal for compile passes.
//!
//! Each pass is a [`Fold`]: it consumes a tree and rebuilds it bottom-up,
//! returning zero or more nodes in place of each input node. Passes only
//! override the hooks for node kinds they care about; the `walk_*` functions
//! rebuild everything else unchanged.
//!
//! Recursion depth is bounded by the nesting limit the tree builder enforces.

use crate::ast::{Block, Directive, Inline, ListItem};

pub(crate) trait Fold {
    fn fold_blocks(&mut self, blocks: Vec<Block>) -> Vec<Block> {
        blocks
            .into_iter()
            .flat_map(|block| self.fold_block(block))
            .collect()
    }

    fn fold_block(&mut self, block: Block) -> Vec<Block> {
        vec![walk_block(self, block)]
    }

    fn fold_inlines(&mut self, inlines: Vec<Inline>) -> Vec<Inline> {
        inlines
            .into_iter()
            .flat_map(|inline| self.fold_inline(inline))
            .collect()
    }

    fn fold_inline(&mut self, inline: Inline) -> Vec<Inline> {
        vec![walk_inline(self, inline)]
    }
}

/// Rebuild a block with folded children.
pub(crate) fn walk_block<F: Fold + ?Sized>(f: &mut F, block: Block) -> Block {
    match block {
        Block::Paragraph(children) => Block::Paragraph(f.fold_inlines(children)),
        Block::Heading { level, children } => Block::Heading {
            level,
            children: f.fold_inlines(children),
        },
        Block::BlockQuote(children) => Block::BlockQuote(f.fold_blocks(children)),
        Block::List { start, tight, items } => Block::List {
            start,
            tight,
            items: items
                .into_iter()
                .map(|item| ListItem {
                    checked: item.checked,
                    children: f.fold_blocks(item.children),
                })
                .collect(),
        },
        Block::Table {
            alignments,
            head,
            rows,
        } => Block::Table {
            alignments,
            head: head.into_iter().map(|cell| f.fold_inlines(cell)).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|cell| f.fold_inlines(cell)).collect())
                .collect(),
        },
        Block::Alert {
            kind,
            title,
            children,
        } => Block::Alert {
            kind,
            title,
            children: f.fold_blocks(children),
        },
        Block::Directive(directive) => Block::Directive(walk_directive(f, directive)),
        Block::FootnoteDefinition {
            identifier,
            children,
            position,
        } => Block::FootnoteDefinition {
            identifier,
            children: f.fold_blocks(children),
            position,
        },
        leaf @ (Block::CodeBlock { .. }
        | Block::Math(_)
        | Block::ThematicBreak
        | Block::Definition { .. }
        | Block::Html { .. }) => leaf,
    }
}

/// Rebuild an inline with folded children.
pub(crate) fn walk_inline<F: Fold + ?Sized>(f: &mut F, inline: Inline) -> Inline {
    match inline {
        Inline::Emphasis(children) => Inline::Emphasis(f.fold_inlines(children)),
        Inline::Strong(children) => Inline::Strong(f.fold_inlines(children)),
        Inline::Strikethrough(children) => Inline::Strikethrough(f.fold_inlines(children)),
        Inline::Link {
            url,
            title,
            children,
        } => Inline::Link {
            url,
            title,
            children: f.fold_inlines(children),
        },
        Inline::LinkReference {
            identifier,
            children,
            position,
        } => Inline::LinkReference {
            identifier,
            children: f.fold_inlines(children),
            position,
        },
        Inline::Directive(directive) => Inline::Directive(walk_directive(f, directive)),
        leaf @ (Inline::Text(_)
        | Inline::Code(_)
        | Inline::Math { .. }
        | Inline::Image { .. }
        | Inline::FootnoteRef { .. }
        | Inline::SoftBreak
        | Inline::HardBreak
        | Inline::ImageReference { .. }
        | Inline::FootnoteReference { .. }
        | Inline::Html { .. }) => leaf,
    }
}

fn walk_directive<F: Fold + ?Sized>(f: &mut F, directive: Directive) -> Directive {
    Directive {
        children: f.fold_blocks(directive.children),
        ..directive
    }
}

/// Drop paragraphs left without content by a pass.
pub(crate) fn drop_if_empty(block: Block) -> Vec<Block> {
    match block {
        Block::Paragraph(children) if children.is_empty() => Vec::new(),
        block => vec![block],
    }
}

/// Read-only traversal in document order.
pub(crate) trait Visit {
    fn visit_block(&mut self, block: &Block) {
        visit_block_children(self, block);
    }

    fn visit_inline(&mut self, inline: &Inline) {
        visit_inline_children(self, inline);
    }
}

pub(crate) fn visit_blocks<V: Visit + ?Sized>(v: &mut V, blocks: &[Block]) {
    for block in blocks {
        v.visit_block(block);
    }
}

fn visit_inlines<V: Visit + ?Sized>(v: &mut V, inlines: &[Inline]) {
    for inline in inlines {
        v.visit_inline(inline);
    }
}

pub(crate) fn visit_block_children<V: Visit + ?Sized>(v: &mut V, block: &Block) {
    match block {
        Block::Paragraph(children) | Block::Heading { children, .. } => visit_inlines(v, children),
        Block::BlockQuote(children)
        | Block::Alert { children, .. }
        | Block::FootnoteDefinition { children, .. } => visit_blocks(v, children),
        Block::List { items, .. } => {
            for item in items {
                visit_blocks(v, &item.children);
            }
        }
        Block::Table { head, rows, .. } => {
            for cell in head.iter().chain(rows.iter().flatten()) {
                visit_inlines(v, cell);
            }
        }
        Block::Directive(directive) => visit_blocks(v, &directive.children),
        Block::CodeBlock { .. }
        | Block::Math(_)
        | Block::ThematicBreak
        | Block::Definition { .. }
        | Block::Html { .. } => {}
    }
}

pub(crate) fn visit_inline_children<V: Visit + ?Sized>(v: &mut V, inline: &Inline) {
    match inline {
        Inline::Emphasis(children)
        | Inline::Strong(children)
        | Inline::Strikethrough(children)
        | Inline::Link { children, .. }
        | Inline::LinkReference { children, .. } => visit_inlines(v, children),
        Inline::Directive(directive) => visit_blocks(v, &directive.children),
        Inline::Text(_)
        | Inline::Code(_)
        | Inline::Math { .. }
        | Inline::Image { .. }
        | Inline::FootnoteRef { .. }
        | Inline::SoftBreak
        | Inline::HardBreak
        | Inline::ImageReference { .. }
        | Inline::FootnoteReference { .. }
        | Inline::Html { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// Uppercases text and removes code spans.
    struct Shout;

    impl Fold for Shout {
        fn fold_inline(&mut self, inline: Inline) -> Vec<Inline> {
            match inline {
                Inline::Text(text) => vec![Inline::Text(text.to_uppercase())],
                Inline::Code(_) => Vec::new(),
                other => vec![walk_inline(self, other)],
            }
        }
    }

    #[test]
    fn test_fold_reaches_nested_inlines() {
        let blocks = vec![Block::BlockQuote(vec![Block::List {
            start: None,
            tight: true,
            items: vec![ListItem {
                checked: None,
                children: vec![Block::Paragraph(vec![
                    Inline::Emphasis(vec![Inline::text("hi")]),
                    Inline::Code("x".to_owned()),
                ])],
            }],
        }])];

        let expected = vec![Block::BlockQuote(vec![Block::List {
            start: None,
            tight: true,
            items: vec![ListItem {
                checked: None,
                children: vec![Block::Paragraph(vec![Inline::Emphasis(vec![
                    Inline::text("HI"),
                ])])],
            }],
        }])];

        assert_eq!(Shout.fold_blocks(blocks), expected);
    }

    #[test]
    fn test_drop_if_empty() {
        assert!(drop_if_empty(Block::Paragraph(Vec::new())).is_empty());
        assert_eq!(drop_if_empty(Block::ThematicBreak), vec![Block::ThematicBreak]);
    }

    struct CountText(usize);

    impl Visit for CountText {
        fn visit_inline(&mut self, inline: &Inline) {
            if matches!(inline, Inline::Text(_)) {
                self.0 += 1;
            }
            visit_inline_children(self, inline);
        }
    }

    #[test]
    fn test_visit_walks_tables_and_directives() {
        let blocks = vec![
            Block::Table {
                alignments: vec![],
                head: vec![vec![Inline::text("h")]],
                rows: vec![vec![vec![Inline::Strong(vec![Inline::text("c")])]]],
            },
            Block::Directive(Directive {
                kind: crate::ast::DirectiveKind::Container,
                name: "note".to_owned(),
                args: crate::directive::DirectiveArgs::default(),
                children: vec![Block::Paragraph(vec![Inline::text("d")])],
                position: crate::ast::Position::new(1, 1),
            }),
        ];

        let mut counter = CountText(0);
        visit_blocks(&mut counter, &blocks);
        assert_eq!(counter.0, 3);
    }
}
