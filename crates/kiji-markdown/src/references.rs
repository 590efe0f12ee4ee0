//! Link, image and footnote reference resolution.
//!
//! Runs in three steps so forward references resolve:
//!
//! 1. **Collect**: definitions and footnote definitions are cut out of the
//!    tree into first-wins tables keyed by [`normalize_identifier`].
//! 2. **Order**: footnotes are labeled by first reference, scanning the body
//!    and then the bodies of footnotes already labeled.
//! 3. **Rewrite**: reference nodes become links, images and footnote
//!    references, or are dropped with a diagnostic.
//!
//! Running the pass on a tree without reference nodes changes nothing.

use std::collections::{HashMap, HashSet};

use crate::ast::{Block, Document, Footnote, Inline, Position};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::fold::{
    Fold, Visit, drop_if_empty, visit_blocks, visit_inline_children, walk_block, walk_inline,
};
use crate::normalize::{footnote_anchor, normalize_identifier};

#[derive(Debug)]
struct LinkTarget {
    url: String,
    title: Option<String>,
}

#[derive(Debug)]
struct FootnoteBody {
    children: Vec<Block>,
}

/// Removes definitions from the tree and records them.
struct Collector<'d, 's> {
    definitions: HashMap<String, LinkTarget>,
    footnotes: HashMap<String, FootnoteBody>,
    diagnostics: &'d mut Diagnostics<'s>,
}

impl Collector<'_, '_> {
    fn duplicate(&mut self, what: &str, identifier: &str, position: Position) {
        self.diagnostics.push(
            DiagnosticKind::DuplicateDefinition,
            position,
            format!("duplicate {what} `{identifier}` ignored, the first one wins"),
        );
    }
}

impl Fold for Collector<'_, '_> {
    fn fold_block(&mut self, block: Block) -> Vec<Block> {
        match block {
            Block::Definition {
                identifier,
                url,
                title,
                position,
            } => {
                let key = normalize_identifier(&identifier);
                if self.definitions.contains_key(&key) {
                    self.duplicate("definition", &identifier, position);
                } else {
                    self.definitions.insert(key, LinkTarget { url, title });
                }
                Vec::new()
            }
            Block::FootnoteDefinition {
                identifier,
                children,
                position,
            } => {
                // Definitions nested in the footnote body count as well.
                let children = self.fold_blocks(children);
                let key = normalize_identifier(&identifier);
                if self.footnotes.contains_key(&key) {
                    self.duplicate("footnote definition", &identifier, position);
                } else {
                    self.footnotes.insert(key, FootnoteBody { children });
                }
                Vec::new()
            }
            other => drop_if_empty(walk_block(self, other)),
        }
    }
}

/// Records defined footnotes in first-reference order.
struct FootnoteOrder<'a> {
    defined: &'a HashMap<String, FootnoteBody>,
    seen: HashSet<String>,
    order: Vec<String>,
}

impl Visit for FootnoteOrder<'_> {
    fn visit_inline(&mut self, inline: &Inline) {
        if let Inline::FootnoteReference { identifier, .. } = inline {
            let key = normalize_identifier(identifier);
            if self.defined.contains_key(&key) && self.seen.insert(key.clone()) {
                self.order.push(key);
            }
        }
        visit_inline_children(self, inline);
    }
}

fn footnote_order(body: &[Block], defined: &HashMap<String, FootnoteBody>) -> Vec<String> {
    let mut visitor = FootnoteOrder {
        defined,
        seen: HashSet::new(),
        order: Vec::new(),
    };
    visit_blocks(&mut visitor, body);

    // Footnotes referenced only from other footnotes follow in the order
    // their referencing footnotes were labeled.
    let mut next = 0;
    while let Some(key) = visitor.order.get(next).cloned() {
        if let Some(footnote) = defined.get(&key) {
            visit_blocks(&mut visitor, &footnote.children);
        }
        next += 1;
    }
    visitor.order
}

/// Rewrites reference nodes using the collected tables.
struct Resolver<'a, 'd, 's> {
    definitions: &'a HashMap<String, LinkTarget>,
    labels: &'a HashMap<String, usize>,
    diagnostics: &'d mut Diagnostics<'s>,
}

impl Fold for Resolver<'_, '_, '_> {
    fn fold_block(&mut self, block: Block) -> Vec<Block> {
        drop_if_empty(walk_block(self, block))
    }

    fn fold_inline(&mut self, inline: Inline) -> Vec<Inline> {
        match inline {
            Inline::LinkReference {
                identifier,
                children,
                position,
            } => match self.definitions.get(&normalize_identifier(&identifier)) {
                Some(target) => vec![Inline::Link {
                    url: target.url.clone(),
                    title: target.title.clone(),
                    children: self.fold_inlines(children),
                }],
                None => {
                    self.diagnostics.push(
                        DiagnosticKind::UnresolvedLink,
                        position,
                        format!("link reference `{identifier}` has no definition, link removed"),
                    );
                    Vec::new()
                }
            },
            Inline::ImageReference {
                identifier,
                alt,
                position,
            } => match self.definitions.get(&normalize_identifier(&identifier)) {
                Some(target) => vec![Inline::Image {
                    url: target.url.clone(),
                    title: target.title.clone(),
                    alt,
                }],
                None => {
                    self.diagnostics.push(
                        DiagnosticKind::UnresolvedImage,
                        position,
                        format!("image reference `{identifier}` has no definition, image removed"),
                    );
                    Vec::new()
                }
            },
            Inline::FootnoteReference {
                identifier,
                position,
            } => {
                let key = normalize_identifier(&identifier);
                match self.labels.get(&key) {
                    Some(label) => vec![Inline::FootnoteRef {
                        anchor: footnote_anchor(&key),
                        label: label.to_string(),
                        identifier: key,
                    }],
                    None => {
                        self.diagnostics.push(
                            DiagnosticKind::UnresolvedFootnote,
                            position,
                            format!("footnote `{identifier}` is never defined, reference removed"),
                        );
                        Vec::new()
                    }
                }
            }
            other => vec![walk_inline(self, other)],
        }
    }
}

/// Resolve every reference in `document`.
///
/// Footnotes already present in `document.footnotes` are kept in front of
/// the newly collected ones, and new labels continue after them.
pub(crate) fn resolve(document: Document, diagnostics: &mut Diagnostics<'_>) -> Document {
    let Document { blocks, footnotes } = document;

    let mut collector = Collector {
        definitions: HashMap::new(),
        footnotes: HashMap::new(),
        diagnostics,
    };
    let blocks = collector.fold_blocks(blocks);
    let Collector {
        definitions,
        footnotes: mut bodies,
        diagnostics,
    } = collector;

    let order = footnote_order(&blocks, &bodies);
    let first_label = footnotes.len() + 1;
    let labels: HashMap<String, usize> = order
        .iter()
        .enumerate()
        .map(|(i, key)| (key.clone(), first_label + i))
        .collect();
    tracing::debug!(
        definitions = definitions.len(),
        footnotes = order.len(),
        "Collected reference definitions"
    );

    let mut resolver = Resolver {
        definitions: &definitions,
        labels: &labels,
        diagnostics,
    };
    let blocks = resolver.fold_blocks(blocks);

    let mut resolved: Vec<Footnote> = footnotes
        .into_iter()
        .map(|footnote| Footnote {
            blocks: resolver.fold_blocks(footnote.blocks),
            ..footnote
        })
        .collect();
    for (i, key) in order.into_iter().enumerate() {
        let Some(body) = bodies.remove(&key) else {
            continue;
        };
        resolved.push(Footnote {
            anchor: footnote_anchor(&key),
            label: (first_label + i).to_string(),
            blocks: resolver.fold_blocks(body.children),
            identifier: key,
        });
    }

    for identifier in bodies.keys() {
        tracing::debug!(identifier = %identifier, "Dropped unreferenced footnote definition");
    }

    Document {
        blocks,
        footnotes: resolved,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::Diagnostic;

    fn resolve_blocks(blocks: Vec<Block>) -> (Document, Vec<Diagnostic>) {
        let mut diagnostics = Diagnostics::new("test.md");
        let document = resolve(
            Document {
                blocks,
                footnotes: Vec::new(),
            },
            &mut diagnostics,
        );
        (document, diagnostics.into_vec())
    }

    fn definition(identifier: &str, url: &str, line: usize) -> Block {
        Block::Definition {
            identifier: identifier.to_owned(),
            url: url.to_owned(),
            title: None,
            position: Position::new(line, 1),
        }
    }

    fn footnote_definition(identifier: &str, children: Vec<Block>) -> Block {
        Block::FootnoteDefinition {
            identifier: identifier.to_owned(),
            children,
            position: Position::new(9, 1),
        }
    }

    fn footnote_reference(identifier: &str) -> Inline {
        Inline::FootnoteReference {
            identifier: identifier.to_owned(),
            position: Position::new(1, 1),
        }
    }

    fn link_reference(identifier: &str, text: &str) -> Inline {
        Inline::LinkReference {
            identifier: identifier.to_owned(),
            children: vec![Inline::text(text)],
            position: Position::new(2, 3),
        }
    }

    fn footnote_ref(identifier: &str, label: &str) -> Inline {
        Inline::FootnoteRef {
            identifier: identifier.to_owned(),
            anchor: footnote_anchor(identifier),
            label: label.to_owned(),
        }
    }

    #[test]
    fn test_link_resolves_against_later_definition() {
        let (document, warnings) = resolve_blocks(vec![
            Block::Paragraph(vec![link_reference("Site", "home")]),
            definition("site", "https://example.com", 3),
        ]);

        assert_eq!(
            document.blocks,
            vec![Block::Paragraph(vec![Inline::Link {
                url: "https://example.com".to_owned(),
                title: None,
                children: vec![Inline::text("home")],
            }])]
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_first_definition_wins() {
        let (document, warnings) = resolve_blocks(vec![
            definition("Foo", "/first", 1),
            Block::Paragraph(vec![Inline::ImageReference {
                identifier: "foo".to_owned(),
                alt: "pic".to_owned(),
                position: Position::new(2, 1),
            }]),
            definition("FOO", "/second", 3),
        ]);

        assert_eq!(
            document.blocks,
            vec![Block::Paragraph(vec![Inline::Image {
                url: "/first".to_owned(),
                title: None,
                alt: "pic".to_owned(),
            }])]
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, DiagnosticKind::DuplicateDefinition);
        assert_eq!(warnings[0].position.line, 3);
    }

    #[test]
    fn test_unresolved_references_are_dropped() {
        let (document, warnings) = resolve_blocks(vec![
            Block::Paragraph(vec![Inline::text("a "), link_reference("nope", "x")]),
            Block::Paragraph(vec![link_reference("gone", "y")]),
        ]);

        assert_eq!(
            document.blocks,
            vec![Block::Paragraph(vec![Inline::text("a ")])]
        );
        let kinds: Vec<DiagnosticKind> = warnings.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::UnresolvedLink, DiagnosticKind::UnresolvedLink]
        );
        assert_eq!(warnings[0].position, Position::new(2, 3));
    }

    #[test]
    fn test_footnote_labels_follow_reference_order() {
        let (document, _) = resolve_blocks(vec![
            footnote_definition("b", vec![Block::Paragraph(vec![Inline::text("bee")])]),
            footnote_definition("a", vec![Block::Paragraph(vec![Inline::text("ay")])]),
            Block::Paragraph(vec![
                footnote_reference("a"),
                footnote_reference("B"),
                footnote_reference("a"),
            ]),
        ]);

        assert_eq!(
            document.blocks,
            vec![Block::Paragraph(vec![
                footnote_ref("a", "1"),
                footnote_ref("b", "2"),
                footnote_ref("a", "1"),
            ])]
        );
        let labels: Vec<(&str, &str)> = document
            .footnotes
            .iter()
            .map(|f| (f.identifier.as_str(), f.label.as_str()))
            .collect();
        assert_eq!(labels, vec![("a", "1"), ("b", "2")]);
    }

    #[test]
    fn test_footnote_referenced_from_footnote() {
        let (document, _) = resolve_blocks(vec![
            Block::Paragraph(vec![footnote_reference("outer")]),
            footnote_definition(
                "outer",
                vec![Block::Paragraph(vec![footnote_reference("inner")])],
            ),
            footnote_definition("inner", vec![Block::Paragraph(vec![Inline::text("deep")])]),
        ]);

        assert_eq!(document.footnotes.len(), 2);
        assert_eq!(
            document.footnotes[0].blocks,
            vec![Block::Paragraph(vec![footnote_ref("inner", "2")])]
        );
        assert_eq!(document.footnotes[1].identifier, "inner");
    }

    #[test]
    fn test_unreferenced_footnotes_are_omitted() {
        let (document, warnings) = resolve_blocks(vec![
            Block::Paragraph(vec![Inline::text("no refs")]),
            footnote_definition("lonely", vec![]),
        ]);
        assert!(document.footnotes.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_definitions_inside_footnotes_are_collected() {
        let (document, _) = resolve_blocks(vec![
            Block::Paragraph(vec![footnote_reference("n"), link_reference("x", "t")]),
            footnote_definition("n", vec![definition("x", "/x", 10)]),
        ]);

        assert!(matches!(
            &document.blocks[..],
            [Block::Paragraph(inlines)] if matches!(&inlines[1], Inline::Link { url, .. } if url == "/x")
        ));
        assert!(document.footnotes[0].blocks.is_empty());
    }

    #[test]
    fn test_resolving_twice_changes_nothing() {
        let (once, _) = resolve_blocks(vec![
            Block::Paragraph(vec![footnote_reference("1"), link_reference("l", "x")]),
            definition("l", "/l", 2),
            footnote_definition("1", vec![Block::Paragraph(vec![Inline::text("n")])]),
        ]);

        let mut diagnostics = Diagnostics::new("test.md");
        let twice = resolve(once.clone(), &mut diagnostics);
        assert_eq!(twice, once);
        assert!(diagnostics.into_vec().is_empty());
    }
}
