//! Directive resolution: alerts stay, everything else goes.

use crate::ast::{AlertKind, Block, Directive, Inline};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::fold::{Fold, drop_if_empty, walk_block, walk_inline};

/// Rewrites directive nodes into alerts or removes them.
///
/// A directive is decided before its children are visited, so a directive
/// nested in an alert is resolved on its own and nested alerts survive.
pub(crate) struct DirectiveResolver<'d, 's> {
    diagnostics: &'d mut Diagnostics<'s>,
}

impl<'d, 's> DirectiveResolver<'d, 's> {
    pub(crate) fn new(diagnostics: &'d mut Diagnostics<'s>) -> Self {
        Self { diagnostics }
    }

    fn resolve(&mut self, directive: Directive) -> Vec<Block> {
        let Some(kind) = AlertKind::from_name(&directive.name) else {
            self.diagnostics.push(
                DiagnosticKind::UnknownDirective,
                directive.position,
                format!("unknown directive `{}` removed", directive.name),
            );
            return Vec::new();
        };

        let title = directive.args.non_empty_label().map(str::to_owned);
        vec![Block::Alert {
            kind,
            title,
            children: self.fold_blocks(directive.children),
        }]
    }
}

impl Fold for DirectiveResolver<'_, '_> {
    fn fold_block(&mut self, block: Block) -> Vec<Block> {
        match block {
            Block::Directive(directive) => self.resolve(directive),
            other => drop_if_empty(walk_block(self, other)),
        }
    }

    fn fold_inline(&mut self, inline: Inline) -> Vec<Inline> {
        match inline {
            Inline::Directive(directive) => {
                tracing::debug!(
                    name = %directive.name,
                    line = directive.position.line,
                    "Removed text directive"
                );
                Vec::new()
            }
            other => vec![walk_inline(self, other)],
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::{DirectiveKind, Position};
    use crate::directive::DirectiveArgs;

    fn container(name: &str, label: &str, children: Vec<Block>) -> Block {
        Block::Directive(Directive {
            kind: DirectiveKind::Container,
            name: name.to_owned(),
            args: DirectiveArgs::parse(label, ""),
            children,
            position: Position::new(3, 1),
        })
    }

    fn para(text: &str) -> Block {
        Block::Paragraph(vec![Inline::text(text)])
    }

    fn resolve(blocks: Vec<Block>) -> (Vec<Block>, Vec<crate::Diagnostic>) {
        let mut diagnostics = Diagnostics::new("test.md");
        let blocks = DirectiveResolver::new(&mut diagnostics).fold_blocks(blocks);
        (blocks, diagnostics.into_vec())
    }

    #[test]
    fn test_alert_keeps_children_in_order() {
        let (blocks, warnings) = resolve(vec![container(
            "Tip",
            "",
            vec![para("one"), Block::ThematicBreak, para("two")],
        )]);

        assert_eq!(
            blocks,
            vec![Block::Alert {
                kind: AlertKind::Tip,
                title: None,
                children: vec![para("one"), Block::ThematicBreak, para("two")],
            }]
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_label_becomes_title() {
        let (blocks, _) = resolve(vec![container("caution", "Hot", vec![])]);
        assert!(matches!(
            &blocks[..],
            [Block::Alert { kind: AlertKind::Caution, title: Some(t), .. }] if t == "Hot"
        ));
    }

    #[test]
    fn test_unknown_directive_removed_with_children() {
        let (blocks, warnings) = resolve(vec![
            para("before"),
            container("details", "", vec![container("note", "", vec![para("x")])]),
            para("after"),
        ]);

        assert_eq!(blocks, vec![para("before"), para("after")]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, DiagnosticKind::UnknownDirective);
        assert_eq!(warnings[0].position, Position::new(3, 1));
    }

    #[test]
    fn test_nested_alerts_are_kept() {
        let (blocks, _) = resolve(vec![container(
            "note",
            "",
            vec![container("warning", "", vec![para("inner")])],
        )]);

        assert_eq!(
            blocks,
            vec![Block::Alert {
                kind: AlertKind::Note,
                title: None,
                children: vec![Block::Alert {
                    kind: AlertKind::Warning,
                    title: None,
                    children: vec![para("inner")],
                }],
            }]
        );
    }

    #[test]
    fn test_text_directives_removed_silently() {
        let text_directive = Inline::Directive(Directive {
            kind: DirectiveKind::Text,
            name: "kbd".to_owned(),
            args: DirectiveArgs::parse("C", ""),
            children: vec![],
            position: Position::new(1, 5),
        });
        let (blocks, warnings) = resolve(vec![
            Block::Paragraph(vec![Inline::text("Press "), text_directive.clone()]),
            Block::Paragraph(vec![text_directive]),
        ]);

        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![Inline::text("Press ")])]
        );
        assert!(warnings.is_empty());
    }
}
