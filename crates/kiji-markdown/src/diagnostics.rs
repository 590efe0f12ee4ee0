//! Non-fatal compile diagnostics.

use std::fmt;

use crate::ast::Position;

/// What a diagnostic is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DiagnosticKind {
    /// Raw HTML was removed from the output.
    RawHtml,
    /// Link reference without a matching definition.
    UnresolvedLink,
    /// Image reference without a matching definition.
    UnresolvedImage,
    /// Footnote reference without a matching footnote definition.
    UnresolvedFootnote,
    /// Container or leaf directive that is not an alert.
    UnknownDirective,
    /// Container directive that was never closed.
    UnclosedDirective,
    /// `:::` without an open container directive.
    StrayDirectiveClose,
    /// Definition whose identifier was already defined.
    DuplicateDefinition,
    /// Element dropped while ingesting raw HTML.
    DisallowedHtml,
}

impl DiagnosticKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::RawHtml => "raw_html",
            DiagnosticKind::UnresolvedLink => "unresolved_link",
            DiagnosticKind::UnresolvedImage => "unresolved_image",
            DiagnosticKind::UnresolvedFootnote => "unresolved_footnote",
            DiagnosticKind::UnknownDirective => "unknown_directive",
            DiagnosticKind::UnclosedDirective => "unclosed_directive",
            DiagnosticKind::StrayDirectiveClose => "stray_directive_close",
            DiagnosticKind::DuplicateDefinition => "duplicate_definition",
            DiagnosticKind::DisallowedHtml => "disallowed_html",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A warning produced while compiling one document.
///
/// Displays as `source:line:column: message`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    /// Source identifier passed to the compiler (usually a file path).
    pub source: String,
    pub position: Position,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.source, self.position.line, self.position.column, self.message
        )
    }
}

/// Diagnostic sink for one compile call.
///
/// Every pushed diagnostic is also emitted as a `tracing` warning.
#[derive(Debug)]
pub(crate) struct Diagnostics<'a> {
    source: &'a str,
    items: Vec<Diagnostic>,
}

impl<'a> Diagnostics<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source,
            items: Vec::new(),
        }
    }

    pub(crate) fn source(&self) -> &'a str {
        self.source
    }

    pub(crate) fn push(
        &mut self,
        kind: DiagnosticKind,
        position: Position,
        message: impl Into<String>,
    ) {
        let message = message.into();
        tracing::warn!(
            source = self.source,
            line = position.line,
            column = position.column,
            kind = %kind,
            "{message}"
        );
        self.items.push(Diagnostic {
            source: self.source.to_owned(),
            position,
            kind,
            message,
        });
    }

    pub(crate) fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let diagnostic = Diagnostic {
            source: "posts/hello.md".to_owned(),
            position: Position::new(12, 3),
            kind: DiagnosticKind::RawHtml,
            message: "raw HTML removed".to_owned(),
        };
        assert_eq!(
            diagnostic.to_string(),
            "posts/hello.md:12:3: raw HTML removed"
        );
    }

    #[test]
    fn test_collects_in_order() {
        let mut diagnostics = Diagnostics::new("a.md");
        diagnostics.push(
            DiagnosticKind::UnresolvedLink,
            Position::new(1, 1),
            "first",
        );
        diagnostics.push(
            DiagnosticKind::UnresolvedFootnote,
            Position::new(2, 5),
            "second",
        );

        let items = diagnostics.into_vec();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, DiagnosticKind::UnresolvedLink);
        assert_eq!(items[1].source, "a.md");
        assert_eq!(items[1].position, Position::new(2, 5));
    }
}
