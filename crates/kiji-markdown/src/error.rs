//! Compile errors.

/// Fatal failure compiling one document.
///
/// Everything recoverable (dangling references, unknown directives, raw
/// HTML) is reported as a [`Diagnostic`](crate::Diagnostic) instead.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The compiler produced a tree that breaks its own structural rules.
    #[error("internal compiler error: {0}")]
    Invariant(String),

    /// Block or inline nesting exceeded the configured limit.
    #[error("{source_id}:{line}: nesting exceeds the limit of {limit} levels")]
    NestingTooDeep {
        source_id: String,
        line: usize,
        limit: usize,
    },
}
