//! `kiji compile` command implementation.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use kiji_markdown::{Diagnostic, Document};
use kiji_post::{Post, PostMetadata};
use serde::Serialize;

use super::{GlobalArgs, load_posts, plural};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the compile command.
#[derive(Args)]
pub(crate) struct CompileArgs {
    /// Markdown files to compile (default: every post in the posts directory).
    files: Vec<PathBuf>,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

/// JSON shape of one compiled post.
#[derive(Serialize)]
struct CompiledPost<'a> {
    id: &'a str,
    metadata: &'a PostMetadata,
    document: &'a Document,
    warnings: &'a [Diagnostic],
}

impl<'a> From<&'a Post> for CompiledPost<'a> {
    fn from(post: &'a Post) -> Self {
        Self {
            id: &post.id,
            metadata: &post.metadata,
            document: &post.document,
            warnings: &post.warnings,
        }
    }
}

impl CompileArgs {
    /// Print loaded posts as a JSON array on stdout.
    ///
    /// Posts that fail are reported on stderr and left out of the array.
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let loaded = load_posts(global, self.files)?;

        for post in &loaded.posts {
            output.diagnostics(&post.warnings);
        }
        for error in &loaded.errors {
            output.error(&format!("error: {error}"));
        }

        let compiled: Vec<CompiledPost<'_>> =
            loaded.posts.iter().map(CompiledPost::from).collect();
        let mut stdout = std::io::stdout().lock();
        write_json(&mut stdout, &compiled, self.pretty)?;

        if loaded.errors.is_empty() {
            Ok(())
        } else {
            Err(CliError::Failed(format!(
                "{} failed to compile",
                plural(loaded.errors.len(), "post")
            )))
        }
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(
    writer: &mut W,
    value: &T,
    pretty: bool,
) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, value)?;
    } else {
        serde_json::to_writer(&mut *writer, value)?;
    }
    writeln!(writer)?;
    Ok(())
}
