//! `kiji check` command implementation.

use std::path::PathBuf;

use clap::Args;

use super::{GlobalArgs, load_posts, plural};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check command.
#[derive(Args)]
pub(crate) struct CheckArgs {
    /// Markdown files to check (default: every post in the posts directory).
    files: Vec<PathBuf>,

    /// Fail when any post produces a warning.
    #[arg(long)]
    deny_warnings: bool,
}

/// Outcome of a check run.
#[derive(Debug, PartialEq, Eq)]
struct Summary {
    posts: usize,
    warnings: usize,
    errors: usize,
}

impl Summary {
    fn describe(&self) -> String {
        format!(
            "Checked {}: {}, {}",
            plural(self.posts, "post"),
            plural(self.warnings, "warning"),
            plural(self.errors, "error")
        )
    }

    fn verdict(&self, deny_warnings: bool) -> Result<(), CliError> {
        if self.errors > 0 {
            Err(CliError::Failed(format!(
                "{} failed to compile",
                plural(self.errors, "post")
            )))
        } else if deny_warnings && self.warnings > 0 {
            Err(CliError::Failed(format!(
                "{} denied",
                plural(self.warnings, "warning")
            )))
        } else {
            Ok(())
        }
    }
}

impl CheckArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let loaded = load_posts(global, self.files)?;

        let mut summary = Summary {
            posts: loaded.posts.len() + loaded.errors.len(),
            warnings: 0,
            errors: loaded.errors.len(),
        };
        for post in &loaded.posts {
            summary.warnings += post.warnings.len();
            output.diagnostics(&post.warnings);
        }
        for error in &loaded.errors {
            output.error(&format!("error: {error}"));
        }

        output.info(&summary.describe());
        summary.verdict(self.deny_warnings)?;
        output.success("All posts compiled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_summary_text() {
        let summary = Summary {
            posts: 3,
            warnings: 1,
            errors: 0,
        };
        assert_eq!(summary.describe(), "Checked 3 posts: 1 warning, 0 errors");
    }

    #[test]
    fn test_verdict() {
        let clean = Summary {
            posts: 2,
            warnings: 0,
            errors: 0,
        };
        let warned = Summary {
            warnings: 2,
            ..clean
        };
        let failed = Summary {
            posts: 2,
            warnings: 0,
            errors: 1,
        };

        assert!(clean.verdict(true).is_ok());
        assert!(warned.verdict(false).is_ok());
        assert_eq!(
            warned.verdict(true).unwrap_err().to_string(),
            "2 warnings denied"
        );
        assert_eq!(
            failed.verdict(false).unwrap_err().to_string(),
            "1 post failed to compile"
        );
    }
}
