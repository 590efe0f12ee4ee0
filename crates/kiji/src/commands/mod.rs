//! CLI command implementations.

pub(crate) mod check;
pub(crate) mod compile;

use std::path::PathBuf;

use clap::Args;
use kiji_config::{CliSettings, Config};
use kiji_markdown::{Compiler, HtmlPolicy};
use kiji_post::{LoadedPosts, PostLoader};

use crate::error::CliError;

pub(crate) use check::CheckArgs;
pub(crate) use compile::CompileArgs;

/// Options shared by every command.
#[derive(Args)]
pub(crate) struct GlobalArgs {
    /// Path to configuration file (default: auto-discover kiji.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output (debug logs).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Raw HTML policy: elide or ingest (overrides config).
    #[arg(long, global = true, env = "KIJI_HTML_POLICY")]
    html_policy: Option<HtmlPolicy>,

    /// Maximum block nesting depth (overrides config).
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Posts directory used when no files are given (overrides config).
    #[arg(long, global = true)]
    posts_dir: Option<PathBuf>,
}

impl GlobalArgs {
    fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            html_policy: self.html_policy,
            max_depth: self.max_depth,
            posts_dir: self.posts_dir.clone(),
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }
}

/// Load the given posts, or every post in the configured directory when
/// `files` is empty.
pub(crate) fn load_posts(
    global: &GlobalArgs,
    files: Vec<PathBuf>,
) -> Result<LoadedPosts, CliError> {
    let config = global.load_config()?;
    let posts_dir = config.posts_resolved.dir.clone();

    let paths = if files.is_empty() {
        PostLoader::discover(&posts_dir)?
    } else {
        files
    };
    tracing::debug!(
        posts = paths.len(),
        html = %config.markdown.html,
        "Loading posts"
    );

    let loader =
        PostLoader::new(Compiler::new(config.markdown.compiler_config())).with_root(posts_dir);
    Ok(loader.load_all(&paths))
}

/// Pluralize `noun` for `count`.
fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
