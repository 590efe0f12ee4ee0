//! kiji CLI - Markdown blog post compiler.
//!
//! Provides commands for:
//! - `compile`: Compile posts and print their document trees as JSON
//! - `check`: Compile posts and report diagnostics

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CheckArgs, CompileArgs, GlobalArgs};
use output::Output;

/// kiji - Markdown blog post compiler.
#[derive(Parser)]
#[command(name = "kiji", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile posts and print them as JSON.
    Compile(CompileArgs),
    /// Compile posts and report warnings and errors.
    Check(CheckArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables DEBUG level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.global.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Compile(args) => args.execute(&cli.global),
        Commands::Check(args) => args.execute(&cli.global),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "kiji",
            "check",
            "a.md",
            "--deny-warnings",
            "--html-policy",
            "ingest",
            "-v",
        ])
        .unwrap();

        assert!(cli.global.verbose);
        assert!(matches!(cli.command, Commands::Check(_)));
    }

    #[test]
    fn test_invalid_html_policy_rejected() {
        let result = Cli::try_parse_from(["kiji", "--html-policy", "keep", "compile"]);
        assert!(result.is_err());
    }
}
