//! CLI error types.

use kiji_config::ConfigError;
use kiji_post::PostError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Post(#[from] PostError),

    #[error("failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}
