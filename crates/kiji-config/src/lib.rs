//! Configuration management for kiji.
//!
//! Parses `kiji.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `posts.dir` supports environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//! - `~` - expands to the home directory

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiji_markdown::{
    CompilerConfig, DEFAULT_MAX_DEPTH, HtmlPolicy, LanguageAliases, MAX_DEPTH_LIMIT,
};
use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override raw HTML policy.
    pub html_policy: Option<HtmlPolicy>,
    /// Override nesting limit.
    pub max_depth: Option<usize>,
    /// Override posts directory.
    pub posts_dir: Option<PathBuf>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "kiji.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Markdown compiler configuration.
    pub markdown: MarkdownConfig,
    /// Posts configuration (paths are relative strings from TOML).
    posts: PostsConfigRaw,

    /// Resolved posts configuration (set after loading).
    #[serde(skip)]
    pub posts_resolved: PostsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Markdown compiler configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Raw HTML policy.
    pub html: HtmlPolicy,
    /// Maximum block/inline nesting depth.
    pub max_depth: usize,
    /// Whether `> [!NOTE]` blockquote alerts are recognized.
    pub gfm_alerts: bool,
    /// Code block language aliases, merged over the built-in ones.
    pub language_aliases: BTreeMap<String, String>,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            html: HtmlPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            gfm_alerts: true,
            language_aliases: BTreeMap::new(),
        }
    }
}

impl MarkdownConfig {
    /// Build the compiler configuration.
    #[must_use]
    pub fn compiler_config(&self) -> CompilerConfig {
        let aliases = self.language_aliases.iter().fold(
            LanguageAliases::default(),
            |aliases, (alias, language)| aliases.with_alias(alias.as_str(), language.as_str()),
        );
        CompilerConfig::new()
            .with_html_policy(self.html)
            .with_max_depth(self.max_depth)
            .with_gfm_alerts(self.gfm_alerts)
            .with_language_aliases(aliases)
    }
}

/// Raw posts configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PostsConfigRaw {
    dir: Option<String>,
}

/// Resolved posts configuration with absolute paths.
#[derive(Debug, Default)]
pub struct PostsConfig {
    /// Directory holding post sources.
    pub dir: PathBuf,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`posts.dir`").
        field: String,
        /// Error message (e.g., "${`BLOG_ROOT`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `kiji.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the result (after CLI overrides) is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(policy) = settings.html_policy {
            self.markdown.html = policy;
        }
        if let Some(max_depth) = settings.max_depth {
            self.markdown.max_depth = max_depth;
        }
        if let Some(dir) = &settings.posts_dir {
            self.posts_resolved.dir.clone_from(dir);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::discover_from(current)
    }

    fn discover_from(mut current: PathBuf) -> Option<PathBuf> {
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            markdown: MarkdownConfig::default(),
            posts: PostsConfigRaw::default(),
            posts_resolved: PostsConfig {
                dir: base.join("posts"),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir)?;
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_markdown()
    }

    fn validate_markdown(&self) -> Result<(), ConfigError> {
        let max_depth = self.markdown.max_depth;
        if max_depth == 0 {
            return Err(ConfigError::Validation(
                "markdown.max_depth must be greater than 0".to_owned(),
            ));
        }
        if max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::Validation(format!(
                "markdown.max_depth cannot exceed {MAX_DEPTH_LIMIT}"
            )));
        }

        for (alias, language) in &self.markdown.language_aliases {
            require_non_empty(alias, "markdown.language_aliases key")?;
            require_non_empty(language, &format!("markdown.language_aliases.{alias}"))?;
        }

        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        let dir = match self.posts.dir.as_deref() {
            Some(dir) => PathBuf::from(expand::expand_path(dir, "posts.dir")?),
            None => PathBuf::from("posts"),
        };
        self.posts_resolved = PostsConfig {
            dir: config_dir.join(dir),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.markdown.html, HtmlPolicy::Elide);
        assert_eq!(config.markdown.max_depth, 64);
        assert!(config.markdown.gfm_alerts);
        assert_eq!(config.posts_resolved.dir, PathBuf::from("/test/posts"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.markdown.html, HtmlPolicy::Elide);
        assert!(config.markdown.language_aliases.is_empty());
    }

    #[test]
    fn test_parse_markdown_config() {
        let toml = r#"
[markdown]
html = "ingest"
max_depth = 32
gfm_alerts = false

[markdown.language_aliases]
sh = "bash"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.markdown.html, HtmlPolicy::Ingest);
        assert_eq!(config.markdown.max_depth, 32);
        assert!(!config.markdown.gfm_alerts);
        assert_eq!(config.markdown.language_aliases["sh"], "bash");
    }

    #[test]
    fn test_unknown_html_policy_is_parse_error() {
        let result: Result<Config, _> = toml::from_str("[markdown]\nhtml = \"keep\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_compiler_config_merges_aliases() {
        let toml = r#"
[markdown]
max_depth = 8

[markdown.language_aliases]
sh = "bash"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let compiler = config.markdown.compiler_config();

        assert_eq!(compiler.max_depth(), 8);
        assert_eq!(compiler.language_aliases().resolve("sh"), "bash");
        assert_eq!(compiler.language_aliases().resolve("command"), "shellsession");
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[posts]
dir = "content/posts"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/blog")).unwrap();
        assert_eq!(
            config.posts_resolved.dir,
            PathBuf::from("/blog/content/posts")
        );
    }

    #[test]
    fn test_resolve_paths_keeps_absolute_dir() {
        let mut config: Config = toml::from_str("[posts]\ndir = \"/srv/posts\"\n").unwrap();
        config.resolve_paths(Path::new("/blog")).unwrap();
        assert_eq!(config.posts_resolved.dir, PathBuf::from("/srv/posts"));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            html_policy: Some(HtmlPolicy::Ingest),
            posts_dir: Some(PathBuf::from("/custom")),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.markdown.html, HtmlPolicy::Ingest);
        assert_eq!(config.markdown.max_depth, 64); // Unchanged
        assert_eq!(config.posts_resolved.dir, PathBuf::from("/custom"));
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.apply_cli_settings(&CliSettings::default());
        assert_eq!(config.markdown.html, HtmlPolicy::Elide);
        assert_eq!(config.posts_resolved.dir, PathBuf::from("/test/posts"));
    }

    /// Assert that validation fails with expected substrings in the error message.
    fn assert_validation_error(config: &Config, expected_substrings: &[&str]) {
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let msg = err.to_string();
        for s in expected_substrings {
            assert!(
                msg.contains(s),
                "Expected error to contain '{s}', got: {msg}"
            );
        }
    }

    #[test]
    fn test_validate_max_depth_zero() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.markdown.max_depth = 0;
        assert_validation_error(&config, &["max_depth", "greater than 0"]);
    }

    #[test]
    fn test_validate_max_depth_too_high() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.markdown.max_depth = 1024;
        assert_validation_error(&config, &["max_depth", "256"]);
    }

    #[test]
    fn test_validate_max_depth_at_limit() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.markdown.max_depth = MAX_DEPTH_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_alias() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config
            .markdown
            .language_aliases
            .insert("sh".to_owned(), " ".to_owned());
        assert_validation_error(&config, &["language_aliases.sh", "empty"]);
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/kiji.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_from_file_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[markdown]\nhtml = \"ingest\"\n\n[posts]\ndir = \"writing\"\n")
            .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.markdown.html, HtmlPolicy::Ingest);
        assert_eq!(config.posts_resolved.dir, dir.path().join("writing"));
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_rejects_invalid_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();
        let overrides = CliSettings {
            max_depth: Some(0),
            ..Default::default()
        };

        let err = Config::load(Some(&path), Some(&overrides)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_discover_from_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "").unwrap();
        let nested = dir.path().join("posts").join("2024");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            Config::discover_from(nested),
            Some(dir.path().join(CONFIG_FILENAME))
        );
    }
}
