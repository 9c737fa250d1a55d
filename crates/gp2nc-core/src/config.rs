//! Configuration module for gp2nc.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for gp2nc.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub migration: MigrationConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for the Nextcloud server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Server origin, e.g. `https://cloud.example.org`.
    pub url: String,
    pub user: String,
    /// Login or app password. `None` when supplied through the environment.
    pub password: Option<String>,
    /// Directory under the user's files that receives the `YYYY/MM` tree.
    pub upload_path: String,
}

/// How remote files without a server checksum are fingerprinted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMode {
    /// Use the server MD5 checksum, download and hash when it is missing.
    #[default]
    ChecksumOrDownload,
    /// Use the server MD5 checksum only; files without one are not indexed.
    ChecksumOnly,
}

/// Migration engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Maximum number of directories processed at once.
    pub workers: usize,
    /// Depth of the remote index walk below the upload path.
    pub index_depth: u8,
    /// Name of the album titles file at the export root.
    pub albums_file: String,
    pub fingerprint: FingerprintMode,
}

/// Retry policy for remote calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Fixed pause between attempts, in seconds.
    pub delay_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/gp2nc/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("gp2nc")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::new(),
            password: None,
            upload_path: "/Photos".to_string(),
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            index_depth: 3,
            albums_file: "user-generated-memory-titles.json".to_string(),
            fingerprint: FingerprintMode::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"retry.max_attempts"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Remote connection
    /// fields are only checked for shape here; their presence is enforced
    /// once command-line overrides have been applied.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- remote ---
        if !self.remote.url.is_empty()
            && !(self.remote.url.starts_with("http://") || self.remote.url.starts_with("https://"))
        {
            errors.push(ValidationError {
                field: "remote.url".into(),
                message: format!("must be an http(s) URL, got '{}'", self.remote.url),
            });
        }
        if self.remote.user.contains('/') {
            errors.push(ValidationError {
                field: "remote.user".into(),
                message: "must not contain '/'".into(),
            });
        }
        if !self.remote.upload_path.starts_with('/') {
            errors.push(ValidationError {
                field: "remote.upload_path".into(),
                message: "must start with '/'".into(),
            });
        }

        // --- migration ---
        if self.migration.workers == 0 {
            errors.push(ValidationError {
                field: "migration.workers".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.migration.index_depth == 0 {
            errors.push(ValidationError {
                field: "migration.index_depth".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.migration.albums_file.trim().is_empty() {
            errors.push(ValidationError {
                field: "migration.albums_file".into(),
                message: "must not be empty".into(),
            });
        }

        // --- retry ---
        if self.retry.max_attempts == 0 {
            errors.push(ValidationError {
                field: "retry.max_attempts".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use gp2nc_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .remote_url("https://cloud.example.org")
///     .remote_user("alice")
///     .migration_workers(8)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an already loaded configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- remote ---

    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.url = url.into();
        self
    }

    pub fn remote_user(mut self, user: impl Into<String>) -> Self {
        self.config.remote.user = user.into();
        self
    }

    pub fn remote_password(mut self, password: impl Into<String>) -> Self {
        self.config.remote.password = Some(password.into());
        self
    }

    pub fn remote_upload_path(mut self, path: impl Into<String>) -> Self {
        self.config.remote.upload_path = path.into();
        self
    }

    // --- migration ---

    pub fn migration_workers(mut self, workers: usize) -> Self {
        self.config.migration.workers = workers;
        self
    }

    pub fn migration_index_depth(mut self, depth: u8) -> Self {
        self.config.migration.index_depth = depth;
        self
    }

    pub fn migration_albums_file(mut self, name: impl Into<String>) -> Self {
        self.config.migration.albums_file = name.into();
        self
    }

    pub fn migration_fingerprint(mut self, mode: FingerprintMode) -> Self {
        self.config.migration.fingerprint = mode;
        self
    }

    // --- retry ---

    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn retry_delay_secs(mut self, secs: u64) -> Self {
        self.config.retry.delay_secs = secs;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
