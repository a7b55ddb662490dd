//! Configuration module for ubiqfs.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::newtypes::ContainerId;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for ubiqfs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cloud: CloudConfig,
    pub migration: MigrationConfig,
    pub logging: LoggingConfig,
}

/// Cloud container and index query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Container to observe. `None` selects the application's default container.
    pub container_identifier: Option<String>,
    /// Seconds over which the index coalesces live updates.
    pub batching_interval_secs: u64,
    /// Local documents root used by bulk migration.
    pub local_root: PathBuf,
}

/// Bulk local↔cloud migration settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Sweep the whole source tree after copying, even entries that failed
    /// to copy. Off by default: only copied files are removed.
    pub force_delete_source: bool,
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
    /// Typically `$XDG_CONFIG_HOME/ubiqfs/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ubiqfs")
            .join("config.yaml")
    }
}

impl CloudConfig {
    /// The configured container as a validated identifier.
    pub fn container_id(&self) -> Result<Option<ContainerId>, DomainError> {
        self.container_identifier
            .as_deref()
            .map(ContainerId::new)
            .transpose()
    }

    /// Batching interval as a [`Duration`]; zero is rejected.
    pub fn batching_interval(&self) -> Result<Duration, DomainError> {
        if self.batching_interval_secs == 0 {
            return Err(DomainError::ValidationFailed(
                "cloud.batching_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(Duration::from_secs(self.batching_interval_secs))
    }

    /// Local documents root with a leading `~` expanded to the home directory.
    pub fn local_root(&self) -> PathBuf {
        let Some(raw) = self.local_root.to_str() else {
            return self.local_root.clone();
        };
        if let Some(stripped) = raw.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if raw == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
        self.local_root.clone()
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            container_identifier: None,
            batching_interval_secs: 1,
            local_root: dirs::document_dir().unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join("Documents")
            }),
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
    /// Dotted path to the offending field, e.g. `"cloud.batching_interval_secs"`.
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
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- cloud ---
        if let Err(e) = self.cloud.container_id() {
            errors.push(ValidationError {
                field: "cloud.container_identifier".into(),
                message: e.to_string(),
            });
        }
        if let Err(e) = self.cloud.batching_interval() {
            errors.push(ValidationError {
                field: "cloud.batching_interval_secs".into(),
                message: e.to_string(),
            });
        }
        // Tilde is expanded by the host, so only check paths without it.
        let root_str = self.cloud.local_root.to_string_lossy();
        if !root_str.starts_with('~') && !self.cloud.local_root.is_absolute() {
            errors.push(ValidationError {
                field: "cloud.local_root".into(),
                message: format!(
                    "must be an absolute path: {}",
                    self.cloud.local_root.display()
                ),
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
/// use ubiqfs_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .cloud_container_identifier("iCloud.com.example.notes")
///     .cloud_local_root(PathBuf::from("/home/user/Documents"))
///     .logging_level("debug")
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

    // --- cloud ---

    pub fn cloud_container_identifier(mut self, id: impl Into<String>) -> Self {
        self.config.cloud.container_identifier = Some(id.into());
        self
    }

    pub fn cloud_batching_interval_secs(mut self, seconds: u64) -> Self {
        self.config.cloud.batching_interval_secs = seconds;
        self
    }

    pub fn cloud_local_root(mut self, root: PathBuf) -> Self {
        self.config.cloud.local_root = root;
        self
    }

    // --- migration ---

    pub fn migration_force_delete_source(mut self, force: bool) -> Self {
        self.config.migration.force_delete_source = force;
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
