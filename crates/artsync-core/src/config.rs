//! Configuration module for artsync.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, `${VAR}` environment interpolation, validation,
//! defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for one managed project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub state: StateConfig,
    pub logging: LoggingConfig,
}

/// Project identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Display name, used in log lines and the page heading.
    pub name: String,
    /// Project kind; selects the classifier convention. Currently only
    /// `slot_game`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Wiki connection settings. Secrets are expected to arrive via `${VAR}`
/// interpolation rather than being written into the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the wiki instance, e.g. `https://example.atlassian.net`.
    pub url: String,
    /// Id of the single managed page.
    pub page_id: String,
    /// Account email for basic auth.
    pub email: String,
    /// API token for basic auth.
    pub api_token: String,
    /// Account id to @-mention in history rows.
    pub user_account_id: Option<String>,
    /// Page appearance applied once per run: `full-width` or `default`.
    pub appearance: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

/// Retry policy for the wiki client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, first try included.
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds; doubles per attempt.
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds.
    pub max_delay_ms: u64,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local folder holding the assets to mirror.
    pub target_folder: PathBuf,
    /// Seconds to wait after the last file event before syncing (debounce).
    pub watch_delay_secs: u64,
    /// Seconds to wait before re-trying when a sync is already running.
    pub lock_retry_secs: u64,
    /// History entries kept locally and shown on the page.
    pub history_keep: usize,
    /// Captions spreadsheet (CSV export). Optional; no captions when unset.
    pub captions_file: Option<PathBuf>,
    /// Naming dictionary for the filename validator. Optional; filenames
    /// are not validated when unset.
    pub validator_dict: Option<PathBuf>,
    pub workers: WorkersConfig,
    pub file_patterns: FilePatternsConfig,
}

/// Per-phase concurrency bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub download: usize,
    pub delete: usize,
    pub upload: usize,
}

/// Glob patterns selecting which files count as assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePatternsConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Where the two persistent state documents live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Remote-attachment inventory cache.
    pub cache_file: PathBuf,
    /// History log document.
    pub history_file: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            page_id: String::new(),
            email: String::new(),
            api_token: String::new(),
            user_account_id: None,
            appearance: "full-width".to_string(),
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            target_folder: PathBuf::new(),
            watch_delay_secs: 2,
            lock_retry_secs: 2,
            history_keep: 10,
            captions_file: None,
            validator_dict: None,
            workers: WorkersConfig::default(),
            file_patterns: FilePatternsConfig::default(),
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            download: 15,
            delete: 5,
            upload: 5,
        }
    }
}

impl Default for FilePatternsConfig {
    fn default() -> Self {
        Self {
            include: vec![
                "*.png".to_string(),
                "*.jpg".to_string(),
                "*.jpeg".to_string(),
            ],
            exclude: Vec::new(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from(".sync_cache.json"),
            history_file: PathBuf::from("version_history.json"),
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
// Loading + environment interpolation
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    ///
    /// `${VAR}` and `$VAR` references are replaced from the environment
    /// before parsing; an unset variable is a hard error so secrets can
    /// never silently end up empty.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let content = interpolate_env(&content)?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

/// Replace `${VAR}` / `$VAR` references in `raw` with environment values.
fn interpolate_env(raw: &str) -> anyhow::Result<String> {
    // Compiled per call; config loading happens once at startup.
    let pattern = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .context("compiling env interpolation pattern")?;

    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    for caps in pattern.captures_iter(raw) {
        let whole = caps.get(0).context("capture group missing")?;
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .context("capture group missing")?
            .as_str();
        let value = std::env::var(name)
            .with_context(|| format!("environment variable '{name}' is not set"))?;
        out.push_str(&raw[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&raw[last..]);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.target_folder"`.
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

/// Valid values for `remote.appearance`.
const VALID_APPEARANCES: &[&str] = &["full-width", "default"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let mut require = |field: &str, value: &str| {
            if value.trim().is_empty() {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must not be empty".into(),
                });
            }
        };

        // --- project ---
        require("project.name", &self.project.name);
        require("project.type", &self.project.kind);

        // --- remote ---
        require("remote.url", &self.remote.url);
        require("remote.page_id", &self.remote.page_id);
        require("remote.email", &self.remote.email);
        require("remote.api_token", &self.remote.api_token);

        if !VALID_APPEARANCES.contains(&self.remote.appearance.as_str()) {
            errors.push(ValidationError {
                field: "remote.appearance".into(),
                message: format!(
                    "invalid appearance '{}'; valid options: {}",
                    self.remote.appearance,
                    VALID_APPEARANCES.join(", ")
                ),
            });
        }
        if self.remote.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "remote.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.remote.retry.max_attempts == 0 {
            errors.push(ValidationError {
                field: "remote.retry.max_attempts".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.remote.retry.base_delay_ms == 0 {
            errors.push(ValidationError {
                field: "remote.retry.base_delay_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.remote.retry.max_delay_ms < self.remote.retry.base_delay_ms {
            errors.push(ValidationError {
                field: "remote.retry.max_delay_ms".into(),
                message: format!(
                    "max_delay_ms ({}) must not be below base_delay_ms ({})",
                    self.remote.retry.max_delay_ms, self.remote.retry.base_delay_ms
                ),
            });
        }

        // --- sync ---
        if self.sync.target_folder.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.target_folder".into(),
                message: "must not be empty".into(),
            });
        }
        if self.sync.watch_delay_secs == 0 {
            errors.push(ValidationError {
                field: "sync.watch_delay_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.lock_retry_secs == 0 {
            errors.push(ValidationError {
                field: "sync.lock_retry_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.history_keep == 0 {
            errors.push(ValidationError {
                field: "sync.history_keep".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.workers.download == 0 {
            errors.push(ValidationError {
                field: "sync.workers.download".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.workers.delete == 0 {
            errors.push(ValidationError {
                field: "sync.workers.delete".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.workers.upload == 0 {
            errors.push(ValidationError {
                field: "sync.workers.upload".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.file_patterns.include.is_empty() {
            errors.push(ValidationError {
                field: "sync.file_patterns.include".into(),
                message: "must list at least one pattern".into(),
            });
        }

        // --- state ---
        if self.state.cache_file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "state.cache_file".into(),
                message: "must not be empty".into(),
            });
        }
        if self.state.history_file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "state.history_file".into(),
                message: "must not be empty".into(),
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
/// use artsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .project_name("demo")
///     .sync_target_folder(PathBuf::from("/srv/assets"))
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

    // --- project ---

    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.config.project.name = name.into();
        self
    }

    pub fn project_kind(mut self, kind: impl Into<String>) -> Self {
        self.config.project.kind = kind.into();
        self
    }

    // --- remote ---

    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.url = url.into();
        self
    }

    pub fn remote_page_id(mut self, page_id: impl Into<String>) -> Self {
        self.config.remote.page_id = page_id.into();
        self
    }

    pub fn remote_email(mut self, email: impl Into<String>) -> Self {
        self.config.remote.email = email.into();
        self
    }

    pub fn remote_api_token(mut self, token: impl Into<String>) -> Self {
        self.config.remote.api_token = token.into();
        self
    }

    pub fn remote_user_account_id(mut self, id: impl Into<String>) -> Self {
        self.config.remote.user_account_id = Some(id.into());
        self
    }

    pub fn remote_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.remote.timeout_secs = seconds;
        self
    }

    pub fn remote_retry_max_attempts(mut self, n: u32) -> Self {
        self.config.remote.retry.max_attempts = n;
        self
    }

    pub fn remote_retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.remote.retry.base_delay_ms = ms;
        self
    }

    // --- sync ---

    pub fn sync_target_folder(mut self, folder: PathBuf) -> Self {
        self.config.sync.target_folder = folder;
        self
    }

    pub fn sync_watch_delay_secs(mut self, seconds: u64) -> Self {
        self.config.sync.watch_delay_secs = seconds;
        self
    }

    pub fn sync_lock_retry_secs(mut self, seconds: u64) -> Self {
        self.config.sync.lock_retry_secs = seconds;
        self
    }

    pub fn sync_history_keep(mut self, keep: usize) -> Self {
        self.config.sync.history_keep = keep;
        self
    }

    pub fn sync_captions_file(mut self, file: PathBuf) -> Self {
        self.config.sync.captions_file = Some(file);
        self
    }

    pub fn sync_validator_dict(mut self, file: PathBuf) -> Self {
        self.config.sync.validator_dict = Some(file);
        self
    }

    pub fn sync_workers(mut self, download: usize, delete: usize, upload: usize) -> Self {
        self.config.sync.workers = WorkersConfig {
            download,
            delete,
            upload,
        };
        self
    }

    pub fn sync_include_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.sync.file_patterns.include = patterns;
        self
    }

    pub fn sync_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.sync.file_patterns.exclude = patterns;
        self
    }

    // --- state ---

    pub fn state_cache_file(mut self, file: PathBuf) -> Self {
        self.config.state.cache_file = file;
        self
    }

    pub fn state_history_file(mut self, file: PathBuf) -> Self {
        self.config.state.history_file = file;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn complete_builder() -> ConfigBuilder {
        ConfigBuilder::new()
            .project_name("demo")
            .project_kind("slot_game")
            .remote_url("https://example.atlassian.net")
            .remote_page_id("123456")
            .remote_email("bot@example.com")
            .remote_api_token("token")
            .sync_target_folder(PathBuf::from("/srv/assets"))
    }

    #[test]
    fn complete_config_validates_clean() {
        let config = complete_builder().build();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn default_config_reports_all_missing_required_fields() {
        let errors = Config::default().validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        for expected in [
            "project.name",
            "project.type",
            "remote.url",
            "remote.page_id",
            "remote.email",
            "remote.api_token",
            "sync.target_folder",
        ] {
            assert!(fields.contains(&expected), "missing error for {expected}");
        }
    }

    #[test]
    fn zero_and_invalid_values_are_rejected() {
        let mut config = complete_builder().build();
        config.sync.watch_delay_secs = 0;
        config.sync.history_keep = 0;
        config.sync.workers.upload = 0;
        config.remote.retry.max_attempts = 0;
        config.remote.appearance = "sidebar".into();
        config.logging.level = "verbose".into();

        let fields: Vec<String> = config.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"sync.watch_delay_secs".to_string()));
        assert!(fields.contains(&"sync.history_keep".to_string()));
        assert!(fields.contains(&"sync.workers.upload".to_string()));
        assert!(fields.contains(&"remote.retry.max_attempts".to_string()));
        assert!(fields.contains(&"remote.appearance".to_string()));
        assert!(fields.contains(&"logging.level".to_string()));
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let yaml = r#"
project:
  name: demo
  type: slot_game
sync:
  target_folder: /srv/assets
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.sync.watch_delay_secs, 2);
        assert_eq!(config.sync.history_keep, 10);
        assert_eq!(config.remote.retry.max_attempts, 5);
        assert_eq!(config.remote.appearance, "full-width");
        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.sync.file_patterns.include,
            vec!["*.png", "*.jpg", "*.jpeg"]
        );
    }

    #[test]
    fn env_interpolation_replaces_braced_and_bare_refs() {
        std::env::set_var("ARTSYNC_TEST_TOKEN", "s3cret");
        let out = interpolate_env("token: ${ARTSYNC_TEST_TOKEN}\nalt: $ARTSYNC_TEST_TOKEN\n")
            .unwrap();
        assert_eq!(out, "token: s3cret\nalt: s3cret\n");
        std::env::remove_var("ARTSYNC_TEST_TOKEN");
    }

    #[test]
    fn env_interpolation_fails_on_unset_variable() {
        std::env::remove_var("ARTSYNC_TEST_UNSET");
        let err = interpolate_env("token: ${ARTSYNC_TEST_UNSET}").unwrap_err();
        assert!(err.to_string().contains("ARTSYNC_TEST_UNSET"));
    }

    #[test]
    fn load_reads_interpolates_and_parses() {
        std::env::set_var("ARTSYNC_TEST_API_TOKEN", "abc123");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
project:
  name: demo
  type: slot_game
remote:
  url: https://example.atlassian.net
  page_id: "123456"
  email: bot@example.com
  api_token: ${{ARTSYNC_TEST_API_TOKEN}}
sync:
  target_folder: /srv/assets
"#
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.remote.api_token, "abc123");
        assert!(config.validate().is_empty());
        std::env::remove_var("ARTSYNC_TEST_API_TOKEN");
    }

    #[test]
    fn load_fails_for_missing_file() {
        assert!(Config::load(Path::new("/nonexistent/config.yaml")).is_err());
    }
}
