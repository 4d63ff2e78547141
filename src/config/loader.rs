//! Configuration file loading with precedence handling.

use crate::gateway::{GatewaySettings, DEFAULT_API_BASE_URL};
use crate::orchestrator::OrchestratorSettings;
use crate::route::DEFAULT_TARGET_HOST;
use crate::support::LanguagePrefs;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "VOUCHER_LENS_CONFIG";
/// Environment override of `target_host`.
pub const TARGET_HOST_ENV: &str = "VOUCHER_LENS_TARGET_HOST";
/// Environment override of `api_base_url`.
pub const API_BASE_URL_ENV: &str = "VOUCHER_LENS_API_BASE_URL";

const APP_DIR: &str = "voucher-lens";

/// Errors that can occur during config loading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file path contains invalid UTF-8 or cannot be resolved.
    #[error("Invalid config path: {0}")]
    InvalidPath(String),

    /// Failed to read config file (permission issues, not a file, ...).
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError {
        /// Path that failed to read.
        path: PathBuf,
        /// Reason for failure.
        reason: String,
    },

    /// Config file contains invalid TOML syntax or unknown keys.
    #[error("Invalid TOML in {path}: {reason}")]
    ParseError {
        /// Path with invalid TOML.
        path: PathBuf,
        /// Parse error details.
        reason: String,
    },
}

/// TOML configuration file structure.
///
/// All fields are optional - if not specified, hardcoded defaults are used.
/// Corresponds to `~/.config/voucher-lens/config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Host the engine activates on.
    #[serde(default)]
    pub target_host: Option<String>,

    /// Origin of the wallets and packages endpoints.
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Cache lifetime in seconds.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    /// Per-request timeout in milliseconds.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Page size requested from the wallets endpoint.
    #[serde(default)]
    pub wallet_page_size: Option<u32>,

    /// `stage` filter of the wallets endpoint.
    #[serde(default)]
    pub wallet_stage: Option<u32>,

    /// Package ids requested from the packages endpoint.
    #[serde(default)]
    pub package_ids: Option<Vec<i64>>,

    /// Backstop poll period in milliseconds.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,

    /// Delay between a click and its route check, in milliseconds.
    #[serde(default)]
    pub click_settle_ms: Option<u64>,

    /// Wait before the first expense bill fetch, in milliseconds.
    #[serde(default)]
    pub initial_settle_ms: Option<u64>,

    /// How long badge rendering waits for model cards, in milliseconds.
    #[serde(default)]
    pub card_wait_timeout_ms: Option<u64>,

    /// Preferred description language.
    #[serde(default)]
    pub primary_language: Option<String>,

    /// Description language used when the preferred one is missing.
    #[serde(default)]
    pub fallback_language: Option<String>,

    /// Path to log file for tracing output.
    #[serde(default)]
    pub log_file_path: Option<PathBuf>,

    /// Path of the persisted key-value store.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

/// Resolved configuration after applying precedence rules.
///
/// Created by merging defaults, config file, and env vars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Host the engine activates on.
    pub target_host: String,
    /// Origin of both endpoints.
    pub api_base_url: String,
    /// Cache lifetime in seconds.
    pub cache_ttl_secs: u64,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Wallets page size.
    pub wallet_page_size: u32,
    /// Wallets stage filter.
    pub wallet_stage: u32,
    /// Requested package ids.
    pub package_ids: Vec<i64>,
    /// Poll period in milliseconds.
    pub poll_interval_ms: u64,
    /// Post-click delay in milliseconds.
    pub click_settle_ms: u64,
    /// Expense bill settle delay in milliseconds.
    pub initial_settle_ms: u64,
    /// Card wait window in milliseconds.
    pub card_wait_timeout_ms: u64,
    /// Preferred description language.
    pub primary_language: String,
    /// Fallback description language.
    pub fallback_language: String,
    /// Path to log file for tracing output.
    pub log_file_path: PathBuf,
    /// Path of the persisted key-value store.
    pub store_path: PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            target_host: DEFAULT_TARGET_HOST.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cache_ttl_secs: 300,
            request_timeout_ms: 10_000,
            wallet_page_size: 10_000,
            wallet_stage: 3,
            package_ids: (0..=10).collect(),
            poll_interval_ms: 500,
            click_settle_ms: 100,
            initial_settle_ms: 1_500,
            card_wait_timeout_ms: 10_000,
            primary_language: "zh-cn".to_string(),
            fallback_language: "en-us".to_string(),
            log_file_path: default_log_path(),
            store_path: default_store_path(),
        }
    }
}

impl ResolvedConfig {
    /// Gateway endpoint settings.
    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            api_base_url: self.api_base_url.clone(),
            wallet_page_size: self.wallet_page_size,
            wallet_stage: self.wallet_stage,
            package_ids: self.package_ids.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }

    /// Page handler settings.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            initial_settle: Duration::from_millis(self.initial_settle_ms),
            card_wait_timeout: Duration::from_millis(self.card_wait_timeout_ms),
            languages: LanguagePrefs::new(&self.primary_language, &self.fallback_language),
        }
    }

    /// Backstop poll period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Post-click check delay.
    pub fn click_delay(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }
}

/// Resolve default log file path.
///
/// Returns `~/.local/state/voucher-lens/voucher-lens.log` on Linux, or the
/// platform equivalent. Falls back to the current directory when no state
/// directory exists.
pub fn default_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        state_dir.join(APP_DIR).join("voucher-lens.log")
    } else {
        PathBuf::from("voucher-lens.log")
    }
}

/// Resolve default store path.
///
/// Returns `~/.local/share/voucher-lens/store.json` on Linux, or the platform
/// equivalent. Falls back to the current directory.
pub fn default_store_path() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join(APP_DIR).join("store.json")
    } else {
        PathBuf::from("store.json")
    }
}

/// Load configuration file from a specific path.
///
/// Returns `Ok(None)` if file doesn't exist (not an error - use defaults).
///
/// # Errors
///
/// Returns error if file exists but has read or parse errors.
pub fn load_config_file(path: impl Into<PathBuf>) -> Result<Option<ConfigFile>, ConfigError> {
    let path = path.into();

    if path.as_os_str().is_empty() {
        return Err(ConfigError::InvalidPath("empty path".to_string()));
    }

    // Missing file is not an error - use defaults
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let config: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    Ok(Some(config))
}

/// Resolve default config file path.
///
/// Returns `~/.config/voucher-lens/config.toml` on Linux, appropriate path on
/// other platforms. Returns `None` if no config directory can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Load configuration with precedence handling.
///
/// Precedence (highest to lowest):
/// 1. Explicit `config_path` argument
/// 2. `VOUCHER_LENS_CONFIG` environment variable
/// 3. Default path `~/.config/voucher-lens/config.toml`
///
/// Missing config files are NOT errors - defaults are used.
///
/// # Errors
///
/// Returns error only if a config file exists but cannot be read or parsed.
pub fn load_config_with_precedence(
    config_path: Option<PathBuf>,
) -> Result<Option<ConfigFile>, ConfigError> {
    if let Some(path) = config_path {
        return load_config_file(path);
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return load_config_file(PathBuf::from(env_path));
    }

    if let Some(default_path) = default_config_path() {
        return load_config_file(default_path);
    }

    Ok(None)
}

/// Apply environment variable overrides to resolved config.
///
/// Checks for:
/// - `VOUCHER_LENS_TARGET_HOST`: Override target host
/// - `VOUCHER_LENS_API_BASE_URL`: Override API origin
///
/// Empty values are ignored.
pub fn apply_env_overrides(mut config: ResolvedConfig) -> ResolvedConfig {
    if let Some(host) = non_empty_env(TARGET_HOST_ENV) {
        config.target_host = host;
    }
    if let Some(base) = non_empty_env(API_BASE_URL_ENV) {
        config.api_base_url = base;
    }
    config
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Merge config file into defaults to create resolved config.
///
/// For each field in `ConfigFile`, if `Some(value)`, use it; otherwise use default.
/// `poll_interval_ms` and `request_timeout_ms` of zero also use the default.
pub fn merge_config(config_file: Option<ConfigFile>) -> ResolvedConfig {
    let defaults = ResolvedConfig::default();

    let Some(config) = config_file else {
        return defaults;
    };

    ResolvedConfig {
        target_host: config.target_host.unwrap_or(defaults.target_host),
        api_base_url: config.api_base_url.unwrap_or(defaults.api_base_url),
        cache_ttl_secs: config.cache_ttl_secs.unwrap_or(defaults.cache_ttl_secs),
        request_timeout_ms: non_zero_or(
            "request_timeout_ms",
            config.request_timeout_ms,
            defaults.request_timeout_ms,
        ),
        wallet_page_size: config.wallet_page_size.unwrap_or(defaults.wallet_page_size),
        wallet_stage: config.wallet_stage.unwrap_or(defaults.wallet_stage),
        package_ids: config.package_ids.unwrap_or(defaults.package_ids),
        poll_interval_ms: non_zero_or(
            "poll_interval_ms",
            config.poll_interval_ms,
            defaults.poll_interval_ms,
        ),
        click_settle_ms: config.click_settle_ms.unwrap_or(defaults.click_settle_ms),
        initial_settle_ms: config
            .initial_settle_ms
            .unwrap_or(defaults.initial_settle_ms),
        card_wait_timeout_ms: config
            .card_wait_timeout_ms
            .unwrap_or(defaults.card_wait_timeout_ms),
        primary_language: config.primary_language.unwrap_or(defaults.primary_language),
        fallback_language: config
            .fallback_language
            .unwrap_or(defaults.fallback_language),
        log_file_path: config.log_file_path.unwrap_or(defaults.log_file_path),
        store_path: config.store_path.unwrap_or(defaults.store_path),
    }
}

/// `value` unless it is zero; zero periods and timeouts fall back to `default`.
fn non_zero_or(key: &str, value: Option<u64>, default: u64) -> u64 {
    match value {
        Some(0) => {
            tracing::warn!(key, default, "Zero is not a valid value, using default");
            default
        }
        Some(value) => value,
        None => default,
    }
}

/// Full resolution: file by precedence, merged over defaults, then env overrides.
///
/// # Errors
///
/// Returns error only if a config file exists but cannot be read or parsed.
pub fn resolve_config(config_path: Option<PathBuf>) -> Result<ResolvedConfig, ConfigError> {
    let file = load_config_with_precedence(config_path)?;
    Ok(apply_env_overrides(merge_config(file)))
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
