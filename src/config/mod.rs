//! Configuration loading.
//!
//! Settings come from hardcoded defaults, an optional TOML file and a pair of
//! environment overrides, in increasing precedence.

pub mod loader;

pub use loader::{
    apply_env_overrides, default_config_path, default_log_path, default_store_path,
    load_config_file, load_config_with_precedence, merge_config, resolve_config, ConfigError,
    ConfigFile, ResolvedConfig,
};
