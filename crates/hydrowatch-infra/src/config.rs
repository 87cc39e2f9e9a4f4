//! Configuration loader for Hydrowatch.
//!
//! Reads `config.toml` and deserializes it into [`HydrowatchConfig`]. Falls
//! back to defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use hydrowatch_types::config::HydrowatchConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "HYDROWATCH_CONFIG";

/// `~/.hydrowatch/config.toml`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".hydrowatch").join("config.toml"))
}

/// Pick the config file to read.
///
/// Priority:
/// 1. An explicit path (the `--config` flag)
/// 2. `$HYDROWATCH_CONFIG`
/// 3. `~/.hydrowatch/config.toml`
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    resolve_with_env(explicit, std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}

fn resolve_with_env(explicit: Option<&Path>, from_env: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or(from_env)
        .or_else(default_config_path)
}

/// Load configuration from `path`.
///
/// - No path, or the file does not exist: [`HydrowatchConfig::default()`].
/// - The file exists but cannot be read or parsed: logs a warning and
///   returns the default.
pub async fn load_config(path: Option<&Path>) -> HydrowatchConfig {
    let Some(config_path) = path else {
        return HydrowatchConfig::default();
    };

    let content = match tokio::fs::read_to_string(config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            return HydrowatchConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return HydrowatchConfig::default();
        }
    };

    match toml::from_str::<HydrowatchConfig>(&content) {
        Ok(config) => {
            tracing::debug!("Loaded config from {}", config_path.display());
            config
        }
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            HydrowatchConfig::default()
        }
    }
}
