use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for structured environment overrides, e.g. `QSEQUENCER_QBITTORRENT__URL`.
pub const ENV_PREFIX: &str = "QSEQUENCER_";

/// Load configuration from an optional TOML file with environment variable overrides.
///
/// Precedence, lowest first: file, bare `URL`/`USERNAME`/`PASSWORD`/`UPDATE_INTERVAL`,
/// `QSEQUENCER_`-prefixed variables.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::new();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(bare_env())
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Unprefixed variables understood for container deployments.
fn bare_env() -> Env {
    Env::raw()
        .only(&["URL", "USERNAME", "PASSWORD", "UPDATE_INTERVAL"])
        .map(|key| match key.as_str().to_ascii_lowercase().as_str() {
            "url" => "qbittorrent.url".into(),
            "username" => "qbittorrent.username".into(),
            "password" => "qbittorrent.password".into(),
            "update_interval" => "sequencer.poll_interval_secs".into(),
            other => other.to_string().into(),
        })
}
