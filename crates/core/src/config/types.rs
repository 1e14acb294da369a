use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::sequencer::SequencerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub qbittorrent: QBittorrentConfig,
    #[serde(default)]
    pub sequencer: SequencerConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// qBittorrent Web UI connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Web UI URL (e.g., "http://localhost:8080")
    #[serde(default = "default_url")]
    pub url: String,
    /// Web UI username
    #[serde(default)]
    pub username: String,
    /// Web UI password
    #[serde(default)]
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for QBittorrentConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Read-only status API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    9090
}

/// Sanitized config for logs and API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub qbittorrent: SanitizedQBittorrentConfig,
    pub sequencer: SequencerConfig,
    pub api: ApiConfig,
}

/// Sanitized qBittorrent config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedQBittorrentConfig {
    pub url: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            qbittorrent: SanitizedQBittorrentConfig {
                url: config.qbittorrent.url.clone(),
                username: config.qbittorrent.username.clone(),
                password_configured: !config.qbittorrent.password.is_empty(),
                timeout_secs: config.qbittorrent.timeout_secs,
            },
            sequencer: config.sequencer.clone(),
            api: config.api.clone(),
        }
    }
}
