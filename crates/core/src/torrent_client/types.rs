//! Types for torrent client operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Clone, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

impl TorrentClientError {
    /// Whether the error means the service could not be reached at all.
    ///
    /// Callers treat these as a severed session: reconnect, then retry the
    /// same operation.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            TorrentClientError::ConnectionFailed(_) | TorrentClientError::Timeout
        )
    }

    /// Whether the service rejected our credentials or session.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, TorrentClientError::AuthenticationFailed(_))
    }
}

/// State of a torrent, as reported by qBittorrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TorrentState {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "missingFiles")]
    MissingFiles,
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "pausedUP")]
    PausedUp,
    #[serde(rename = "stoppedUP")]
    StoppedUp,
    #[serde(rename = "queuedUP")]
    QueuedUp,
    #[serde(rename = "stalledUP")]
    StalledUp,
    #[serde(rename = "checkingUP")]
    CheckingUp,
    #[serde(rename = "forcedUP")]
    ForcedUp,
    #[serde(rename = "allocating")]
    Allocating,
    #[serde(rename = "downloading")]
    Downloading,
    #[serde(rename = "metaDL")]
    MetaDl,
    #[serde(rename = "forcedMetaDL")]
    ForcedMetaDl,
    #[serde(rename = "pausedDL")]
    PausedDl,
    #[serde(rename = "stoppedDL")]
    StoppedDl,
    #[serde(rename = "queuedDL")]
    QueuedDl,
    #[serde(rename = "stalledDL")]
    StalledDl,
    #[serde(rename = "checkingDL")]
    CheckingDl,
    #[serde(rename = "forcedDL")]
    ForcedDl,
    #[serde(rename = "checkingResumeData")]
    CheckingResumeData,
    #[serde(rename = "checking")]
    Checking,
    #[serde(rename = "moving")]
    Moving,
    #[serde(rename = "unknown")]
    Unknown,
}

impl TorrentState {
    /// Returns the qBittorrent API string for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Error => "error",
            TorrentState::MissingFiles => "missingFiles",
            TorrentState::Uploading => "uploading",
            TorrentState::PausedUp => "pausedUP",
            TorrentState::StoppedUp => "stoppedUP",
            TorrentState::QueuedUp => "queuedUP",
            TorrentState::StalledUp => "stalledUP",
            TorrentState::CheckingUp => "checkingUP",
            TorrentState::ForcedUp => "forcedUP",
            TorrentState::Allocating => "allocating",
            TorrentState::Downloading => "downloading",
            TorrentState::MetaDl => "metaDL",
            TorrentState::ForcedMetaDl => "forcedMetaDL",
            TorrentState::PausedDl => "pausedDL",
            TorrentState::StoppedDl => "stoppedDL",
            TorrentState::QueuedDl => "queuedDL",
            TorrentState::StalledDl => "stalledDL",
            TorrentState::CheckingDl => "checkingDL",
            TorrentState::ForcedDl => "forcedDL",
            TorrentState::CheckingResumeData => "checkingResumeData",
            TorrentState::Checking => "checking",
            TorrentState::Moving => "moving",
            TorrentState::Unknown => "unknown",
        }
    }

    /// Parse a qBittorrent API state string. Unrecognised values map to `Unknown`.
    pub fn from_api(state: &str) -> Self {
        match state {
            "error" => TorrentState::Error,
            "missingFiles" => TorrentState::MissingFiles,
            "uploading" => TorrentState::Uploading,
            "pausedUP" => TorrentState::PausedUp,
            "stoppedUP" => TorrentState::StoppedUp,
            "queuedUP" => TorrentState::QueuedUp,
            "stalledUP" => TorrentState::StalledUp,
            "checkingUP" => TorrentState::CheckingUp,
            "forcedUP" => TorrentState::ForcedUp,
            "allocating" => TorrentState::Allocating,
            "downloading" => TorrentState::Downloading,
            "metaDL" => TorrentState::MetaDl,
            "forcedMetaDL" => TorrentState::ForcedMetaDl,
            "pausedDL" => TorrentState::PausedDl,
            "stoppedDL" => TorrentState::StoppedDl,
            "queuedDL" => TorrentState::QueuedDl,
            "stalledDL" => TorrentState::StalledDl,
            "checkingDL" => TorrentState::CheckingDl,
            "forcedDL" => TorrentState::ForcedDl,
            "checkingResumeData" => TorrentState::CheckingResumeData,
            "checking" => TorrentState::Checking,
            "moving" => TorrentState::Moving,
            _ => TorrentState::Unknown,
        }
    }

    /// Paused by the user or by us. qBittorrent 5 reports these as "stopped".
    pub fn is_paused(&self) -> bool {
        matches!(
            self,
            TorrentState::PausedUp
                | TorrentState::PausedDl
                | TorrentState::StoppedUp
                | TorrentState::StoppedDl
        )
    }

    /// Verifying on-disk data against the expected piece hashes.
    pub fn is_checking(&self) -> bool {
        matches!(
            self,
            TorrentState::CheckingUp
                | TorrentState::CheckingDl
                | TorrentState::CheckingResumeData
                | TorrentState::Checking
        )
    }
}

impl<'de> Deserialize<'de> for TorrentState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(TorrentState::from_api(&raw))
    }
}

impl std::fmt::Display for TorrentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Information about a torrent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    /// Torrent name.
    pub name: String,
    /// Current state.
    pub state: TorrentState,
    /// Progress of the current download or check (0.0 - 1.0).
    pub progress: f64,
    /// Total size in bytes.
    pub size_bytes: u64,
}

/// Trait for torrent client backends.
///
/// This is the full capability set the sequencer needs; it never adds,
/// removes or edits torrents.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Authenticate against the service.
    async fn login(&self) -> Result<(), TorrentClientError>;

    /// List all torrents known to the service.
    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError>;

    /// Get a specific torrent by hash.
    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError>;

    /// Pause a torrent.
    async fn pause_torrent(&self, hash: &str) -> Result<(), TorrentClientError>;

    /// Pause every torrent.
    async fn pause_all(&self) -> Result<(), TorrentClientError>;

    /// Resume a torrent. Resuming a running torrent is a no-op.
    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError>;
}
