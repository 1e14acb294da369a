//! Types for the sequencing engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::torrent_client::{TorrentClientError, TorrentInfo, TorrentState};

/// Errors that abort a tick.
#[derive(Debug, Error)]
pub enum SequencerError {
    /// Torrent client error.
    #[error("torrent client error: {0}")]
    TorrentClient(#[from] TorrentClientError),
}

impl SequencerError {
    /// Whether the tick failed because the torrent client was unreachable.
    pub fn is_connection_error(&self) -> bool {
        match self {
            SequencerError::TorrentClient(e) => e.is_connection_error(),
        }
    }

    /// Whether the tick failed because the client rejected our login.
    pub fn is_auth_error(&self) -> bool {
        match self {
            SequencerError::TorrentClient(e) => e.is_auth_error(),
        }
    }
}

/// What a completed tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// No torrent was checking; nothing was touched.
    Idle,
    /// A sequencing session ran.
    Sequenced {
        /// Torrents whose check ran to completion, one at a time.
        checked: usize,
        /// Torrents successfully resumed during restoration.
        restored: usize,
    },
}

/// Phase of the sequencing state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerPhase {
    #[default]
    Idle,
    Draining,
    Sequencing,
    Restoring,
}

/// Point-in-time view of the torrent currently being checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TorrentProgress {
    pub hash: String,
    pub name: String,
    pub size_bytes: u64,
    pub state: TorrentState,
    /// Check progress (0.0 - 1.0).
    pub progress: f64,
    /// 1-based position in this session's queue.
    pub position: usize,
    /// Number of torrents in this session's queue.
    pub total: usize,
}

impl TorrentProgress {
    pub fn new(info: &TorrentInfo, position: usize, total: usize) -> Self {
        Self {
            hash: info.hash.clone(),
            name: info.name.clone(),
            size_bytes: info.size_bytes,
            state: info.state,
            progress: info.progress,
            position,
            total,
        }
    }
}

/// Events emitted by the sequencer for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequencerEvent {
    /// A tick found nothing to do.
    NoCheckingTorrents,
    /// A session is starting.
    CheckingFound { count: usize },
    /// Pause-all succeeded.
    AllPaused,
    /// A torrent was resumed, either to run its check or during restoration.
    TorrentResumed { hash: String, name: String },
    /// One status poll of the torrent being checked.
    Progress(TorrentProgress),
    /// The torrent being checked left the checking state.
    CheckFinished {
        hash: String,
        name: String,
        state: TorrentState,
    },
    /// Restoration is starting.
    Restoring { count: usize },
    /// The session is over.
    SessionCompleted { checked: usize, restored: usize },
}

/// Callback invoked for each sequencer event.
pub type EventCallback = Arc<dyn Fn(&SequencerEvent) + Send + Sync>;

/// Current status of the sequencer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SequencerStatus {
    pub phase: SequencerPhase,
    /// Torrent currently being checked, as of its last poll.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<TorrentProgress>,
    /// Torrents still waiting for their turn in this session.
    pub queued: usize,
    /// When the last snapshot was captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_at: Option<DateTime<Utc>>,
    pub sessions_completed: u64,
    pub torrents_checked: u64,
}
