//! Point-in-time torrent snapshots and their classification.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::torrent_client::TorrentInfo;

/// Torrent list captured from a single query to the service.
///
/// Immutable once built: it is the record of which torrents were running
/// before the sequencer intervened.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    torrents: Vec<TorrentInfo>,
    captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(torrents: Vec<TorrentInfo>, captured_at: DateTime<Utc>) -> Self {
        Self {
            torrents,
            captured_at,
        }
    }

    pub fn torrents(&self) -> &[TorrentInfo] {
        &self.torrents
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.torrents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.is_empty()
    }
}

/// Result of [`classify`]: `checking` is a subsequence of `active`.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification<'a> {
    /// Torrents not in a paused state, in snapshot order.
    pub active: Vec<&'a TorrentInfo>,
    /// Active torrents currently verifying data, in snapshot order.
    pub checking: Vec<&'a TorrentInfo>,
}

/// Partition a snapshot into active and checking torrents.
pub fn classify(snapshot: &Snapshot) -> Classification<'_> {
    let active: Vec<&TorrentInfo> = snapshot
        .torrents()
        .iter()
        .filter(|t| !t.state.is_paused())
        .collect();

    let checking = active
        .iter()
        .copied()
        .filter(|t| t.state.is_checking())
        .collect();

    Classification { active, checking }
}
