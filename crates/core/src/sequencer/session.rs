//! A single pause-all, check-one-by-one, restore cycle.

use std::cmp::Ordering;

use crate::snapshot::{classify, Snapshot};
use crate::torrent_client::TorrentInfo;

/// Work for one tick that found checking torrents.
///
/// Holds the snapshot taken before any pause so restoration never depends
/// on states observed while sequencing.
#[derive(Debug, Clone)]
pub struct SequencingSession {
    snapshot: Snapshot,
    queue: Vec<TorrentInfo>,
}

/// Smallest first, then by hash so equal sizes always come out in the same order.
fn check_order(a: &TorrentInfo, b: &TorrentInfo) -> Ordering {
    a.size_bytes
        .cmp(&b.size_bytes)
        .then_with(|| a.hash.cmp(&b.hash))
}

impl SequencingSession {
    /// Start a session, or `None` if nothing in the snapshot is checking.
    pub fn start(snapshot: Snapshot) -> Option<Self> {
        let mut queue: Vec<TorrentInfo> = classify(&snapshot)
            .checking
            .into_iter()
            .cloned()
            .collect();

        if queue.is_empty() {
            return None;
        }
        queue.sort_by(check_order);

        Some(Self { snapshot, queue })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Checking torrents in the order they will be checked.
    pub fn queue(&self) -> &[TorrentInfo] {
        &self.queue
    }

    /// Torrents to resume once sequencing is over: everything that was not
    /// paused when the snapshot was taken.
    pub fn restore_targets(&self) -> Vec<&TorrentInfo> {
        classify(&self.snapshot).active
    }
}
