//! Testing utilities and mock implementations.
//!
//! This module provides a mock torrent client and a non-blocking clock,
//! allowing the sequencer to be exercised end to end without a real
//! qBittorrent instance or real delays.
//!
//! # Example
//!
//! ```rust,ignore
//! use qsequencer_core::testing::{fixtures, InstantClock, MockTorrentClient};
//!
//! let client = MockTorrentClient::new();
//! client.add_mock_torrent(fixtures::torrent("aa", TorrentState::CheckingUp, 10)).await;
//! client.script_states("aa", [TorrentState::Uploading]).await;
//!
//! let clock = InstantClock::new();
//! // Build a ConnectionSupervisor and Sequencer around them...
//! ```

mod instant_clock;
mod mock_torrent_client;

pub use instant_clock::InstantClock;
pub use mock_torrent_client::{MockTorrentClient, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::torrent_client::{TorrentInfo, TorrentState};

    /// Create a test torrent with reasonable defaults.
    ///
    /// Progress is 1.0 so pausing and resuming toggles between the
    /// upload-side states.
    pub fn torrent(hash: &str, state: TorrentState, size_bytes: u64) -> TorrentInfo {
        TorrentInfo {
            hash: hash.to_string(),
            name: format!("Torrent {}", hash),
            state,
            progress: 1.0,
            size_bytes,
        }
    }
}
