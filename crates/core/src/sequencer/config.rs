//! Sequencer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the sequencing engine and its scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// Seconds between ticks, between status polls of the torrent being
    /// checked, and before retrying a failed login.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds to wait after resuming a torrent before its first poll.
    /// qBittorrent does not switch a resumed torrent to checking instantly.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_settle_delay() -> u64 {
    5
}

impl SequencerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            settle_delay_secs: default_settle_delay(),
        }
    }
}
