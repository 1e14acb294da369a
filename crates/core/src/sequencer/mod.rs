//! Checking-torrent sequencer.
//!
//! qBittorrent verifies every torrent that needs it at once, which thrashes
//! the disk. The sequencer pauses everything, runs one check at a time and
//! then puts the other torrents back the way they were.

mod config;
mod engine;
mod session;
mod types;

pub use config::SequencerConfig;
pub use engine::Sequencer;
pub use session::SequencingSession;
pub use types::{
    EventCallback, SequencerError, SequencerEvent, SequencerPhase, SequencerStatus, TickOutcome,
    TorrentProgress,
};
