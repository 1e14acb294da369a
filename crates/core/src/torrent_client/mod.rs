//! Torrent client abstraction.
//!
//! This module provides the `TorrentClient` trait, the capability set the
//! sequencer drives, and its qBittorrent Web API implementation.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;
