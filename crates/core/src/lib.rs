pub mod clock;
pub mod config;
pub mod metrics;
pub mod scheduler;
pub mod sequencer;
pub mod snapshot;
pub mod supervisor;
pub mod testing;
pub mod torrent_client;

pub use clock::{Clock, TokioClock};
pub use config::{
    load_config, load_config_from_str, validate_config, ApiConfig, Config, ConfigError,
    QBittorrentConfig, SanitizedConfig,
};
pub use scheduler::TickScheduler;
pub use sequencer::{
    EventCallback, Sequencer, SequencerConfig, SequencerError, SequencerEvent, SequencerPhase,
    SequencerStatus, SequencingSession, TickOutcome, TorrentProgress,
};
pub use snapshot::{classify, Classification, Snapshot};
pub use supervisor::{ConnectionState, ConnectionSupervisor};
pub use torrent_client::{
    QBittorrentClient, TorrentClient, TorrentClientError, TorrentInfo, TorrentState,
};
