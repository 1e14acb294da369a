//! Sequencing engine.
//!
//! Each tick snapshots the torrent list. When anything is checking, the
//! engine pauses everything, resumes the checking torrents one at a time
//! (smallest first) and waits for each to finish before moving on, then
//! resumes whatever was running before it intervened.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::metrics;
use crate::snapshot::Snapshot;
use crate::supervisor::ConnectionSupervisor;
use crate::torrent_client::{TorrentClientError, TorrentInfo};

use super::config::SequencerConfig;
use super::session::SequencingSession;
use super::types::{
    EventCallback, SequencerError, SequencerEvent, SequencerPhase, SequencerStatus, TickOutcome,
    TorrentProgress,
};

/// Why a torrent was resumed; used as the failure metric label.
#[derive(Debug, Clone, Copy)]
enum ResumeKind {
    Check,
    Restore,
}

impl ResumeKind {
    fn label(self) -> &'static str {
        match self {
            ResumeKind::Check => "resume",
            ResumeKind::Restore => "restore",
        }
    }
}

fn session_lost(e: &TorrentClientError) -> bool {
    e.is_connection_error() || e.is_auth_error()
}

/// Serializes torrent checks through a [`ConnectionSupervisor`].
pub struct Sequencer {
    config: SequencerConfig,
    supervisor: Arc<ConnectionSupervisor>,
    clock: Arc<dyn Clock>,
    status: RwLock<SequencerStatus>,
    event_callback: Option<EventCallback>,
    stop_requested: AtomicBool,
}

impl Sequencer {
    pub fn new(
        config: SequencerConfig,
        supervisor: Arc<ConnectionSupervisor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            supervisor,
            clock,
            status: RwLock::new(SequencerStatus::default()),
            event_callback: None,
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Set a callback invoked for every [`SequencerEvent`].
    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub async fn status(&self) -> SequencerStatus {
        self.status.read().await.clone()
    }

    /// Ask a running session to wrap up.
    ///
    /// Remaining checks are skipped and the session goes straight to
    /// restoration. Restoration itself still runs, but gives up on resumes
    /// that need a reconnect.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn emit(&self, event: SequencerEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(&event);
        }
    }

    /// Run one tick.
    ///
    /// Only the initial torrent listing can fail the tick. Once a session has
    /// started, individual failures are logged and the session always runs
    /// through restoration.
    pub async fn run_tick(&self) -> Result<TickOutcome, SequencerError> {
        let torrents = self.supervisor.list_torrents().await?;
        let snapshot = Snapshot::new(torrents, self.clock.now());
        self.status.write().await.last_tick_at = Some(snapshot.captured_at());

        let Some(session) = SequencingSession::start(snapshot) else {
            debug!("No torrents in 'checking' state");
            self.emit(SequencerEvent::NoCheckingTorrents);
            return Ok(TickOutcome::Idle);
        };

        Ok(self.run_session(session).await)
    }

    async fn run_session(&self, session: SequencingSession) -> TickOutcome {
        let total = session.queue().len();
        metrics::SESSIONS_TOTAL.inc();
        info!(
            "Found {} torrents in 'checking' state out of {}",
            total,
            session.snapshot().len()
        );
        self.emit(SequencerEvent::CheckingFound { count: total });

        self.set_phase(SequencerPhase::Draining, total).await;
        self.drain().await;

        self.set_phase(SequencerPhase::Sequencing, total).await;
        let mut checked = 0;
        for (idx, torrent) in session.queue().iter().enumerate() {
            if self.stop_requested() {
                info!(
                    "Stop requested, skipping {} remaining checks",
                    total - idx
                );
                break;
            }
            self.status.write().await.queued = total - idx - 1;
            if self.check_one(torrent, idx + 1, total).await {
                checked += 1;
            }
        }

        self.set_phase(SequencerPhase::Restoring, 0).await;
        let restored = self.restore(&session).await;

        {
            let mut status = self.status.write().await;
            status.phase = SequencerPhase::Idle;
            status.current = None;
            status.queued = 0;
            status.sessions_completed += 1;
        }
        info!(
            "Sequencing session completed: {} checked, {} restored",
            checked, restored
        );
        self.emit(SequencerEvent::SessionCompleted { checked, restored });

        TickOutcome::Sequenced { checked, restored }
    }

    async fn set_phase(&self, phase: SequencerPhase, queued: usize) {
        let mut status = self.status.write().await;
        status.phase = phase;
        status.queued = queued;
    }

    /// Pause everything. A failure is logged and the session carries on.
    async fn drain(&self) {
        match self.supervisor.pause_all().await {
            Ok(()) => {
                info!("All torrents have been paused");
                self.emit(SequencerEvent::AllPaused);
            }
            Err(e) => {
                metrics::OPERATION_FAILURES
                    .with_label_values(&["pause_all"])
                    .inc();
                warn!("Error pausing torrents: {}", e);
            }
        }
    }

    /// Resume `torrent` and wait until it is no longer checking.
    ///
    /// Returns `false` if the check was cut short by a stop request or the
    /// torrent disappeared; only finished checks are counted.
    async fn check_one(&self, torrent: &TorrentInfo, position: usize, total: usize) -> bool {
        info!(
            "Checking torrent {}/{}: '{}' ({} bytes)",
            position, total, torrent.name, torrent.size_bytes
        );
        self.resume(torrent, ResumeKind::Check).await;
        if self.stop_requested() {
            return false;
        }

        metrics::CHECK_IN_PROGRESS.set(1);
        let started_at = self.clock.now();

        self.clock.sleep(self.config.settle_delay()).await;
        let finished = self.wait_for_check(torrent, position, total).await;
        metrics::CHECK_IN_PROGRESS.set(0);

        let mut status = self.status.write().await;
        status.current = None;
        if finished {
            let elapsed = (self.clock.now() - started_at)
                .to_std()
                .unwrap_or_default();
            metrics::TORRENTS_CHECKED.inc();
            metrics::CHECK_DURATION.observe(elapsed.as_secs_f64());
            status.torrents_checked += 1;
        }
        finished
    }

    /// Poll until `torrent` reports a non-checking state, returning `true`
    /// once it does.
    ///
    /// There is no upper bound on the wait: large torrents legitimately
    /// check for hours.
    async fn wait_for_check(&self, torrent: &TorrentInfo, position: usize, total: usize) -> bool {
        loop {
            if self.stop_requested() {
                info!("Stop requested, no longer waiting on '{}'", torrent.name);
                return false;
            }

            match self.supervisor.get_torrent(&torrent.hash).await {
                Ok(info) => {
                    let progress = TorrentProgress::new(&info, position, total);
                    self.status.write().await.current = Some(progress.clone());
                    debug!(
                        "'{}' is {} ({:.2}%)",
                        info.name,
                        info.state,
                        info.progress * 100.0
                    );
                    self.emit(SequencerEvent::Progress(progress));

                    if !info.state.is_checking() {
                        info!("Torrent '{}' finished checking ({})", info.name, info.state);
                        self.emit(SequencerEvent::CheckFinished {
                            hash: info.hash,
                            name: info.name,
                            state: info.state,
                        });
                        return true;
                    }
                    self.clock.sleep(self.config.poll_interval()).await;
                }
                Err(TorrentClientError::TorrentNotFound(_)) => {
                    warn!(
                        "Torrent '{}' disappeared while checking, moving on",
                        torrent.name
                    );
                    return false;
                }
                Err(e) if session_lost(&e) => {
                    warn!(
                        "Lost connection while polling '{}': {}. Reconnecting",
                        torrent.name, e
                    );
                    // A failed reconnect already waited one retry interval.
                    let _ = self.supervisor.reconnect().await;
                }
                Err(e) => {
                    metrics::OPERATION_FAILURES.with_label_values(&["poll"]).inc();
                    warn!("Failed to poll '{}': {}", torrent.name, e);
                    self.clock.sleep(self.config.poll_interval()).await;
                }
            }
        }
    }

    /// Resume every torrent that was running before the session started.
    async fn restore(&self, session: &SequencingSession) -> usize {
        let targets = session.restore_targets();
        info!(
            "Unpausing {} torrents that were not originally paused",
            targets.len()
        );
        self.emit(SequencerEvent::Restoring {
            count: targets.len(),
        });

        let mut restored = 0;
        for torrent in targets {
            if self.resume(torrent, ResumeKind::Restore).await {
                restored += 1;
            }
        }
        restored
    }

    /// Resume a single torrent, reconnecting and retrying while the session
    /// is down. Other failures are logged and skipped.
    async fn resume(&self, torrent: &TorrentInfo, kind: ResumeKind) -> bool {
        loop {
            match self.supervisor.resume(&torrent.hash).await {
                Ok(()) => {
                    info!("Torrent '{}' resumed", torrent.name);
                    self.emit(SequencerEvent::TorrentResumed {
                        hash: torrent.hash.clone(),
                        name: torrent.name.clone(),
                    });
                    return true;
                }
                Err(e) if session_lost(&e) && !self.stop_requested() => {
                    warn!(
                        "Lost connection while resuming '{}': {}. Reconnecting",
                        torrent.name, e
                    );
                    let _ = self.supervisor.reconnect().await;
                }
                Err(e) => {
                    metrics::OPERATION_FAILURES
                        .with_label_values(&[kind.label()])
                        .inc();
                    warn!("Error resuming torrent '{}': {}", torrent.name, e);
                    return false;
                }
            }
        }
    }
}
