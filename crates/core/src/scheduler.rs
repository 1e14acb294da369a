//! Periodic tick driver.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::metrics;
use crate::sequencer::{Sequencer, TickOutcome};
use crate::supervisor::ConnectionSupervisor;

/// Runs [`Sequencer::run_tick`] forever, one tick per interval.
///
/// A failed tick is logged and the loop carries on; nothing a tick does can
/// end the process.
pub struct TickScheduler {
    sequencer: Arc<Sequencer>,
    supervisor: Arc<ConnectionSupervisor>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl TickScheduler {
    pub fn new(
        sequencer: Arc<Sequencer>,
        supervisor: Arc<ConnectionSupervisor>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            sequencer,
            supervisor,
            clock,
            interval,
        }
    }

    /// Run a single tick, absorbing any failure.
    pub async fn tick_once(&self) -> Option<TickOutcome> {
        match self.sequencer.run_tick().await {
            Ok(outcome) => {
                let label = match outcome {
                    TickOutcome::Idle => "idle",
                    TickOutcome::Sequenced { .. } => "sequenced",
                };
                metrics::TICKS_TOTAL.with_label_values(&[label]).inc();
                Some(outcome)
            }
            Err(e) => {
                metrics::TICKS_TOTAL.with_label_values(&["failed"]).inc();
                if e.is_connection_error() {
                    warn!(
                        "Cannot reach {}: {}. Reconnecting next tick",
                        self.supervisor.client_name(),
                        e
                    );
                } else if e.is_auth_error() {
                    warn!(
                        "Login to {} rejected: {}. Retrying next tick",
                        self.supervisor.client_name(),
                        e
                    );
                } else {
                    error!("Tick failed: {}", e);
                }
                None
            }
        }
    }

    /// Tick until `shutdown` resolves.
    ///
    /// Shutdown during a session stops further checks but lets restoration
    /// finish, so torrents are not left paused.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        info!(
            "Sequencer started (interval {}s, client {})",
            self.interval.as_secs(),
            self.supervisor.client_name()
        );

        // An unreachable client at startup is not fatal; ticks keep retrying.
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested before first tick");
                return;
            }
            _ = self.supervisor.connect() => {}
        }

        loop {
            let tick = self.tick_once();
            tokio::pin!(tick);

            tokio::select! {
                outcome = &mut tick => {
                    debug!("Tick finished: {:?}", outcome);
                }
                _ = &mut shutdown => {
                    info!("Shutdown requested, finishing current tick");
                    self.sequencer.request_stop();
                    tick.await;
                    break;
                }
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = self.clock.sleep(self.interval) => {}
            }
        }

        info!("Sequencer stopped");
    }
}
