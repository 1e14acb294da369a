//! Connection supervisor.
//!
//! Owns the authenticated session to the torrent client and exposes the
//! capability set the sequencer needs. Callers never deal with logins: every
//! capability call logs in first when the session is down, and any
//! connection-class failure flips the supervisor back to
//! [`ConnectionState::Disconnected`] before the error is handed back.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::metrics;
use crate::torrent_client::{TorrentClient, TorrentClientError, TorrentInfo};

/// Session state tracked by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Reconnect-capable session around a [`TorrentClient`].
pub struct ConnectionSupervisor {
    client: Arc<dyn TorrentClient>,
    clock: Arc<dyn Clock>,
    retry_interval: Duration,
    state: RwLock<ConnectionState>,
}

impl ConnectionSupervisor {
    /// Create a supervisor. No login is attempted until [`connect`](Self::connect)
    /// or the first capability call.
    pub fn new(
        client: Arc<dyn TorrentClient>,
        clock: Arc<dyn Clock>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            client,
            clock,
            retry_interval,
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    /// Backend name of the wrapped client.
    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Attempt to log in.
    ///
    /// On failure the error is logged and the call waits one retry interval
    /// before returning it; retrying is up to the caller.
    pub async fn connect(&self) -> Result<(), TorrentClientError> {
        match self.client.login().await {
            Ok(()) => {
                *self.state.write().await = ConnectionState::Connected;
                metrics::CONNECT_ATTEMPTS.with_label_values(&["success"]).inc();
                info!("Successfully connected to {}", self.client.name());
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                metrics::CONNECT_ATTEMPTS.with_label_values(&["failure"]).inc();
                warn!("Failed to connect to {}: {}", self.client.name(), e);
                self.clock.sleep(self.retry_interval).await;
                Err(e)
            }
        }
    }

    /// Drop the current session and log in again.
    pub async fn reconnect(&self) -> Result<(), TorrentClientError> {
        self.mark_disconnected().await;
        self.connect().await
    }

    /// Forget the current session; the next call logs in again.
    pub async fn mark_disconnected(&self) {
        let mut state = self.state.write().await;
        if *state == ConnectionState::Connected {
            debug!("Connection to {} marked as lost", self.client.name());
        }
        *state = ConnectionState::Disconnected;
    }

    /// Log in without waiting if the session is down.
    async fn ensure_connected(&self) -> Result<(), TorrentClientError> {
        if self.state().await == ConnectionState::Connected {
            return Ok(());
        }

        self.client.login().await?;
        *self.state.write().await = ConnectionState::Connected;
        metrics::CONNECT_ATTEMPTS.with_label_values(&["success"]).inc();
        info!("Connected to {}", self.client.name());
        Ok(())
    }

    /// Flip to disconnected when `result` says the session is gone.
    async fn observe<T>(
        &self,
        result: Result<T, TorrentClientError>,
    ) -> Result<T, TorrentClientError> {
        if let Err(e) = &result {
            if e.is_connection_error() || e.is_auth_error() {
                self.mark_disconnected().await;
            }
        }
        result
    }

    pub async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let result = match self.ensure_connected().await {
            Ok(()) => self.client.list_torrents().await,
            Err(e) => Err(e),
        };
        self.observe(result).await
    }

    pub async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        let result = match self.ensure_connected().await {
            Ok(()) => self.client.get_torrent(hash).await,
            Err(e) => Err(e),
        };
        self.observe(result).await
    }

    pub async fn pause(&self, hash: &str) -> Result<(), TorrentClientError> {
        let result = match self.ensure_connected().await {
            Ok(()) => self.client.pause_torrent(hash).await,
            Err(e) => Err(e),
        };
        self.observe(result).await
    }

    pub async fn pause_all(&self) -> Result<(), TorrentClientError> {
        let result = match self.ensure_connected().await {
            Ok(()) => self.client.pause_all().await,
            Err(e) => Err(e),
        };
        self.observe(result).await
    }

    pub async fn resume(&self, hash: &str) -> Result<(), TorrentClientError> {
        let result = match self.ensure_connected().await {
            Ok(()) => self.client.resume_torrent(hash).await,
            Err(e) => Err(e),
        };
        self.observe(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, InstantClock, MockTorrentClient, RecordedCall};
    use crate::torrent_client::TorrentState;

    fn supervisor(
        client: &Arc<MockTorrentClient>,
        clock: &Arc<InstantClock>,
    ) -> ConnectionSupervisor {
        ConnectionSupervisor::new(
            Arc::clone(client) as Arc<dyn TorrentClient>,
            Arc::clone(clock) as Arc<dyn Clock>,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_connect_success() {
        let client = Arc::new(MockTorrentClient::new());
        let clock = Arc::new(InstantClock::new());
        let supervisor = supervisor(&client, &clock);

        assert_eq!(supervisor.state().await, ConnectionState::Disconnected);
        supervisor.connect().await.unwrap();
        assert_eq!(supervisor.state().await, ConnectionState::Connected);
        assert!(clock.sleeps().await.is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_waits_one_interval() {
        let client = Arc::new(MockTorrentClient::new());
        let clock = Arc::new(InstantClock::new());
        let supervisor = supervisor(&client, &clock);

        client
            .fail_logins(1, TorrentClientError::AuthenticationFailed("bad".into()))
            .await;

        let result = supervisor.connect().await;
        assert!(matches!(
            result,
            Err(TorrentClientError::AuthenticationFailed(_))
        ));
        assert_eq!(supervisor.state().await, ConnectionState::Disconnected);
        assert_eq!(clock.sleeps().await, vec![Duration::from_secs(5)]);

        // Caller retries; supervisor does not loop on its own.
        supervisor.connect().await.unwrap();
        assert_eq!(client.login_count().await, 2);
    }

    #[tokio::test]
    async fn test_capability_call_logs_in_lazily() {
        let client = Arc::new(MockTorrentClient::new());
        let clock = Arc::new(InstantClock::new());
        let supervisor = supervisor(&client, &clock);

        client
            .add_mock_torrent(fixtures::torrent("aa", TorrentState::Uploading, 10))
            .await;

        let torrents = supervisor.list_torrents().await.unwrap();
        assert_eq!(torrents.len(), 1);
        assert_eq!(client.login_count().await, 1);
        assert_eq!(supervisor.state().await, ConnectionState::Connected);

        supervisor.list_torrents().await.unwrap();
        assert_eq!(client.login_count().await, 1);
    }

    #[tokio::test]
    async fn test_connection_error_marks_disconnected() {
        let client = Arc::new(MockTorrentClient::new());
        let clock = Arc::new(InstantClock::new());
        let supervisor = supervisor(&client, &clock);

        supervisor.connect().await.unwrap();
        client
            .set_next_error(TorrentClientError::ConnectionFailed("refused".into()))
            .await;

        let err = supervisor.pause_all().await.unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(supervisor.state().await, ConnectionState::Disconnected);

        // Next call re-authenticates before doing work.
        supervisor.pause_all().await.unwrap();
        assert_eq!(client.login_count().await, 2);
        assert_eq!(
            client.calls().await,
            vec![RecordedCall::PauseAll, RecordedCall::PauseAll]
        );
    }

    #[tokio::test]
    async fn test_pause_logs_in_lazily_and_drops_lost_session() {
        let client = Arc::new(MockTorrentClient::new());
        let clock = Arc::new(InstantClock::new());
        let supervisor = supervisor(&client, &clock);
        client
            .add_mock_torrent(fixtures::torrent("aa", TorrentState::Uploading, 1))
            .await;

        supervisor.pause("aa").await.unwrap();
        assert_eq!(client.login_count().await, 1);
        assert_eq!(supervisor.state().await, ConnectionState::Connected);
        assert_eq!(client.state_of("aa").await, Some(TorrentState::PausedUp));

        client
            .set_next_error(TorrentClientError::ConnectionFailed("reset".into()))
            .await;
        let err = supervisor.pause("aa").await.unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(supervisor.state().await, ConnectionState::Disconnected);
        assert_eq!(
            client.calls().await,
            vec![
                RecordedCall::Pause("aa".into()),
                RecordedCall::Pause("aa".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_operation_error_keeps_session() {
        let client = Arc::new(MockTorrentClient::new());
        let clock = Arc::new(InstantClock::new());
        let supervisor = supervisor(&client, &clock);

        supervisor.connect().await.unwrap();
        let err = supervisor.resume("missing").await.unwrap_err();
        assert!(matches!(err, TorrentClientError::TorrentNotFound(_)));
        assert_eq!(supervisor.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_reconnect_relogs_in() {
        let client = Arc::new(MockTorrentClient::new());
        let clock = Arc::new(InstantClock::new());
        let supervisor = supervisor(&client, &clock);

        supervisor.connect().await.unwrap();
        supervisor.reconnect().await.unwrap();
        assert_eq!(client.login_count().await, 2);
        assert_eq!(supervisor.state().await, ConnectionState::Connected);
    }
}
