//! Mock torrent client for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::torrent_client::{TorrentClient, TorrentClientError, TorrentInfo, TorrentState};

/// A recorded capability call for test assertions. Logins are counted
/// separately, see [`MockTorrentClient::login_count`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    ListTorrents,
    GetTorrent(String),
    Pause(String),
    PauseAll,
    Resume(String),
}

/// Mock implementation of the TorrentClient trait.
///
/// Provides controllable behavior for testing:
/// - Record every call in order for assertions
/// - Script the states a torrent reports on successive polls
/// - Inject failures for the next call, a specific call, or logins
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.add_mock_torrent(fixtures::torrent("aa", TorrentState::CheckingUp, 10)).await;
///
/// // Two polls still checking, then done
/// client.script_states("aa", [TorrentState::CheckingUp, TorrentState::CheckingUp, TorrentState::Uploading]).await;
///
/// // Fail the next poll of "aa" as if qBittorrent went away
/// client.fail_call(RecordedCall::GetTorrent("aa".into()), TorrentClientError::Timeout).await;
/// ```
#[derive(Debug, Default)]
pub struct MockTorrentClient {
    /// Torrents in insertion order.
    torrents: Arc<RwLock<Vec<TorrentInfo>>>,
    /// States to report on successive `get_torrent` calls, by hash.
    scripts: Arc<RwLock<HashMap<String, VecDeque<TorrentState>>>>,
    /// Every capability call, in order.
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    /// Number of login attempts.
    logins: Arc<RwLock<usize>>,
    /// If set, the next capability call fails with this error.
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
    /// One-shot failures for specific calls.
    call_failures: Arc<RwLock<Vec<(RecordedCall, TorrentClientError)>>>,
    /// Remaining failing logins and the error they return.
    login_failures: Arc<RwLock<Option<(usize, TorrentClientError)>>>,
}

impl MockTorrentClient {
    /// Create a new mock torrent client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a torrent.
    pub async fn add_mock_torrent(&self, info: TorrentInfo) {
        self.torrents.write().await.push(info);
    }

    /// Current state of a torrent, if it exists.
    pub async fn state_of(&self, hash: &str) -> Option<TorrentState> {
        self.torrents
            .read()
            .await
            .iter()
            .find(|t| t.hash == hash)
            .map(|t| t.state)
    }

    /// Remove a torrent, as if a user deleted it.
    pub async fn remove_mock_torrent(&self, hash: &str) {
        self.torrents.write().await.retain(|t| t.hash != hash);
    }

    /// Script the states reported by successive `get_torrent` calls for `hash`.
    ///
    /// Each poll applies the next scripted state; once the script runs out
    /// the torrent keeps its last state.
    pub async fn script_states(
        &self,
        hash: &str,
        states: impl IntoIterator<Item = TorrentState>,
    ) {
        self.scripts
            .write()
            .await
            .insert(hash.to_string(), states.into_iter().collect());
    }

    /// Configure the next capability call to fail with the given error.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    /// Fail the next call equal to `call` once.
    pub async fn fail_call(&self, call: RecordedCall, error: TorrentClientError) {
        self.call_failures.write().await.push((call, error));
    }

    /// Fail the next `count` logins.
    pub async fn fail_logins(&self, count: usize, error: TorrentClientError) {
        *self.login_failures.write().await = Some((count, error));
    }

    /// All recorded capability calls.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Recorded resume calls, in order.
    pub async fn resumed(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Resume(hash) => Some(hash.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of pause/resume calls of any kind.
    pub async fn mutation_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    RecordedCall::Pause(_) | RecordedCall::PauseAll | RecordedCall::Resume(_)
                )
            })
            .count()
    }

    /// Number of login attempts, successful or not.
    pub async fn login_count(&self) -> usize {
        *self.logins.read().await
    }

    /// Record a call and return the error injected for it, if any.
    async fn record(&self, call: RecordedCall) -> Result<(), TorrentClientError> {
        self.calls.write().await.push(call.clone());

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        let mut failures = self.call_failures.write().await;
        if let Some(idx) = failures.iter().position(|(c, _)| *c == call) {
            let (_, err) = failures.remove(idx);
            return Err(err);
        }
        Ok(())
    }
}

fn paused_state(torrent: &TorrentInfo) -> TorrentState {
    if torrent.progress >= 1.0 {
        TorrentState::PausedUp
    } else {
        TorrentState::PausedDl
    }
}

fn running_state(torrent: &TorrentInfo) -> TorrentState {
    if torrent.progress >= 1.0 {
        TorrentState::Uploading
    } else {
        TorrentState::Downloading
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn login(&self) -> Result<(), TorrentClientError> {
        *self.logins.write().await += 1;

        let mut failures = self.login_failures.write().await;
        if let Some((remaining, err)) = failures.as_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(err.clone());
            }
        }
        Ok(())
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        self.record(RecordedCall::ListTorrents).await?;
        Ok(self.torrents.read().await.clone())
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        self.record(RecordedCall::GetTorrent(hash.to_string()))
            .await?;

        let next_state = self
            .scripts
            .write()
            .await
            .get_mut(hash)
            .and_then(|script| script.pop_front());

        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .iter_mut()
            .find(|t| t.hash == hash)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;

        if let Some(state) = next_state {
            torrent.state = state;
        }
        Ok(torrent.clone())
    }

    async fn pause_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.record(RecordedCall::Pause(hash.to_string())).await?;

        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .iter_mut()
            .find(|t| t.hash == hash)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;
        torrent.state = paused_state(torrent);
        Ok(())
    }

    async fn pause_all(&self) -> Result<(), TorrentClientError> {
        self.record(RecordedCall::PauseAll).await?;

        for torrent in self.torrents.write().await.iter_mut() {
            torrent.state = paused_state(torrent);
        }
        Ok(())
    }

    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.record(RecordedCall::Resume(hash.to_string())).await?;

        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .iter_mut()
            .find(|t| t.hash == hash)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;
        if torrent.state.is_paused() {
            torrent.state = running_state(torrent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let client = MockTorrentClient::new();
        client
            .add_mock_torrent(fixtures::torrent("zz", TorrentState::Uploading, 1))
            .await;
        client
            .add_mock_torrent(fixtures::torrent("aa", TorrentState::Uploading, 2))
            .await;

        let hashes: Vec<String> = client
            .list_torrents()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.hash)
            .collect();
        assert_eq!(hashes, vec!["zz", "aa"]);
    }

    #[tokio::test]
    async fn test_scripted_states() {
        let client = MockTorrentClient::new();
        client
            .add_mock_torrent(fixtures::torrent("aa", TorrentState::CheckingUp, 1))
            .await;
        client
            .script_states("aa", [TorrentState::CheckingUp, TorrentState::Uploading])
            .await;

        assert_eq!(
            client.get_torrent("aa").await.unwrap().state,
            TorrentState::CheckingUp
        );
        assert_eq!(
            client.get_torrent("aa").await.unwrap().state,
            TorrentState::Uploading
        );
        // Script exhausted: state sticks.
        assert_eq!(
            client.get_torrent("aa").await.unwrap().state,
            TorrentState::Uploading
        );
    }

    #[tokio::test]
    async fn test_pause_resume() {
        let client = MockTorrentClient::new();
        client
            .add_mock_torrent(fixtures::torrent("seed", TorrentState::Uploading, 1))
            .await;
        let mut leech = fixtures::torrent("leech", TorrentState::Downloading, 1);
        leech.progress = 0.3;
        client.add_mock_torrent(leech).await;

        client.pause_all().await.unwrap();
        assert_eq!(client.state_of("seed").await, Some(TorrentState::PausedUp));
        assert_eq!(client.state_of("leech").await, Some(TorrentState::PausedDl));

        client.resume_torrent("leech").await.unwrap();
        assert_eq!(
            client.state_of("leech").await,
            Some(TorrentState::Downloading)
        );
        assert_eq!(client.resumed().await, vec!["leech"]);
        assert_eq!(client.mutation_count().await, 2);
    }

    #[tokio::test]
    async fn test_error_injection() {
        let client = MockTorrentClient::new();

        client
            .set_next_error(TorrentClientError::ConnectionFailed("test".into()))
            .await;
        assert!(client.list_torrents().await.is_err());

        // Error should be consumed
        assert!(client.list_torrents().await.is_ok());
    }

    #[tokio::test]
    async fn test_call_specific_failure() {
        let client = MockTorrentClient::new();
        client
            .add_mock_torrent(fixtures::torrent("aa", TorrentState::Uploading, 1))
            .await;
        client
            .fail_call(
                RecordedCall::Resume("aa".into()),
                TorrentClientError::ApiError("HTTP 500".into()),
            )
            .await;

        client.pause_all().await.unwrap();
        assert!(client.resume_torrent("aa").await.is_err());
        assert!(client.resume_torrent("aa").await.is_ok());
        assert_eq!(client.resumed().await, vec!["aa", "aa"]);
    }

    #[tokio::test]
    async fn test_login_failures() {
        let client = MockTorrentClient::new();
        client.fail_logins(2, TorrentClientError::Timeout).await;

        assert!(client.login().await.is_err());
        assert!(client.login().await.is_err());
        assert!(client.login().await.is_ok());
        assert_eq!(client.login_count().await, 3);
    }

    #[tokio::test]
    async fn test_missing_torrent() {
        let client = MockTorrentClient::new();
        let err = client.get_torrent("nope").await.unwrap_err();
        assert!(matches!(err, TorrentClientError::TorrentNotFound(_)));
    }
}
