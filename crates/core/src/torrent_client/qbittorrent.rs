//! qBittorrent torrent client implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::QBittorrentConfig;

use super::{TorrentClient, TorrentClientError, TorrentInfo, TorrentState};

/// Torrent actions whose endpoint was renamed in qBittorrent 5.
#[derive(Debug, Clone, Copy)]
enum TorrentAction {
    Pause,
    Resume,
}

impl TorrentAction {
    fn legacy_endpoint(self) -> &'static str {
        match self {
            TorrentAction::Pause => "/api/v2/torrents/pause",
            TorrentAction::Resume => "/api/v2/torrents/resume",
        }
    }

    fn current_endpoint(self) -> &'static str {
        match self {
            TorrentAction::Pause => "/api/v2/torrents/stop",
            TorrentAction::Resume => "/api/v2/torrents/start",
        }
    }
}

/// qBittorrent Web API client.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Whether the cookie jar holds a live session (cleared on 403).
    authenticated: RwLock<bool>,
    /// Set once the server answered 404 to pause/resume (qBittorrent >= 5).
    use_stop_start: AtomicBool,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client. Does not contact the server.
    pub fn new(config: QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| {
                TorrentClientError::ApiError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            config,
            authenticated: RwLock::new(false),
            use_stop_start: AtomicBool::new(false),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url(), endpoint)
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        if *self.authenticated.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Send a request built by `build`, re-authenticating once if the
    /// session has expired.
    async fn send<F>(&self, build: F) -> Result<Response, TorrentClientError>
    where
        F: Fn() -> RequestBuilder,
    {
        self.ensure_authenticated().await?;

        let response = build().send().await.map_err(map_transport_error)?;
        if response.status() != StatusCode::FORBIDDEN {
            return Ok(response);
        }

        warn!("qBittorrent session expired, re-authenticating");
        *self.authenticated.write().await = false;
        self.login().await?;

        build().send().await.map_err(map_transport_error)
    }

    /// Make an authenticated GET request.
    async fn get(&self, endpoint: &str) -> Result<String, TorrentClientError> {
        let url = self.url(endpoint);
        let response = self.send(|| self.client.get(&url)).await?;
        read_body(response).await
    }

    /// Pause or resume the given hashes (`all` for every torrent).
    async fn torrent_action(
        &self,
        action: TorrentAction,
        hashes: &str,
    ) -> Result<(), TorrentClientError> {
        let params = [("hashes", hashes)];

        if !self.use_stop_start.load(Ordering::Relaxed) {
            let url = self.url(action.legacy_endpoint());
            let response = self
                .send(|| self.client.post(&url).form(&params))
                .await?;
            if response.status() != StatusCode::NOT_FOUND {
                read_body(response).await?;
                return Ok(());
            }
            info!("qBittorrent has no {:?} endpoint, switching to stop/start", action);
            self.use_stop_start.store(true, Ordering::Relaxed);
        }

        let url = self.url(action.current_endpoint());
        let response = self
            .send(|| self.client.post(&url).form(&params))
            .await?;
        read_body(response).await?;
        Ok(())
    }
}

/// Classify a reqwest transport failure.
fn map_transport_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() || e.is_request() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

async fn read_body(response: Response) -> Result<String, TorrentClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
    }
    response.text().await.map_err(map_transport_error)
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    progress: f64,
    size: i64,
}

impl QBTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        TorrentInfo {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: TorrentState::from_api(&self.state),
            progress: self.progress.clamp(0.0, 1.0),
            size_bytes: self.size.max(0) as u64,
        }
    }
}

fn parse_torrent_list(body: &str) -> Result<Vec<TorrentInfo>, TorrentClientError> {
    let torrents: Vec<QBTorrentInfo> = serde_json::from_str(body)
        .map_err(|e| TorrentClientError::ApiError(format!("Failed to parse response: {}", e)))?;
    Ok(torrents.into_iter().map(|t| t.into_torrent_info()).collect())
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn login(&self) -> Result<(), TorrentClientError> {
        let url = self.url("/api/v2/auth/login");

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            *self.authenticated.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let response = self.get("/api/v2/torrents/info").await?;
        parse_torrent_list(&response)
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        let endpoint = format!("/api/v2/torrents/info?hashes={}", hash.to_lowercase());
        let response = self.get(&endpoint).await?;

        parse_torrent_list(&response)?
            .into_iter()
            .next()
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    async fn pause_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.torrent_action(TorrentAction::Pause, &hash.to_lowercase())
            .await
    }

    async fn pause_all(&self) -> Result<(), TorrentClientError> {
        self.torrent_action(TorrentAction::Pause, "all").await
    }

    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.torrent_action(TorrentAction::Resume, &hash.to_lowercase())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qb_torrent_info_conversion() {
        let qb_info = QBTorrentInfo {
            hash: "ABC123".to_string(),
            name: "Test Torrent".to_string(),
            state: "checkingResumeData".to_string(),
            progress: 0.5,
            size: 1000000,
        };

        let info = qb_info.into_torrent_info();
        assert_eq!(info.hash, "abc123"); // lowercase
        assert_eq!(info.name, "Test Torrent");
        assert_eq!(info.state, TorrentState::CheckingResumeData);
        assert!((info.progress - 0.5).abs() < 0.001);
        assert_eq!(info.size_bytes, 1000000);
    }

    #[test]
    fn test_negative_size_clamped() {
        let qb_info = QBTorrentInfo {
            hash: "abc".to_string(),
            name: "Magnet without metadata".to_string(),
            state: "metaDL".to_string(),
            progress: 0.0,
            size: -1,
        };
        assert_eq!(qb_info.into_torrent_info().size_bytes, 0);
    }

    #[test]
    fn test_parse_torrent_list_ignores_extra_fields() {
        let body = r#"[
            {"hash":"AA","name":"one","state":"pausedUP","progress":1.0,"size":10,"ratio":2.5},
            {"hash":"bb","name":"two","state":"checkingDL","progress":0.25,"size":20,"category":""}
        ]"#;
        let torrents = parse_torrent_list(body).unwrap();
        assert_eq!(torrents.len(), 2);
        assert_eq!(torrents[0].hash, "aa");
        assert_eq!(torrents[0].state, TorrentState::PausedUp);
        assert_eq!(torrents[1].state, TorrentState::CheckingDl);
    }

    #[test]
    fn test_parse_torrent_list_rejects_garbage() {
        let err = parse_torrent_list("<html>Forbidden</html>").unwrap_err();
        assert!(matches!(err, TorrentClientError::ApiError(_)));
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let client = QBittorrentClient::new(QBittorrentConfig {
            url: "http://localhost:8080/".to_string(),
            username: "admin".to_string(),
            password: "adminadmin".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.url("/api/v2/torrents/info"), "http://localhost:8080/api/v2/torrents/info");
    }
}
