//! Fake qBittorrent Web API for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use qsequencer_core::QBittorrentConfig;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "adminadmin";

#[derive(Debug, Clone)]
pub struct FakeTorrent {
    pub hash: String,
    pub name: String,
    pub state: String,
    pub progress: f64,
    pub size: i64,
}

impl FakeTorrent {
    pub fn new(hash: &str, state: &str, size: i64) -> Self {
        Self {
            hash: hash.to_string(),
            name: format!("Torrent {}", hash),
            state: state.to_string(),
            progress: 1.0,
            size,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    torrents: Vec<FakeTorrent>,
    /// Serve only the qBittorrent 5 stop/start endpoints.
    modern: bool,
    session: u32,
    logins: usize,
    /// (path, hashes) of every pause/resume/stop/start request.
    actions: Vec<(String, String)>,
}

/// Shared handle to the fake server's state.
#[derive(Clone, Default)]
pub struct FakeQbit {
    inner: Arc<Mutex<Inner>>,
}

impl FakeQbit {
    pub fn new(torrents: Vec<FakeTorrent>) -> Self {
        let fake = Self::default();
        fake.inner.lock().unwrap().torrents = torrents;
        fake
    }

    pub fn modern(self) -> Self {
        self.inner.lock().unwrap().modern = true;
        self
    }

    pub fn logins(&self) -> usize {
        self.inner.lock().unwrap().logins
    }

    pub fn actions(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().actions.clone()
    }

    pub fn state_of(&self, hash: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .torrents
            .iter()
            .find(|t| t.hash == hash)
            .map(|t| t.state.clone())
    }

    /// Invalidate the current session cookie.
    pub fn expire_session(&self) {
        self.inner.lock().unwrap().session += 1;
    }

    /// Start serving on an ephemeral port.
    pub async fn serve(&self) -> SocketAddr {
        let app = Router::new()
            .route("/api/v2/auth/login", post(login))
            .route("/api/v2/torrents/info", get(info))
            .route("/api/v2/torrents/pause", post(pause))
            .route("/api/v2/torrents/resume", post(resume))
            .route("/api/v2/torrents/stop", post(stop))
            .route("/api/v2/torrents/start", post(start))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

pub fn client_config(addr: SocketAddr) -> QBittorrentConfig {
    QBittorrentConfig {
        url: format!("http://{}", addr),
        username: USERNAME.to_string(),
        password: PASSWORD.to_string(),
        timeout_secs: 5,
    }
}

fn session_cookie(session: u32) -> String {
    format!("SID=session-{}", session)
}

fn authorized(fake: &FakeQbit, headers: &HeaderMap) -> bool {
    let expected = session_cookie(fake.inner.lock().unwrap().session);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .any(|c| c.trim() == expected)
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(State(fake): State<FakeQbit>, Form(form): Form<LoginForm>) -> Response {
    let mut inner = fake.inner.lock().unwrap();
    inner.logins += 1;
    if form.username != USERNAME || form.password != PASSWORD {
        return (StatusCode::OK, "Fails.").into_response();
    }
    let cookie = format!("{}; HttpOnly; path=/", session_cookie(inner.session));
    ([(header::SET_COOKIE, cookie)], "Ok.").into_response()
}

async fn info(
    State(fake): State<FakeQbit>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&fake, &headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let inner = fake.inner.lock().unwrap();
    let torrents: Vec<_> = inner
        .torrents
        .iter()
        .filter(|t| match query.get("hashes") {
            Some(hashes) => hashes.split('|').any(|h| h == t.hash),
            None => true,
        })
        .map(|t| {
            json!({
                "hash": t.hash,
                "name": t.name,
                "state": t.state,
                "progress": t.progress,
                "size": t.size,
                "ratio": 1.5,
            })
        })
        .collect();
    Json(torrents).into_response()
}

#[derive(Deserialize)]
struct HashesForm {
    hashes: String,
}

fn apply(fake: &FakeQbit, path: &str, hashes: &str, pausing: bool) {
    let mut inner = fake.inner.lock().unwrap();
    inner.actions.push((path.to_string(), hashes.to_string()));
    let modern = inner.modern;
    for torrent in inner.torrents.iter_mut() {
        if hashes != "all" && !hashes.split('|').any(|h| h == torrent.hash) {
            continue;
        }
        torrent.state = match (pausing, modern) {
            (true, false) => "pausedUP",
            (true, true) => "stoppedUP",
            (false, _) => "uploading",
        }
        .to_string();
    }
}

async fn action(
    fake: FakeQbit,
    headers: HeaderMap,
    hashes: String,
    path: &str,
    pausing: bool,
    modern_endpoint: bool,
) -> Response {
    if !authorized(&fake, &headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if fake.inner.lock().unwrap().modern != modern_endpoint {
        return StatusCode::NOT_FOUND.into_response();
    }
    apply(&fake, path, &hashes, pausing);
    StatusCode::OK.into_response()
}

async fn pause(
    State(fake): State<FakeQbit>,
    headers: HeaderMap,
    Form(form): Form<HashesForm>,
) -> Response {
    action(fake, headers, form.hashes, "pause", true, false).await
}

async fn resume(
    State(fake): State<FakeQbit>,
    headers: HeaderMap,
    Form(form): Form<HashesForm>,
) -> Response {
    action(fake, headers, form.hashes, "resume", false, false).await
}

async fn stop(
    State(fake): State<FakeQbit>,
    headers: HeaderMap,
    Form(form): Form<HashesForm>,
) -> Response {
    action(fake, headers, form.hashes, "stop", true, true).await
}

async fn start(
    State(fake): State<FakeQbit>,
    headers: HeaderMap,
    Form(form): Form<HashesForm>,
) -> Response {
    action(fake, headers, form.hashes, "start", false, true).await
}
