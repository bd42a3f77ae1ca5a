// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process mock of the recipe backend for integration tests.
//!
//! Serves the auth endpoints, `/users/me` and `/recipes` on `127.0.0.1:0`
//! and records every request it sees.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use recipe_session::transport::RETRY_MARKER_HEADER;
use recipe_session::ClientConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const GOOD_ID_TOKEN: &str = "good-id-token";
pub const PROFILE_ID: u64 = 42;

/// What `POST /auth/reissue` answers with.
#[derive(Debug, Clone)]
pub enum ReissueMode {
    /// Issue `access` (and `refresh`, if set) and start accepting `access`.
    Issue { access: String, refresh: Option<String>, expires_in: u64 },
    /// Fail with this status.
    Reject(u16),
    /// 200 with a body that is not a token response.
    Garbage,
}

/// A request as seen by the backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub retry_marker: bool,
}

pub struct BackendState {
    valid_tokens: Mutex<HashSet<String>>,
    reject_all: AtomicBool,
    reissue_mode: Mutex<ReissueMode>,
    reissue_delay: Mutex<Duration>,
    reissue_calls: AtomicU32,
    last_refresh_token: Mutex<Option<String>>,
    logout_status: Mutex<u16>,
    logout_calls: AtomicU32,
    requests: Mutex<Vec<Recorded>>,
}

impl BackendState {
    fn new() -> Self {
        Self {
            valid_tokens: Mutex::new(HashSet::new()),
            reject_all: AtomicBool::new(false),
            reissue_mode: Mutex::new(ReissueMode::Issue {
                access: "a2".into(),
                refresh: Some("r2".into()),
                expires_in: 3600,
            }),
            reissue_delay: Mutex::new(Duration::ZERO),
            reissue_calls: AtomicU32::new(0),
            last_refresh_token: Mutex::new(None),
            logout_status: Mutex::new(204),
            logout_calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn accepts(&self, headers: &HeaderMap) -> bool {
        if self.reject_all.load(Ordering::SeqCst) {
            return false;
        }
        bearer(headers).is_some_and(|t| self.valid_tokens.lock().contains(t))
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
}

impl MockBackend {
    pub async fn start() -> anyhow::Result<Self> {
        recipe_session::ensure_crypto_provider();
        let state = Arc::new(BackendState::new());

        let app = Router::new()
            .route("/auth/social-login", post(social_login))
            .route("/auth/reissue", post(reissue))
            .route("/auth/logout", delete(logout))
            .route("/auth/ping", get(|| async { StatusCode::UNAUTHORIZED }))
            .route("/users/me", get(profile))
            .route("/recipes", get(list_recipes).post(create_recipe))
            .route("/boom", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
            .layer(middleware::from_fn_with_state(Arc::clone(&state), record))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self { addr, state })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_base_url(self.url())
    }

    /// Accept `token` as a valid bearer.
    pub fn accept(&self, token: &str) {
        self.state.valid_tokens.lock().insert(token.to_owned());
    }

    /// Forget every issued token.
    pub fn revoke_all(&self) {
        self.state.valid_tokens.lock().clear();
    }

    /// Answer 401 on protected routes whatever the bearer.
    pub fn reject_all(&self, on: bool) {
        self.state.reject_all.store(on, Ordering::SeqCst);
    }

    pub fn set_reissue(&self, mode: ReissueMode) {
        *self.state.reissue_mode.lock() = mode;
    }

    pub fn set_reissue_delay(&self, delay: Duration) {
        *self.state.reissue_delay.lock() = delay;
    }

    pub fn set_logout_status(&self, status: u16) {
        *self.state.logout_status.lock() = status;
    }

    pub fn reissue_calls(&self) -> u32 {
        self.state.reissue_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> u32 {
        self.state.logout_calls.load(Ordering::SeqCst)
    }

    pub fn last_refresh_token(&self) -> Option<String> {
        self.state.last_refresh_token.lock().clone()
    }

    /// Requests recorded for `path`, in arrival order.
    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.state.requests.lock().iter().filter(|r| r.path == path).cloned().collect()
    }
}

/// An address nothing listens on.
pub fn closed_addr() -> anyhow::Result<SocketAddr> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn record(State(state): State<Arc<BackendState>>, req: Request, next: Next) -> Response {
    let headers = req.headers();
    let entry = Recorded {
        method: req.method().to_string(),
        path: req.uri().path().to_owned(),
        authorization: headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        retry_marker: headers.contains_key(RETRY_MARKER_HEADER),
    };
    state.requests.lock().push(entry);
    next.run(req).await
}

async fn social_login(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    if body["idToken"] != GOOD_ID_TOKEN {
        return (StatusCode::UNAUTHORIZED, "invalid id token").into_response();
    }
    state.valid_tokens.lock().insert("a1".to_owned());
    Json(json!({
        "accessToken": "a1",
        "refreshToken": "r1",
        "expiresIn": 3600,
        "isNewUser": false
    }))
    .into_response()
}

async fn reissue(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.reissue_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_refresh_token.lock() = body["refreshToken"].as_str().map(str::to_owned);

    let delay = *state.reissue_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mode = state.reissue_mode.lock().clone();
    match mode {
        ReissueMode::Issue { access, refresh, expires_in } => {
            state.valid_tokens.lock().insert(access.clone());
            let mut resp = json!({ "accessToken": access, "expiresIn": expires_in });
            if let Some(refresh) = refresh {
                resp["refreshToken"] = json!(refresh);
            }
            Json(resp).into_response()
        }
        ReissueMode::Reject(status) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::UNAUTHORIZED);
            (status, "refresh token rejected").into_response()
        }
        ReissueMode::Garbage => (StatusCode::OK, "not json").into_response(),
    }
}

async fn logout(State(state): State<Arc<BackendState>>) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    let status = *state.logout_status.lock();
    StatusCode::from_u16(status).unwrap_or(StatusCode::NO_CONTENT).into_response()
}

async fn profile(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !state.accepts(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "id": PROFILE_ID, "username": "cook", "profileImageUrl": null })).into_response()
}

async fn list_recipes(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !state.accepts(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "items": [{ "id": 1, "title": "soup" }] })).into_response()
}

async fn create_recipe(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !state.accepts(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    (StatusCode::CREATED, Json(json!({ "id": 2, "title": body["title"] }))).into_response()
}
