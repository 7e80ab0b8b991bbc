// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process stand-in for the document service's auth endpoints.
//!
//! Binds a real listener on an ephemeral port so requests travel through
//! reqwest exactly as they would in production.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use dms_session::storage::{DurableStorage, MemoryStorage};
use dms_session::test_support::{mint_token, ManualClock};
use dms_session::token::decode_claims;
use dms_session::{Clock, Session, SessionConfig, SessionEvent};

pub const PASSWORD: &str = "secret";

/// How `/auth/refresh` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// New access token plus a rotated refresh token.
    Rotate,
    /// 200 with a body that carries no access token.
    NoAccessToken,
    /// Non-2xx status.
    Fail(u16),
}

pub struct Backend {
    pub base_url: String,
    pub clock: Arc<ManualClock>,
    /// Lifetime of issued access tokens, in seconds.
    pub token_ttl_secs: AtomicI64,
    pub refresh_mode: Mutex<RefreshMode>,
    pub refresh_delay_ms: AtomicU64,
    pub logout_status: Mutex<u16>,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub document_calls: AtomicUsize,
    pub refresh_bodies: Mutex<Vec<Value>>,
    /// Bearer tokens seen by `/auth/refresh`, in arrival order.
    pub refresh_bearers: Mutex<Vec<Option<String>>>,
    pub logout_bodies: Mutex<Vec<Value>>,
    /// Bearer tokens seen by `/documents`, in arrival order.
    pub document_tokens: Mutex<Vec<Option<String>>>,
    seq: AtomicU64,
}

impl Backend {
    pub async fn spawn() -> anyhow::Result<Arc<Self>> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let backend = Arc::new(Self {
            base_url: format!("http://{addr}/api"),
            clock: Arc::new(ManualClock::default()),
            token_ttl_secs: AtomicI64::new(900),
            refresh_mode: Mutex::new(RefreshMode::Rotate),
            refresh_delay_ms: AtomicU64::new(0),
            logout_status: Mutex::new(200),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            document_calls: AtomicUsize::new(0),
            refresh_bodies: Mutex::new(Vec::new()),
            refresh_bearers: Mutex::new(Vec::new()),
            logout_bodies: Mutex::new(Vec::new()),
            document_tokens: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        });

        let router = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/logout", post(logout))
            .route("/api/documents", get(documents))
            .route("/api/admin/audit", get(always_unauthorized))
            .with_state(Arc::clone(&backend));
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(backend)
    }

    pub fn config(&self) -> SessionConfig {
        SessionConfig { request_timeout_ms: 5000, ..SessionConfig::with_api_url(&self.base_url) }
    }

    /// A session on in-memory storage, returned with that storage.
    pub fn session(&self) -> anyhow::Result<(Session, Arc<MemoryStorage>)> {
        let storage = Arc::new(MemoryStorage::new());
        let session = self.session_on(Arc::clone(&storage) as Arc<dyn DurableStorage>)?;
        Ok((session, storage))
    }

    pub fn session_on(&self, storage: Arc<dyn DurableStorage>) -> anyhow::Result<Session> {
        Session::builder(self.config())
            .storage(storage)
            .clock(Arc::clone(&self.clock) as Arc<dyn Clock>)
            .build()
    }

    pub fn set_ttl(&self, secs: i64) {
        self.token_ttl_secs.store(secs, Ordering::SeqCst);
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock() = mode;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.refresh_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Move the shared clock so the current token has `secs` left to live.
    pub fn leave_secs(&self, session: &Session, secs: i64) -> anyhow::Result<()> {
        let claims = session.store().claims().ok_or_else(|| anyhow::anyhow!("no token"))?;
        let target = (claims.exp - secs) * 1000;
        self.clock.set_ms(u64::try_from(target)?);
        Ok(())
    }

    fn issue_access(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let exp = self.clock.now_secs() + self.token_ttl_secs.load(Ordering::SeqCst);
        mint_token("42", "alice", exp, seq)
    }
}

type Shared = State<Arc<Backend>>;

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message, "timestamp": "2026-01-01T00:00:00Z" }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn status_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn login(State(backend): Shared, Json(body): Json<Value>) -> Response {
    backend.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["password"] != PASSWORD {
        return message(StatusCode::UNAUTHORIZED, "Invalid username or password");
    }
    let access = backend.issue_access();
    Json(json!({ "accessToken": access, "refreshToken": "refresh-0", "tokenType": "Bearer" }))
        .into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["username"] == "taken" {
        let body = json!({
            "message": "Validation failed",
            "errors": { "username": "Username is already taken" },
        });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }
    (StatusCode::CREATED, "User registered successfully").into_response()
}

async fn refresh(State(backend): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let n = backend.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    backend.refresh_bodies.lock().push(body);
    backend.refresh_bearers.lock().push(bearer(&headers));
    let delay = backend.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let mode = *backend.refresh_mode.lock();
    match mode {
        RefreshMode::Rotate => {
            let access = backend.issue_access();
            Json(json!({ "accessToken": access, "refreshToken": format!("refresh-{n}") }))
                .into_response()
        }
        RefreshMode::NoAccessToken => Json(json!({ "refreshToken": "orphan" })).into_response(),
        RefreshMode::Fail(code) => message(status_code(code), "Refresh token expired"),
    }
}

async fn logout(State(backend): Shared, Json(body): Json<Value>) -> Response {
    backend.logout_bodies.lock().push(body);
    let code = *backend.logout_status.lock();
    if code == 200 {
        return "Logged out successfully".into_response();
    }
    message(status_code(code), "logout unavailable")
}

async fn documents(State(backend): Shared, headers: HeaderMap) -> Response {
    backend.document_calls.fetch_add(1, Ordering::SeqCst);
    let bearer = bearer(&headers);
    backend.document_tokens.lock().push(bearer.clone());

    let live = bearer
        .as_deref()
        .and_then(|t| decode_claims(t).ok())
        .is_some_and(|c| c.expires_at_ms() > backend.clock.now_ms());
    if !live {
        return message(StatusCode::UNAUTHORIZED, "Full authentication is required");
    }
    Json(json!([{ "id": 1, "title": "Quarterly report" }])).into_response()
}

async fn always_unauthorized() -> Response {
    message(StatusCode::UNAUTHORIZED, "Token revoked")
}

/// Drain every event currently queued on `rx`.
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn unauthorized_count(events: &[SessionEvent]) -> usize {
    events.iter().filter(|e| matches!(e, SessionEvent::Unauthorized { .. })).count()
}

/// Wait (bounded) for the first event matching `pred`.
pub async fn wait_for(
    rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> anyhow::Result<SessionEvent> {
    let fut = async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return Ok(event),
                Ok(_) => continue,
                Err(e) => return Err(anyhow::anyhow!("event channel: {e}")),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), fut).await?
}
