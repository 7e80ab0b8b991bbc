// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session object: token store, derived state, refresh gate, expiry
//! timer, and event fan-out, constructed explicitly and shared by handle.

use std::sync::{Arc, Once};

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::AuthError;
use crate::events::{AuthPhase, SessionEvent, Signal};
use crate::refresh::RefreshGate;
use crate::scheduler::ExpiryScheduler;
use crate::state::{SessionOracle, SessionState};
use crate::storage::{DurableStorage, MemoryStorage};
use crate::store::TokenStore;
use crate::token::{Claims, UserInfo};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Cheaply clonable handle to one client session.
///
/// Dropping the last handle cancels the expiry timer. A refresh already on
/// the wire is allowed to finish.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    pub(crate) config: SessionConfig,
    pub(crate) http: reqwest::Client,
    pub(crate) store: TokenStore,
    pub(crate) oracle: SessionOracle,
    pub(crate) gate: RefreshGate,
    pub(crate) scheduler: ExpiryScheduler,
    pub(crate) signal: Signal,
    phase: Mutex<AuthPhase>,
}

pub struct SessionBuilder {
    config: SessionConfig,
    storage: Option<Arc<dyn DurableStorage>>,
    clock: Option<Arc<dyn Clock>>,
    http: Option<reqwest::Client>,
}

impl SessionBuilder {
    /// Durable storage for tokens. Defaults to in-memory.
    pub fn storage(mut self, storage: Arc<dyn DurableStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Clock used for expiry checks. Defaults to the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> anyhow::Result<Session> {
        self.config.validate()?;
        ensure_crypto();

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder().timeout(self.config.request_timeout()).build()?,
        };
        let storage = self.storage.unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = TokenStore::open(storage, clock);
        let phase = if store.access_token().is_some() {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Anonymous
        };
        let oracle = SessionOracle::new(&store);

        Ok(Session {
            inner: Arc::new(SessionInner {
                config: self.config,
                http,
                store,
                oracle,
                gate: RefreshGate::default(),
                scheduler: ExpiryScheduler::default(),
                signal: Signal::new(),
                phase: Mutex::new(phase),
            }),
        })
    }
}

impl Session {
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder { config, storage: None, clock: None, http: None }
    }

    /// Bring a restored session up to date.
    ///
    /// Publishes the initial state, then either refreshes right away (the
    /// persisted token is inside the safety margin) or arms the expiry timer.
    pub async fn start(&self) {
        let store = &self.inner.store;
        self.inner.oracle.publish(store);
        if store.access_token().is_none() {
            debug!("no persisted session");
            return;
        }
        if store.is_token_expired() {
            info!("restored session is expiring, refreshing now");
            if let Err(e) = self.refresh_if_needed().await {
                warn!(err = %e, "restored session could not be refreshed");
            }
        } else {
            self.schedule_check();
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    /// Authenticated REST client bound to this session.
    pub fn api(&self) -> ApiClient {
        ApiClient::new(self.clone())
    }

    pub fn state(&self) -> SessionState {
        self.inner.oracle.snapshot(&self.inner.store)
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.oracle.watch()
    }

    /// Subscribe to lifecycle events, including `Unauthorized`.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.signal.subscribe()
    }

    pub fn phase(&self) -> AuthPhase {
        *self.inner.phase.lock()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.store.has_valid_session()
    }

    pub fn current_user(&self) -> Option<UserInfo> {
        self.inner.store.claims().map(|c| c.user_info())
    }

    pub(crate) fn set_phase(&self, next: AuthPhase) {
        let mut phase = self.inner.phase.lock();
        let prev = *phase;
        if prev != next {
            debug!(prev = %prev, next = %next, "auth phase changed");
            *phase = next;
        }
    }

    /// Install freshly issued tokens and publish the new state.
    ///
    /// The caller decides how to (re)arm the expiry timer.
    pub(crate) fn install_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<Claims, AuthError> {
        let store = &self.inner.store;
        let claims = store.set_access_token(access_token)?;
        if let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) {
            store.set_refresh_token(refresh_token);
        }
        self.set_phase(AuthPhase::Authenticated);
        self.inner.oracle.publish(store);
        Ok(claims)
    }

    /// Terminal failure seen by work that started under token generation
    /// `observed`: drop all auth state and tell the presentation layer.
    ///
    /// Only the failure that actually ends `observed` broadcasts
    /// `Unauthorized`, so concurrent 401s from one session collapse into a
    /// single event while later, separate failures each get their own.
    pub(crate) fn fail_session(&self, reason: &str, observed: u64) {
        let store = &self.inner.store;
        self.inner.scheduler.cancel();
        let ended = store.clear_auth_from(observed);
        self.set_phase(AuthPhase::Anonymous);
        self.inner.oracle.publish(store);
        if ended {
            warn!(reason, "session ended");
            self.inner.signal.emit(SessionEvent::Unauthorized { reason: reason.to_owned() });
        } else {
            debug!(reason, "session already ended");
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
