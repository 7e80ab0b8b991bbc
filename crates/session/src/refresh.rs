// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight token refresh.
//!
//! The first caller spawns the refresh as its own task and parks a shared
//! handle to its result in the gate; later callers clone that handle instead
//! of hitting the network. The task releases the gate on every exit path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{RefreshRequest, TokenResponse, REFRESH_PATH};
use crate::error::AuthError;
use crate::events::{AuthPhase, SessionEvent};
use crate::session::{Session, SessionInner};

type Flight = Shared<BoxFuture<'static, Result<(), AuthError>>>;

/// Holds the refresh currently in flight, if any.
#[derive(Default)]
pub(crate) struct RefreshGate {
    slot: Mutex<Option<(u64, Flight)>>,
    next_id: AtomicU64,
}

impl RefreshGate {
    pub(crate) fn in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn release(&self, id: u64) {
        let mut slot = self.slot.lock();
        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            *slot = None;
        }
    }
}

/// Empties the gate when the refresh task ends, including by panic.
struct Release {
    inner: Arc<SessionInner>,
    id: u64,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.inner.gate.release(self.id);
    }
}

impl Session {
    /// Refresh the access token, joining a refresh already in flight.
    ///
    /// Every failure is terminal: auth state is cleared and `Unauthorized`
    /// is broadcast before the error is returned. Nothing retries.
    pub async fn refresh_if_needed(&self) -> Result<(), AuthError> {
        self.join_or_start_refresh().await
    }

    pub fn refresh_in_flight(&self) -> bool {
        self.inner.gate.in_flight()
    }

    fn join_or_start_refresh(&self) -> Flight {
        let mut slot = self.inner.gate.slot.lock();
        if let Some((_, flight)) = slot.as_ref() {
            debug!("joining in-flight refresh");
            return flight.clone();
        }

        let id = self.inner.gate.next_id.fetch_add(1, Ordering::Relaxed);
        let session = self.clone();
        let release = Release { inner: Arc::clone(&self.inner), id };
        let handle = tokio::spawn(async move {
            let _release = release;
            session.run_refresh().await
        });
        let flight = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(AuthError::RefreshFailed(format!("refresh task aborted: {e}"))),
            }
        }
        .boxed()
        .shared();

        *slot = Some((id, flight.clone()));
        flight
    }

    async fn run_refresh(&self) -> Result<(), AuthError> {
        let store = &self.inner.store;
        let Some(refresh_token) = store.refresh_token() else {
            warn!("refresh requested without a refresh token");
            self.fail_session("no refresh token", store.generation());
            return Err(AuthError::NoRefreshToken);
        };

        let generation = store.generation();
        self.set_phase(AuthPhase::Refreshing);
        debug!("refreshing access token");

        let request = RefreshRequest { refresh_token };
        let outcome = self.api().post::<TokenResponse, _>(REFRESH_PATH, &request).await;

        // A logout, a 401 elsewhere, or the refresh call's own 401 already
        // ended this generation. Do not resurrect it or clear its successor.
        if store.generation() != generation {
            debug!("session cleared during refresh, discarding result");
            let reason = match &outcome {
                Err(e) => e.to_string(),
                Ok(_) => "session cleared during refresh".to_owned(),
            };
            return Err(AuthError::RefreshFailed(reason));
        }

        let tokens = match outcome {
            Ok(response) => response.data,
            Err(e) => return Err(self.refresh_failed(&e.to_string(), generation)),
        };

        let Some(access_token) = tokens.access_token.filter(|t| !t.is_empty()) else {
            return Err(self.refresh_failed("no access token received from refresh", generation));
        };
        let claims = match self.install_tokens(&access_token, tokens.refresh_token.as_deref()) {
            Ok(claims) => claims,
            // The bad token already cleared auth; report under the new generation.
            Err(e) => return Err(self.refresh_failed(&e.to_string(), store.generation())),
        };
        self.rearm_after_refresh(&claims);

        self.inner.signal.emit(SessionEvent::Refreshed { expires_at_ms: claims.expires_at_ms() });
        info!(user = %claims.username, "access token refreshed");
        Ok(())
    }

    fn refresh_failed(&self, reason: &str, generation: u64) -> AuthError {
        warn!(reason, "token refresh failed");
        self.fail_session(reason, generation);
        AuthError::RefreshFailed(reason.to_owned())
    }
}
