// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proactive refresh: one cancellable timer per session that fires
//! `SAFETY_MARGIN` before the access token expires.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::session::Session;
use crate::token::Claims;

/// Owns the cancel handle of the pending expiry timer.
#[derive(Default)]
pub(crate) struct ExpiryScheduler {
    pending: Mutex<Option<CancellationToken>>,
}

impl ExpiryScheduler {
    /// Install a new timer handle, cancelling the previous one.
    fn replace(&self, next: CancellationToken) {
        if let Some(prev) = self.pending.lock().replace(next) {
            prev.cancel();
        }
    }

    pub(crate) fn cancel(&self) {
        if let Some(prev) = self.pending.lock().take() {
            prev.cancel();
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.pending.lock().as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Session {
    /// (Re)arm the expiry timer from the current token.
    ///
    /// Refreshes immediately when the token is already inside the margin.
    /// With no token there is nothing to schedule and any old timer is
    /// simply cancelled.
    pub fn schedule_check(&self) {
        let scheduler = &self.inner.scheduler;
        let Some(claims) = self.inner.store.claims() else {
            scheduler.cancel();
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, expiry timer not armed");
            scheduler.cancel();
            return;
        };

        let cancel = CancellationToken::new();
        scheduler.replace(cancel.clone());

        let now = self.inner.store.now_ms();
        let delay = Duration::from_millis(claims.refresh_at_ms().saturating_sub(now));
        debug!(delay_ms = delay.as_millis() as u64, "expiry timer armed");

        // Weak so a pending timer never keeps a dropped session alive.
        let weak = Arc::downgrade(&self.inner);
        runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return;
            }
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let session = Session { inner };
            let store = &session.inner.store;
            if store.access_token().is_none() {
                debug!("expiry timer fired without a session");
                return;
            }
            // The token just entered the margin; watchers see it before the
            // refresh lands.
            session.inner.oracle.publish(store);
            if let Err(e) = session.refresh_if_needed().await {
                debug!(err = %e, "scheduled refresh failed");
            }
        });
    }

    /// Re-arm after a refresh installed `claims`.
    ///
    /// A token issued already inside the margin is not re-armed: the timer
    /// would fire at once and refresh back-to-back. It is refreshed lazily by
    /// the next request instead.
    pub(crate) fn rearm_after_refresh(&self, claims: &Claims) {
        if claims.is_expired_at(self.inner.store.now_ms()) {
            warn!(exp = claims.exp, "refreshed token is already inside the safety margin");
            self.inner.scheduler.cancel();
            return;
        }
        self.schedule_check();
    }

    pub fn expiry_timer_armed(&self) -> bool {
        self.inner.scheduler.is_armed()
    }
}
