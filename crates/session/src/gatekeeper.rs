// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hooks run around every API call.
//!
//! Outbound: refresh a stale token before the request leaves, then attach it
//! as a bearer credential. Inbound: a 401 from any endpoint ends the session.

use tracing::debug;

use crate::auth::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use crate::error::AuthError;
use crate::session::Session;

/// Endpoints that submit credentials. They never trigger a refresh, and a
/// 401 from them still ends the session but surfaces the backend's
/// rejection message instead of a bare `Unauthorized`.
const CREDENTIAL_PATHS: &[&str] = &[LOGIN_PATH, REGISTER_PATH];

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let path = path.trim_end_matches('/');
    path.strip_prefix('/').unwrap_or(path)
}

fn path_is(path: &str, target: &str) -> bool {
    normalize(path) == normalize(target)
}

/// Whether `path` submits credentials (login/register).
pub fn is_credential_path(path: &str) -> bool {
    CREDENTIAL_PATHS.iter().any(|p| path_is(path, p))
}

/// Whether `path` is the refresh endpoint, which must never trigger a refresh.
pub fn is_refresh_path(path: &str) -> bool {
    path_is(path, REFRESH_PATH)
}

/// What the outbound hook hands to the request.
#[derive(Debug, Clone)]
pub(crate) struct Outbound {
    /// Bearer credential to attach, if a session exists.
    pub(crate) token: Option<String>,
    /// Token generation the request is sent under.
    pub(crate) generation: u64,
}

impl Session {
    /// Outbound hook.
    ///
    /// A failed refresh aborts the request; the refresh coordinator has
    /// already cleared the session and signalled `Unauthorized`. Auth
    /// endpoints skip the refresh step but still carry the current token.
    pub(crate) async fn before_send(&self, path: &str) -> Result<Outbound, AuthError> {
        let store = &self.inner.store;
        let refreshable = !(is_credential_path(path) || is_refresh_path(path));
        if refreshable && store.access_token().is_some() && store.is_token_expired() {
            debug!(path, "access token expired, refreshing before request");
            self.refresh_if_needed().await?;
        }
        // Generation first: a clear landing in between then reads as stale.
        let generation = store.generation();
        Ok(Outbound { token: store.access_token(), generation })
    }

    /// Inbound hook. A 401 clears auth and signals `Unauthorized` once per
    /// failure.
    pub(crate) fn after_receive(
        &self,
        path: &str,
        status: u16,
        generation: u64,
    ) -> Result<(), AuthError> {
        if status != 401 {
            return Ok(());
        }
        debug!(path, "request rejected with 401");
        self.fail_session(&format!("{} returned 401", normalize_for_log(path)), generation);
        if is_credential_path(path) {
            // Let the caller decode the rejection body into a user-facing message.
            return Ok(());
        }
        Err(AuthError::Unauthorized)
    }
}

fn normalize_for_log(path: &str) -> String {
    format!("/{}", normalize(path))
}

#[cfg(test)]
#[path = "gatekeeper_tests.rs"]
mod tests;
