// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token store: the only owner of access/refresh tokens.
//!
//! The access token lives in memory together with its decoded claims and is
//! mirrored (raw string only) to durable storage. The refresh token lives in
//! durable storage alone. Storage failures are logged and never returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::AuthError;
use crate::storage::{DurableStorage, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use crate::token::{decode_claims, Claims, UserInfo};

/// Access token and the claims decoded from it. Always assigned together.
struct CurrentToken {
    raw: String,
    claims: Claims,
}

pub struct TokenStore {
    storage: Arc<dyn DurableStorage>,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<CurrentToken>>,
    /// Bumped by every `clear_auth`, so in-flight work can detect that the
    /// session it started under is gone.
    generation: AtomicU64,
}

impl TokenStore {
    /// Open the store, restoring a persisted access token if one decodes.
    pub fn open(storage: Arc<dyn DurableStorage>, clock: Arc<dyn Clock>) -> Self {
        let store = Self { storage, clock, current: RwLock::new(None), generation: AtomicU64::new(0) };
        if let Some(raw) = store.read_slot(ACCESS_TOKEN_KEY) {
            match store.set_access_token(&raw) {
                Ok(_) => debug!("restored persisted access token"),
                Err(e) => warn!(err = %e, "discarding persisted access token"),
            }
        }
        store
    }

    /// Decode and install a new access token.
    ///
    /// On decode failure every piece of auth state is cleared.
    pub fn set_access_token(&self, raw: &str) -> Result<Claims, AuthError> {
        let claims = match decode_claims(raw) {
            Ok(claims) => claims,
            Err(e) => {
                self.clear_auth();
                return Err(e);
            }
        };
        *self.current.write() = Some(CurrentToken { raw: raw.to_owned(), claims: claims.clone() });
        self.write_slot(ACCESS_TOKEN_KEY, raw);
        Ok(claims)
    }

    pub fn access_token(&self) -> Option<String> {
        self.current.read().as_ref().map(|t| t.raw.clone())
    }

    pub fn claims(&self) -> Option<Claims> {
        self.current.read().as_ref().map(|t| t.claims.clone())
    }

    pub fn set_refresh_token(&self, raw: &str) {
        self.write_slot(REFRESH_TOKEN_KEY, raw);
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_slot(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Cache the user record alongside the tokens.
    pub fn set_user(&self, user: &UserInfo) {
        match serde_json::to_string(user) {
            Ok(json) => self.write_slot(USER_KEY, &json),
            Err(e) => warn!(err = %e, "failed to encode user record"),
        }
    }

    /// The cached user record, if present and readable.
    pub fn user(&self) -> Option<UserInfo> {
        let json = self.read_slot(USER_KEY)?;
        match serde_json::from_str(&json) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(err = %e, "ignoring unreadable user record");
                None
            }
        }
    }

    /// Drop all auth state from memory and storage. Idempotent.
    pub fn clear_auth(&self) {
        self.retire();
    }

    /// Clear auth on behalf of work started under generation `observed`.
    ///
    /// Returns true only for the call that retires `observed`; later callers
    /// holding the same generation find it already gone.
    pub(crate) fn clear_auth_from(&self, observed: u64) -> bool {
        self.retire() == observed
    }

    /// Drop the token and bump the generation under one lock, then empty the
    /// storage slots. Returns the generation that was retired.
    fn retire(&self) -> u64 {
        let retired = {
            let mut current = self.current.write();
            *current = None;
            self.generation.fetch_add(1, Ordering::SeqCst)
        };
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, err = %e, "failed to clear storage slot");
            }
        }
        retired
    }

    /// True with no token, or once `now >= exp - SAFETY_MARGIN`.
    pub fn is_token_expired(&self) -> bool {
        match self.current.read().as_ref() {
            Some(t) => t.claims.is_expired_at(self.clock.now_ms()),
            None => true,
        }
    }

    pub fn has_valid_session(&self) -> bool {
        let now = self.clock.now_ms();
        self.current.read().as_ref().is_some_and(|t| !t.claims.is_expired_at(now))
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn read_slot(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, err = %e, "failed to read storage slot");
                None
            }
        }
    }

    fn write_slot(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            warn!(key, err = %e, "failed to persist storage slot");
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
