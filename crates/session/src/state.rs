// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Derived session state for the presentation layer.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::store::TokenStore;
use crate::token::UserInfo;

/// Read-only view of the session. Recomputed, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub is_authenticated: bool,
    pub user: Option<UserInfo>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Progress of the user-initiated flow currently running, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activity {
    pub loading: bool,
    pub error: Option<String>,
}

/// Pure projection of token store state plus flow activity.
pub fn derive_session_state(store: &TokenStore, activity: &Activity) -> SessionState {
    let user = store.claims().map(|c| c.user_info());
    SessionState {
        is_authenticated: store.has_valid_session(),
        user,
        loading: activity.loading,
        error: activity.error.clone(),
    }
}

pub(crate) struct SessionOracle {
    activity: Mutex<Activity>,
    tx: watch::Sender<SessionState>,
}

impl SessionOracle {
    pub(crate) fn new(store: &TokenStore) -> Self {
        let activity = Activity::default();
        let (tx, _rx) = watch::channel(derive_session_state(store, &activity));
        Self { activity: Mutex::new(activity), tx }
    }

    pub(crate) fn snapshot(&self, store: &TokenStore) -> SessionState {
        derive_session_state(store, &self.activity.lock())
    }

    pub(crate) fn watch(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// A login/register flow started.
    pub(crate) fn begin(&self, store: &TokenStore) {
        *self.activity.lock() = Activity { loading: true, error: None };
        self.publish(store);
    }

    /// The running flow finished, successfully or with a user-facing error.
    pub(crate) fn finish(&self, store: &TokenStore, error: Option<String>) {
        *self.activity.lock() = Activity { loading: false, error };
        self.publish(store);
    }

    /// Push a fresh snapshot to watchers.
    pub(crate) fn publish(&self, store: &TokenStore) {
        let state = self.snapshot(store);
        self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
