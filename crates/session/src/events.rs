// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle events and the auth phase machine.
//!
//! `SessionEvent::Unauthorized` is the one signal the core sends upward: the
//! presentation layer listens for it and sends the user back to login.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::token::UserInfo;

/// Capacity of the per-session event channel.
const EVENT_CAPACITY: usize = 64;

/// Events broadcast by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Credentials were accepted.
    LoggedIn { user: UserInfo },
    /// A refresh installed a new access token.
    Refreshed { expires_at_ms: u64 },
    /// The user logged out.
    LoggedOut,
    /// The session ended involuntarily; send the user to login.
    Unauthorized { reason: String },
}

/// Where a session sits in its auth lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
}

impl AuthPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Refreshing => "refreshing",
        }
    }
}

impl std::fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event fan-out for one session.
pub(crate) struct Signal {
    tx: broadcast::Sender<SessionEvent>,
}

impl Signal {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}
