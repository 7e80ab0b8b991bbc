// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dms-session: client-side auth and session core for the DMS backend.
//!
//! A [`Session`] owns the tokens, keeps them fresh (proactively on a timer
//! and lazily before each request), and ends itself on any refresh failure
//! or 401, broadcasting [`SessionEvent::Unauthorized`] exactly once.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod gatekeeper;
pub mod refresh;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;
pub mod test_support;
pub mod token;

pub use crate::api::{ApiClient, ApiResponse};
pub use crate::auth::{LoginRequest, RegisterRequest, TokenResponse};
pub use crate::clock::{Clock, SystemClock};
pub use crate::config::SessionConfig;
pub use crate::error::AuthError;
pub use crate::events::{AuthPhase, SessionEvent};
pub use crate::session::{Session, SessionBuilder};
pub use crate::state::SessionState;
pub use crate::storage::{DurableStorage, FileStorage, MemoryStorage};
pub use crate::store::TokenStore;
pub use crate::token::{Claims, UserInfo};
