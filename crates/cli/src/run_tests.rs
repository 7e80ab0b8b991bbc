// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use dms_session::test_support::{mint_token, ManualClock, TEST_EPOCH_MS};
use dms_session::token::decode_claims;
use dms_session::{AuthError, MemoryStorage, Session, SessionConfig, SessionState, UserInfo};

use super::{execute, render_status};
use crate::config::{Command, StatusArgs};

fn alice() -> UserInfo {
    UserInfo { id: "42".to_owned(), username: "alice".to_owned(), roles: vec!["ROLE_USER".into()] }
}

#[test]
fn status_for_anonymous_session() {
    assert_eq!(render_status(&SessionState::default(), None, TEST_EPOCH_MS), "Not signed in");
}

#[yare::parameterized(
    fresh    = { 600, true, "token expires in 600s" },
    in_grace = { 20, false, "session needs a refresh" },
    expired  = { -5, false, "token expired" },
)]
fn status_for_signed_in_user(secs_left: i64, authenticated: bool, expected: &str) -> anyhow::Result<()> {
    let exp = (TEST_EPOCH_MS / 1000) as i64 + secs_left;
    let claims = decode_claims(&mint_token("42", "alice", exp, 1))?;
    let state = SessionState {
        is_authenticated: authenticated,
        user: Some(alice()),
        loading: false,
        error: None,
    };
    let out = render_status(&state, Some(&claims), TEST_EPOCH_MS);
    assert!(out.starts_with("Signed in as alice (id 42)"), "{out}");
    assert!(out.contains("roles: ROLE_USER"), "{out}");
    assert!(out.contains(expected), "{out}");
    Ok(())
}

fn offline_session() -> anyhow::Result<Session> {
    // Nothing listens here; these commands must not touch the network.
    let config = SessionConfig::with_api_url("http://127.0.0.1:9/api");
    Session::builder(config)
        .storage(Arc::new(MemoryStorage::new()))
        .clock(Arc::new(ManualClock::default()))
        .build()
}

#[tokio::test]
async fn status_json_reports_state() -> anyhow::Result<()> {
    let session = offline_session()?;
    let out = execute(&session, &Command::Status(StatusArgs { json: true })).await?;
    let value: serde_json::Value = serde_json::from_str(&out)?;
    assert_eq!(value["is_authenticated"], false);
    assert_eq!(value["user"], serde_json::Value::Null);
    Ok(())
}

#[tokio::test]
async fn logout_without_session_succeeds() -> anyhow::Result<()> {
    let session = offline_session()?;
    assert_eq!(execute(&session, &Command::Logout).await?, "Logged out");
    Ok(())
}

#[tokio::test]
async fn refresh_without_session_fails() -> anyhow::Result<()> {
    let session = offline_session()?;
    let err = execute(&session, &Command::Refresh).await.err();
    assert_eq!(err, Some(AuthError::NoRefreshToken));
    Ok(())
}
