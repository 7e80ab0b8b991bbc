// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: clocks, token minting, and failing storage.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::json;

use crate::clock::Clock;
use crate::storage::DurableStorage;

/// A fixed point in time tests start from (2023-11-14T22:13:20Z).
pub const TEST_EPOCH_MS: u64 = 1_700_000_000_000;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(TEST_EPOCH_MS)
    }
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self { now_ms: AtomicU64::new(now_ms) }
    }

    pub fn set_ms(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.now_ms.fetch_add(secs * 1000, Ordering::SeqCst);
    }

    pub fn now_secs(&self) -> i64 {
        (self.now_ms.load(Ordering::SeqCst) / 1000) as i64
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Build an unsigned token whose payload carries the given claims.
///
/// `seq` is an extra claim that makes successive tokens distinguishable.
pub fn mint_token(sub: &str, username: &str, exp: i64, seq: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS512","typ":"JWT"}"#);
    let payload = json!({
        "sub": sub,
        "username": username,
        "roles": ["ROLE_USER"],
        "iat": exp - 3600,
        "exp": exp,
        "seq": seq,
    });
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Storage that fails every operation while `failing` is set.
#[derive(Debug, Default)]
pub struct FailingStorage {
    inner: crate::storage::MemoryStorage,
    failing: AtomicBool,
}

impl FailingStorage {
    pub fn new(failing: bool) -> Self {
        Self { inner: Default::default(), failing: AtomicBool::new(failing) }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("storage unavailable");
        }
        Ok(())
    }
}

impl DurableStorage for FailingStorage {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.check()?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.check()?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.check()?;
        self.inner.remove(key)
    }
}

/// Assert that `$expr` is `Err` and its display contains `$substr`.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
