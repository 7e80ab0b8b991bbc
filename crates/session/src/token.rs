// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access token payload decoding.
//!
//! Tokens are compact `header.payload.signature` strings. The client only
//! reads the payload; signature verification is the backend's job.

use std::time::Duration;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Tokens count as expired this long before their real `exp`.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(30);

/// URL-safe base64 that accepts payloads with or without `=` padding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded access token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued-at, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiry, epoch seconds.
    pub exp: i64,
}

impl Claims {
    pub fn expires_at_ms(&self) -> u64 {
        (self.exp.max(0) as u64).saturating_mul(1000)
    }

    /// Instant (epoch ms) from which the token is treated as expired.
    pub fn refresh_at_ms(&self) -> u64 {
        self.expires_at_ms().saturating_sub(SAFETY_MARGIN.as_millis() as u64)
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.refresh_at_ms()
    }

    /// Project the user visible to the presentation layer.
    pub fn user_info(&self) -> UserInfo {
        UserInfo { id: self.sub.clone(), username: self.username.clone(), roles: self.roles.clone() }
    }
}

/// The signed-in user as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Decode the payload segment of a raw access token.
pub fn decode_claims(raw: &str) -> Result<Claims, AuthError> {
    let mut parts = raw.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidToken("expected three dot-separated segments".into()));
    };
    if payload.is_empty() {
        return Err(AuthError::InvalidToken("empty payload".into()));
    }

    let bytes = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|e| AuthError::InvalidToken(format!("payload is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidToken(format!("payload is not a claims object: {e}")))
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
