// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Failures surfaced by the session core and the authenticated API client.
///
/// Every variant is `Clone` so a single in-flight refresh can hand the same
/// outcome to all of its waiters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The access token could not be decoded. Auth state has been cleared.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// A refresh was requested but no refresh token is stored.
    #[error("no refresh token available")]
    NoRefreshToken,
    /// The refresh call failed or returned no access token. Auth state has
    /// been cleared.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    /// The backend answered 401. Auth state has been cleared.
    #[error("unauthorized")]
    Unauthorized,
    /// A login response carried no access token.
    #[error("no access token received")]
    MissingAccessToken,
    /// Any other non-2xx response.
    #[error("{message}")]
    Api { status: u16, message: String, field_errors: BTreeMap<String, String> },
    /// Connection, timeout, or body decoding failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl AuthError {
    /// Whether this error ended the session (the caller is now anonymous).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken(_) | Self::NoRefreshToken | Self::RefreshFailed(_) | Self::Unauthorized
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidToken(_) => "INVALID_TOKEN",
            Self::NoRefreshToken => "NO_REFRESH_TOKEN",
            Self::RefreshFailed(_) => "REFRESH_FAILED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::MissingAccessToken => "MISSING_ACCESS_TOKEN",
            Self::Api { .. } => "API_ERROR",
            Self::Transport(_) => "TRANSPORT",
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Error envelope returned by the backend on failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

/// Build an [`AuthError::Api`] from a non-2xx status and its raw body.
///
/// Uses the backend `message` when the body is a well-formed error envelope,
/// else the body text, else `fallback`.
pub fn api_error(status: u16, body: &str, fallback: &str) -> AuthError {
    let parsed = serde_json::from_str::<ErrorResponse>(body).ok();
    let message = match parsed.as_ref().map(|r| r.message.trim()) {
        Some(msg) if !msg.is_empty() => msg.to_owned(),
        _ if !body.trim().is_empty() && parsed.is_none() => body.trim().to_owned(),
        _ => fallback.to_owned(),
    };
    let field_errors = parsed.and_then(|r| r.errors).unwrap_or_default();
    AuthError::Api { status, message, field_errors }
}

/// Extract a user-facing message from an error, falling back when empty.
pub fn error_message(err: &AuthError, fallback: &str) -> String {
    let msg = err.to_string();
    if msg.trim().is_empty() {
        fallback.to_owned()
    } else {
        msg
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
