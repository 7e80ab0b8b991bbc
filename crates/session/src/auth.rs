// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-initiated auth flows: login, register, logout.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{error_message, AuthError};
use crate::events::{AuthPhase, SessionEvent};
use crate::session::Session;
use crate::token::UserInfo;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const REGISTER_PATH: &str = "/auth/register";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password: String,
}

/// Tokens issued by login and refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

impl Session {
    /// Exchange credentials for tokens.
    ///
    /// Failures are returned and also recorded in `SessionState::error`.
    /// Rejected credentials (401) end any session already in place.
    pub async fn login(&self, request: &LoginRequest) -> Result<UserInfo, AuthError> {
        let store = &self.inner.store;
        self.set_phase(AuthPhase::Authenticating);
        self.inner.oracle.begin(store);

        match self.try_login(request).await {
            Ok(user) => {
                self.inner.oracle.finish(store, None);
                info!(user = %user.username, "logged in");
                Ok(user)
            }
            Err(e) => {
                let next = if store.access_token().is_some() {
                    AuthPhase::Authenticated
                } else {
                    AuthPhase::Anonymous
                };
                self.set_phase(next);
                self.inner.oracle.finish(store, Some(error_message(&e, "Failed to login")));
                debug!(err = %e, "login failed");
                Err(e)
            }
        }
    }

    async fn try_login(&self, request: &LoginRequest) -> Result<UserInfo, AuthError> {
        let response = self.api().post::<TokenResponse, _>(LOGIN_PATH, request).await?;
        let tokens = response.data;
        let access_token =
            tokens.access_token.filter(|t| !t.is_empty()).ok_or(AuthError::MissingAccessToken)?;

        let claims = self.install_tokens(&access_token, tokens.refresh_token.as_deref())?;
        self.schedule_check();
        let user = claims.user_info();
        self.inner.store.set_user(&user);
        self.inner.signal.emit(SessionEvent::LoggedIn { user: user.clone() });
        Ok(user)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, request: &RegisterRequest) -> Result<(), AuthError> {
        let store = &self.inner.store;
        self.inner.oracle.begin(store);
        match self.api().post::<serde_json::Value, _>(REGISTER_PATH, request).await {
            Ok(_) => {
                self.inner.oracle.finish(store, None);
                info!(user = %request.username, "registered");
                Ok(())
            }
            Err(e) => {
                self.inner.oracle.finish(store, Some(error_message(&e, "Failed to register")));
                Err(e)
            }
        }
    }

    /// End the session locally, then tell the backend on a best-effort basis.
    ///
    /// Never fails: the server call cannot block local logout.
    pub async fn logout(&self) {
        let store = &self.inner.store;
        let refresh_token = store.refresh_token();

        self.inner.scheduler.cancel();
        store.clear_auth();
        self.set_phase(AuthPhase::Anonymous);
        self.inner.oracle.finish(store, None);
        self.inner.signal.emit(SessionEvent::LoggedOut);
        info!("logged out");

        let Some(refresh_token) = refresh_token else {
            debug!("no refresh token for server-side logout");
            return;
        };
        let request = LogoutRequest { refresh_token };
        if let Err(e) = self.api().post::<serde_json::Value, _>(LOGOUT_PATH, &request).await {
            warn!(err = %e, status = ?e.status(), "server-side logout failed");
        }
    }
}
