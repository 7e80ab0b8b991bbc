// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated REST client. Every call runs the gatekeeper hooks.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{api_error, AuthError};
use crate::session::Session;

/// A decoded 2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: u16,
    pub message: String,
}

#[derive(Clone)]
pub struct ApiClient {
    session: Session,
}

impl ApiClient {
    pub(crate) fn new(session: Session) -> Self {
        Self { session }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, AuthError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, AuthError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, Some(encode_body(body)?)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, AuthError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::PUT, path, Some(encode_body(body)?)).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<ApiResponse<T>, AuthError> {
        self.send(Method::DELETE, path, None).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse<T>, AuthError> {
        let session = &self.session;
        let outbound = session.before_send(path).await?;

        let url = session.config().url(path);
        debug!(%method, %url, authenticated = outbound.token.is_some(), "api request");
        let mut request = session.inner.http.request(method, &url);
        if let Some(token) = outbound.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        session.after_receive(path, status.as_u16(), outbound.generation)?;

        let reason = status.canonical_reason().unwrap_or("request failed");
        let text = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text, reason));
        }
        Ok(ApiResponse { data: decode_body(&text)?, status: status.as_u16(), message: reason.to_owned() })
    }
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, AuthError> {
    serde_json::to_value(body).map_err(|e| AuthError::Transport(format!("invalid request body: {e}")))
}

/// Decode a success body. Empty bodies decode as JSON `null`; bodies that
/// are not JSON are offered to `T` as a plain string.
fn decode_body<T: DeserializeOwned>(text: &str) -> Result<T, AuthError> {
    if text.trim().is_empty() {
        return serde_json::from_value(Value::Null)
            .map_err(|e| AuthError::Transport(format!("empty response body: {e}")));
    }
    match serde_json::from_str(text) {
        Ok(data) => Ok(data),
        Err(e) => serde_json::from_value(Value::String(text.to_owned()))
            .map_err(|_| AuthError::Transport(format!("invalid response body: {e}"))),
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
