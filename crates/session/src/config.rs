// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

/// Configuration for a client session against the document service.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionConfig {
    /// Base URL of the REST API (paths such as `/auth/login` are appended).
    #[arg(long, default_value = "http://localhost:8080/api", env = "DMS_API_URL")]
    pub api_url: String,

    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 30000, env = "DMS_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Directory for durable session state.
    #[arg(long, env = "DMS_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".to_owned(),
            request_timeout_ms: 30000,
            state_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self { api_url: api_url.into(), ..Self::default() }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = self.api_url.trim();
        if url.is_empty() {
            anyhow::bail!("--api-url must not be empty");
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("--api-url must start with http:// or https://, got: {url}");
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("--request-timeout-ms must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }

    /// Join an API path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim().trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Resolve the state directory for session data.
    ///
    /// Uses `--state-dir`, then `$XDG_STATE_HOME/dms`, then
    /// `$HOME/.local/state/dms`, then `.dms`.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("dms");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/state/dms");
        }
        PathBuf::from(".dms")
    }

    /// Path of the file backing durable session storage.
    pub fn storage_path(&self) -> PathBuf {
        self.state_dir().join("session.json")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
