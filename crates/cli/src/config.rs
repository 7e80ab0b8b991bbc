// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand};

use dms_session::SessionConfig;

/// Command-line client for the document management service.
#[derive(Debug, Parser)]
#[command(name = "dms", version, about)]
pub struct Config {
    #[command(flatten)]
    pub session: SessionConfig,

    /// Log format (json or text).
    #[arg(long, env = "DMS_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "DMS_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sign in and persist the session.
    Login(LoginArgs),
    /// Create an account (does not sign in).
    Register(RegisterArgs),
    /// End the session locally and on the server.
    Logout,
    /// Show the current session.
    Status(StatusArgs),
    /// Force a token refresh.
    Refresh,
    /// GET an API path with the session's credentials and print the body.
    Get(GetArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct LoginArgs {
    pub username: String,
    #[arg(long, env = "DMS_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Clone, clap::Args)]
pub struct RegisterArgs {
    pub username: String,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long, env = "DMS_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Clone, clap::Args)]
pub struct StatusArgs {
    /// Print the session state as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct GetArgs {
    /// Path below the API base URL, e.g. `/documents`.
    pub path: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.session.validate()?;
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid --log-format: {other} (expected json or text)"),
        }
        match &self.command {
            Command::Login(args) if args.password.is_empty() => {
                anyhow::bail!("--password must not be empty")
            }
            Command::Register(args) if args.password.is_empty() => {
                anyhow::bail!("--password must not be empty")
            }
            Command::Get(args) if args.path.trim().is_empty() => {
                anyhow::bail!("path must not be empty")
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
