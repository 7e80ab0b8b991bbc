// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand dispatch, shared by `main` and tests.

use std::fmt::Write as _;
use std::sync::Arc;

use dms_session::{
    AuthError, Claims, FileStorage, LoginRequest, RegisterRequest, Session, SessionState,
};
use tracing::debug;

use crate::config::{Command, Config};

/// Open the persisted session and run one subcommand. Returns the process
/// exit code; auth and API failures are reported on stderr, not as `Err`.
pub async fn run(config: Config) -> anyhow::Result<i32> {
    let storage = Arc::new(FileStorage::new(config.session.storage_path()));
    debug!(path = %storage.path().display(), "opening session storage");
    let session = Session::builder(config.session.clone()).storage(storage).build()?;
    session.start().await;

    match execute(&session, &config.command).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            Ok(0)
        }
        Err(e) => {
            eprintln!("error: {e}");
            if let AuthError::Api { field_errors, .. } = &e {
                for (field, message) in field_errors {
                    eprintln!("  {field}: {message}");
                }
            }
            Ok(1)
        }
    }
}

/// Run `command` against `session` and return what should be printed.
pub async fn execute(session: &Session, command: &Command) -> Result<String, AuthError> {
    match command {
        Command::Login(args) => {
            let request =
                LoginRequest { username: args.username.clone(), password: args.password.clone() };
            let user = session.login(&request).await?;
            Ok(format!("Logged in as {}", user.username))
        }
        Command::Register(args) => {
            let request = RegisterRequest {
                username: args.username.clone(),
                email: args.email.clone(),
                password: args.password.clone(),
            };
            session.register(&request).await?;
            Ok(format!("Registered {}; run `dms login {}` to sign in", args.username, args.username))
        }
        Command::Logout => {
            session.logout().await;
            Ok("Logged out".to_owned())
        }
        Command::Status(args) => {
            let state = session.state();
            if args.json {
                return serde_json::to_string_pretty(&state)
                    .map_err(|e| AuthError::Transport(format!("encode state: {e}")));
            }
            let claims = session.store().claims();
            Ok(render_status(&state, claims.as_ref(), session.store().now_ms()))
        }
        Command::Refresh => {
            session.refresh_if_needed().await?;
            let claims = session.store().claims();
            Ok(render_status(&session.state(), claims.as_ref(), session.store().now_ms()))
        }
        Command::Get(args) => {
            let response = session.api().get::<serde_json::Value>(&args.path).await?;
            serde_json::to_string_pretty(&response.data)
                .map_err(|e| AuthError::Transport(format!("encode response: {e}")))
        }
    }
}

/// Human-readable session summary.
pub fn render_status(state: &SessionState, claims: Option<&Claims>, now_ms: u64) -> String {
    let Some(user) = &state.user else {
        return "Not signed in".to_owned();
    };
    let mut out = format!("Signed in as {} (id {})", user.username, user.id);
    if !user.roles.is_empty() {
        let _ = write!(out, "\nroles: {}", user.roles.join(", "));
    }
    if let Some(claims) = claims {
        let expires_at = claims.expires_at_ms();
        if expires_at > now_ms {
            let _ = write!(out, "\ntoken expires in {}s", (expires_at - now_ms) / 1000);
        } else {
            out.push_str("\ntoken expired");
        }
    }
    if !state.is_authenticated {
        out.push_str("\nsession needs a refresh");
    }
    out
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
