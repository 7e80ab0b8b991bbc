// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::{Command, Config};

fn parse(args: &[&str]) -> anyhow::Result<Config> {
    Ok(Config::try_parse_from(args)?)
}

#[test]
fn login_with_defaults() -> anyhow::Result<()> {
    let config = parse(&["dms", "login", "alice", "--password", "secret"])?;
    config.validate()?;
    assert_eq!(config.log_format, "text");
    assert_eq!(config.session.request_timeout_ms, 30000);
    let Command::Login(args) = &config.command else {
        anyhow::bail!("expected login, got {:?}", config.command);
    };
    assert_eq!(args.username, "alice");
    assert_eq!(args.password, "secret");
    Ok(())
}

#[test]
fn session_flags_flatten_into_config() -> anyhow::Result<()> {
    let config = parse(&[
        "dms",
        "--api-url",
        "https://dms.example.com/api",
        "--request-timeout-ms",
        "500",
        "--state-dir",
        "/tmp/dms-state",
        "status",
        "--json",
    ])?;
    config.validate()?;
    assert_eq!(config.session.api_url, "https://dms.example.com/api");
    assert_eq!(config.session.request_timeout_ms, 500);
    assert_eq!(config.session.storage_path(), std::path::Path::new("/tmp/dms-state/session.json"));
    assert!(matches!(config.command, Command::Status(ref s) if s.json));
    Ok(())
}

#[test]
fn log_flags_are_global() -> anyhow::Result<()> {
    let config = parse(&["dms", "refresh", "--log-format", "json", "--log-level", "debug"])?;
    config.validate()?;
    assert_eq!(config.log_format, "json");
    assert_eq!(config.log_level, "debug");
    Ok(())
}

#[yare::parameterized(
    bad_log_format = { &["dms", "--log-format", "yaml", "logout"], "invalid --log-format" },
    bad_api_url    = { &["dms", "--api-url", "localhost:8080", "logout"], "must start with http" },
    zero_timeout   = { &["dms", "--request-timeout-ms", "0", "logout"], "greater than zero" },
    empty_password = { &["dms", "login", "alice", "--password", ""], "--password must not be empty" },
    empty_path     = { &["dms", "get", " "], "path must not be empty" },
)]
fn invalid_config(args: &[&str], expected_substr: &str) -> anyhow::Result<()> {
    let config = parse(args)?;
    dms_session::assert_err_contains!(config.validate(), expected_substr);
    Ok(())
}

#[test]
fn subcommand_is_required() {
    assert!(parse(&["dms"]).is_err());
}
