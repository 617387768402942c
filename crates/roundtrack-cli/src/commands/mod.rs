pub mod config;
pub mod day;
pub mod import;
pub mod profile;
pub mod session;
pub mod stats;
pub mod sync;
pub mod user;

use std::sync::Arc;

use roundtrack_core::storage::Database;
use roundtrack_core::sync::{HttpRemote, SyncError, SyncOutbox};
use roundtrack_core::{Config, SessionContext, SystemClock};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// User given on the command line, else the configured default.
pub fn resolve_user(config: &Config, user: Option<i64>) -> CliResult<i64> {
    user.or(config.session.user_id).ok_or_else(|| {
        "no user selected: pass --user <id> or run `config set session.user_id <id>`".into()
    })
}

pub fn open_outbox(config: &Config) -> SyncOutbox {
    SyncOutbox::new(config.sync.retry)
}

pub fn open_context(config: &Config, user: Option<i64>) -> CliResult<SessionContext> {
    let user_id = resolve_user(config, user)?;
    let ctx = SessionContext::open(
        Database::open()?,
        open_outbox(config),
        Arc::new(SystemClock),
        config,
        user_id,
    )?;
    Ok(ctx)
}

pub fn remote(config: &Config) -> Result<HttpRemote, SyncError> {
    if config.sync.endpoint.trim().is_empty() {
        return Err(SyncError::NotConfigured);
    }
    let token = Some(config.sync.token.clone()).filter(|t| !t.is_empty());
    HttpRemote::new(&config.sync.endpoint, token)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
