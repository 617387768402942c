//! Sync subcommand: inspect and drain the offline outbox.

use chrono::{Local, NaiveDate};
use clap::Subcommand;
use roundtrack_core::storage::Database;
use roundtrack_core::{Config, SystemClock};

use super::{open_context, open_outbox, print_json, remote, CliResult};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Show pending and dead-lettered counts
    Status,
    /// Push pending writes to the remote service
    Drain,
    /// Discard every pending write
    Clear {
        /// Required: pending writes are lost
        #[arg(long)]
        confirm: bool,
    },
    /// List writes the remote permanently refused
    DeadLetters,
    /// Move dead letters back into the queue
    Requeue,
    /// Pull remote blocks missing locally
    Reconcile {
        /// Date to reconcile (YYYY-MM-DD), default today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        user: Option<i64>,
    },
}

pub async fn run(action: SyncAction) -> CliResult {
    let config = Config::load()?;
    let mut outbox = open_outbox(&config);

    match action {
        SyncAction::Status => {
            let db = Database::open()?;
            print_json(&outbox.status(&db)?)?;
        }
        SyncAction::Drain => {
            let remote = remote(&config)?;
            let db = Database::open()?;
            let report = outbox.drain(&db, &remote, &SystemClock).await?;
            print_json(&report)?;
        }
        SyncAction::Clear { confirm } => {
            let db = Database::open()?;
            let dropped = outbox.clear(&db, confirm)?;
            println!("discarded {dropped} pending item(s)");
        }
        SyncAction::DeadLetters => {
            let db = Database::open()?;
            print_json(&outbox.dead_letters(&db)?)?;
        }
        SyncAction::Requeue => {
            let db = Database::open()?;
            let count = outbox.requeue_dead_letters(&db)?;
            println!("requeued {count} item(s)");
        }
        SyncAction::Reconcile { date, user } => {
            let remote = remote(&config)?;
            let ctx = open_context(&config, user)?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let report = ctx.reconcile(&remote, date).await?;
            print_json(&report)?;
        }
    }
    Ok(())
}
