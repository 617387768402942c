use chrono::{Local, NaiveDate};
use clap::Subcommand;
use roundtrack_core::stats::{DailyAggregator, DateRange};
use roundtrack_core::storage::Database;
use roundtrack_core::Config;
use serde::Serialize;

use super::{print_json, resolve_user, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's totals per process
    Today {
        #[arg(long)]
        user: Option<i64>,
    },
    /// Totals over the last N days, today included
    Rolling {
        #[arg(long, default_value = "7")]
        days: u32,
        #[arg(long)]
        user: Option<i64>,
    },
    /// Totals over an inclusive date range, one entry per day
    Range {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        user: Option<i64>,
    },
    /// Raw block list
    Blocks {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Include blocks archived by "day new"
        #[arg(long)]
        archived: bool,
        #[arg(long)]
        user: Option<i64>,
    },
}

#[derive(Serialize)]
struct RangeReport<T: Serialize> {
    start: NaiveDate,
    end: NaiveDate,
    #[serde(flatten)]
    data: T,
}

pub fn run(action: StatsAction) -> CliResult {
    let config = Config::load()?;
    let db = Database::open()?;
    let today = Local::now().date_naive();

    match action {
        StatsAction::Today { user } => {
            let user_id = resolve_user(&config, user)?;
            let range = DateRange::single(today);
            let blocks = db.blocks_for(user_id, range, true)?;
            let processes = DailyAggregator::per_process(&blocks, user_id, range);
            print_json(&RangeReport {
                start: range.start,
                end: range.end,
                data: serde_json::json!({ "processes": processes }),
            })?;
        }
        StatsAction::Rolling { days, user } => {
            let user_id = resolve_user(&config, user)?;
            let range = DateRange::rolling(today, days);
            let blocks = db.blocks_for(user_id, range, true)?;
            let processes = DailyAggregator::per_process(&blocks, user_id, range);
            print_json(&RangeReport {
                start: range.start,
                end: range.end,
                data: serde_json::json!({ "processes": processes }),
            })?;
        }
        StatsAction::Range { from, to, user } => {
            let user_id = resolve_user(&config, user)?;
            let range = DateRange::between(from, to)?;
            let blocks = db.blocks_for(user_id, range, true)?;
            print_json(&RangeReport {
                start: range.start,
                end: range.end,
                data: serde_json::json!({
                    "days": DailyAggregator::by_day(&blocks, user_id, range),
                    "processes": DailyAggregator::per_process(&blocks, user_id, range),
                }),
            })?;
        }
        StatsAction::Blocks {
            from,
            to,
            archived,
            user,
        } => {
            let user_id = resolve_user(&config, user)?;
            let start = from.unwrap_or(today);
            let range = DateRange::between(start, to.unwrap_or(today.max(start)))?;
            let blocks = db.blocks_for(user_id, range, archived)?;
            print_json(&blocks)?;
        }
    }
    Ok(())
}
