use clap::Subcommand;
use roundtrack_core::Config;

use super::{open_context, print_json, CliResult};

#[derive(Subcommand)]
pub enum DayAction {
    /// Archive the day's blocks and restart round numbering
    New {
        /// Required: archived blocks leave the live views
        #[arg(long)]
        confirm: bool,
        #[arg(long)]
        user: Option<i64>,
    },
}

pub fn run(action: DayAction) -> CliResult {
    let config = Config::load()?;
    match action {
        DayAction::New { confirm, user } => {
            let mut ctx = open_context(&config, user)?;
            let event = ctx.new_day(confirm)?;
            print_json(&event)?;
        }
    }
    Ok(())
}
