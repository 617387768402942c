use clap::Subcommand;
use roundtrack_core::gamification::GamificationEngine;
use roundtrack_core::storage::Database;
use roundtrack_core::Config;

use super::{open_context, print_json, resolve_user, CliResult};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show XP, level, streak, achievements and cosmetics
    Show {
        #[arg(long)]
        user: Option<i64>,
    },
    /// Admin correction of a user's XP
    SetXp {
        xp: u64,
        #[arg(long)]
        user: Option<i64>,
    },
}

pub fn run(action: ProfileAction) -> CliResult {
    let config = Config::load()?;
    match action {
        ProfileAction::Show { user } => {
            let user_id = resolve_user(&config, user)?;
            let db = Database::open()?;
            let user = db.user(user_id)?;
            let profile = db.load_profile(user_id)?;
            let level = GamificationEngine::new(config.gamification.clone()).level_of(&profile);
            let today = chrono::Local::now().date_naive();
            print_json(&serde_json::json!({
                "user": user,
                "xp": profile.xp(),
                "level": level.level,
                "level_progress_pct": level.progress_pct(),
                "next_level_xp": level.next_threshold,
                "streak": profile.current_streak(today),
                "best_streak": profile.best_streak(),
                "last_active": profile.last_active(),
                "achievements": profile.achievements(),
                "cosmetics": profile.cosmetics(),
            }))?;
        }
        ProfileAction::SetXp { xp, user } => {
            let mut ctx = open_context(&config, user)?;
            for event in ctx.correct_xp(xp)? {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }
    Ok(())
}
