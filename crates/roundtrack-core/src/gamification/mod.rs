//! Experience, levels, streaks and achievements.
//!
//! The engine turns finalized blocks into XP in a fixed order:
//! award → streak → achievements → level. Later steps read what earlier
//! steps wrote, so the order is part of the contract.

mod achievements;
mod cosmetics;
mod engine;
mod levels;
mod profile;
mod streak;

pub use achievements::{catalog, Achievement, AchievementId, HistoryView};
pub use cosmetics::{cosmetics_for_level, Cosmetic, CosmeticKind, COSMETICS};
pub use engine::{GamificationConfig, GamificationEngine};
pub use levels::{LevelProgress, LevelTable};
pub use profile::GamificationProfile;
pub use streak::{update_streak, StreakChange};

use serde::{Deserialize, Serialize};

/// Why XP changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpReason {
    Block,
    Achievement,
}
