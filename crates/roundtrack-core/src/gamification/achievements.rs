//! Achievement catalog.
//!
//! Achievements are static: an id, a predicate over the user's aggregate
//! history and an XP reward. Unlocking is recorded on the profile.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::round::Block;

/// Aggregate history an achievement predicate can look at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryView {
    pub total_blocks: u64,
    /// Primary "done" items across every process.
    pub total_done: u64,
    pub best_block_done: u32,
    /// Blocks with at least 10 done and nothing cancelled.
    pub perfect_blocks: u64,
    pub done_today: u64,
    /// The user's daily goal; 0 disables the goal achievement.
    pub daily_goal: u32,
    pub streak: u32,
    pub level: u32,
}

impl HistoryView {
    /// Aggregate every block of one user. `streak` and `level` are left at
    /// zero; the engine fills them from the profile.
    pub fn from_blocks<'a>(
        blocks: impl IntoIterator<Item = &'a Block>,
        today: NaiveDate,
        daily_goal: u32,
    ) -> Self {
        let mut view = HistoryView {
            daily_goal,
            ..HistoryView::default()
        };
        for block in blocks {
            let done = block.done();
            view.total_blocks += 1;
            view.total_done += u64::from(done);
            view.best_block_done = view.best_block_done.max(done);
            if done >= PERFECT_MIN_DONE && block.cancelled() == 0 {
                view.perfect_blocks += 1;
            }
            if block.date() == today {
                view.done_today += u64::from(done);
            }
        }
        view
    }
}

const PERFECT_MIN_DONE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AchievementId {
    FirstBlock,      // Finalize 1 block
    TenBlocks,       // Finalize 10 blocks
    FiftyBlocks,     // Finalize 50 blocks
    HundredItems,    // 100 items done
    ThousandItems,   // 1,000 items done
    BusyRound,       // 30 items done in a single block
    PerfectRound,    // A perfect block
    DailyGoal,       // Meet the daily goal
    ThreeDayStreak,  // 3-day streak
    WeekStreak,      // 7-day streak
    LevelFive,       // Reach level 5
}

/// Catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct Achievement {
    pub id: AchievementId,
    pub name: &'static str,
    pub description: &'static str,
    pub xp_reward: u64,
}

impl AchievementId {
    /// Stable id stored on profiles.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstBlock => "first_block",
            Self::TenBlocks => "ten_blocks",
            Self::FiftyBlocks => "fifty_blocks",
            Self::HundredItems => "hundred_items",
            Self::ThousandItems => "thousand_items",
            Self::BusyRound => "busy_round",
            Self::PerfectRound => "perfect_round",
            Self::DailyGoal => "daily_goal",
            Self::ThreeDayStreak => "three_day_streak",
            Self::WeekStreak => "week_streak",
            Self::LevelFive => "level_five",
        }
    }

    pub fn is_met(&self, h: &HistoryView) -> bool {
        match self {
            Self::FirstBlock => h.total_blocks >= 1,
            Self::TenBlocks => h.total_blocks >= 10,
            Self::FiftyBlocks => h.total_blocks >= 50,
            Self::HundredItems => h.total_done >= 100,
            Self::ThousandItems => h.total_done >= 1_000,
            Self::BusyRound => h.best_block_done >= 30,
            Self::PerfectRound => h.perfect_blocks >= 1,
            Self::DailyGoal => h.daily_goal > 0 && h.done_today >= u64::from(h.daily_goal),
            Self::ThreeDayStreak => h.streak >= 3,
            Self::WeekStreak => h.streak >= 7,
            Self::LevelFive => h.level >= 5,
        }
    }
}

const CATALOG: &[Achievement] = &[
    Achievement {
        id: AchievementId::FirstBlock,
        name: "First round",
        description: "Finalize your first block",
        xp_reward: 20,
    },
    Achievement {
        id: AchievementId::TenBlocks,
        name: "Warming up",
        description: "Finalize 10 blocks",
        xp_reward: 50,
    },
    Achievement {
        id: AchievementId::FiftyBlocks,
        name: "Regular",
        description: "Finalize 50 blocks",
        xp_reward: 150,
    },
    Achievement {
        id: AchievementId::HundredItems,
        name: "Centurion",
        description: "Complete 100 items",
        xp_reward: 75,
    },
    Achievement {
        id: AchievementId::ThousandItems,
        name: "Heavy lifter",
        description: "Complete 1,000 items",
        xp_reward: 300,
    },
    Achievement {
        id: AchievementId::BusyRound,
        name: "Busy round",
        description: "Complete 30 items in a single block",
        xp_reward: 60,
    },
    Achievement {
        id: AchievementId::PerfectRound,
        name: "Clean sheet",
        description: "Complete at least 10 items in a block with no cancellations",
        xp_reward: 40,
    },
    Achievement {
        id: AchievementId::DailyGoal,
        name: "Goal!",
        description: "Reach your daily goal",
        xp_reward: 50,
    },
    Achievement {
        id: AchievementId::ThreeDayStreak,
        name: "On a roll",
        description: "Work three days in a row",
        xp_reward: 40,
    },
    Achievement {
        id: AchievementId::WeekStreak,
        name: "Full week",
        description: "Work seven days in a row",
        xp_reward: 120,
    },
    Achievement {
        id: AchievementId::LevelFive,
        name: "Veteran",
        description: "Reach level 5",
        xp_reward: 100,
    },
];

pub fn catalog() -> &'static [Achievement] {
    CATALOG
}
