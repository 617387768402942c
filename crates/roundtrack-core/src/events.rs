use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::gamification::{StreakChange, XpReason};
use crate::process::ProcessType;
use crate::timer::{ColorBand, TimerState};

/// Every state change in the session engine produces an Event.
/// Hosts render them, play the finish sound, or forward them elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        remaining_secs: u64,
        /// True when leaving `Paused`.
        resumed: bool,
    },
    TimerPaused {
        remaining_secs: u64,
    },
    TimerReset {
        remaining_secs: u64,
    },
    /// Countdown reached zero. `sound` mirrors the configured flag for the
    /// audio/haptic notifier.
    TimerFinished {
        duration_min: u32,
        sound: bool,
    },
    BandChanged {
        band: ColorBand,
    },
    StateSnapshot {
        state: TimerState,
        remaining_secs: u64,
        total_secs: u64,
        band: ColorBand,
        progress_pct: f64,
    },
    CounterChanged {
        field: String,
        value: u32,
    },
    BlockFinalized {
        block_id: String,
        round: u32,
        process: ProcessType,
        done: u32,
        success_pct: f64,
    },
    XpAwarded {
        amount: u64,
        total: u64,
        reason: XpReason,
    },
    /// Admin override of a profile's XP.
    XpCorrected {
        from: u64,
        to: u64,
    },
    StreakUpdated {
        streak: u32,
        change: StreakChange,
    },
    AchievementUnlocked {
        achievement: String,
        xp_reward: u64,
    },
    LevelUp {
        from: u32,
        to: u32,
    },
    CosmeticUnlocked {
        cosmetic: String,
    },
    DayArchived {
        date: NaiveDate,
        blocks: usize,
    },
    SyncQueued {
        item_id: String,
        operation: String,
    },
}
