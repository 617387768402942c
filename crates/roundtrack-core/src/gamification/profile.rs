use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-user gamification state. Only the engine moves XP forward; the
/// single way back is [`GamificationProfile::correct_xp`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamificationProfile {
    user_id: i64,
    xp: u64,
    streak: u32,
    #[serde(default)]
    best_streak: u32,
    last_active: Option<NaiveDate>,
    #[serde(default)]
    achievements: BTreeSet<String>,
    #[serde(default)]
    cosmetics: BTreeSet<String>,
}

impl GamificationProfile {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            xp: 0,
            streak: 0,
            best_streak: 0,
            last_active: None,
            achievements: BTreeSet::new(),
            cosmetics: BTreeSet::new(),
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn xp(&self) -> u64 {
        self.xp
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn best_streak(&self) -> u32 {
        self.best_streak
    }

    pub fn last_active(&self) -> Option<NaiveDate> {
        self.last_active
    }

    pub fn achievements(&self) -> &BTreeSet<String> {
        &self.achievements
    }

    pub fn cosmetics(&self) -> &BTreeSet<String> {
        &self.cosmetics
    }

    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.contains(id)
    }

    /// Streak as seen on `today`: a streak whose last day is older than
    /// yesterday is already broken even if no block reset it yet.
    pub fn current_streak(&self, today: NaiveDate) -> u32 {
        match self.last_active {
            Some(last) if today.signed_duration_since(last).num_days() <= 1 => self.streak,
            _ => 0,
        }
    }

    /// Admin correction. The only operation allowed to lower XP.
    /// Achievements and cosmetics already unlocked are kept.
    pub fn correct_xp(&mut self, xp: u64) {
        warn!(user_id = self.user_id, from = self.xp, to = xp, "xp corrected by admin");
        self.xp = xp;
    }

    pub(crate) fn add_xp(&mut self, amount: u64) -> u64 {
        self.xp = self.xp.saturating_add(amount);
        self.xp
    }

    pub(crate) fn set_streak(&mut self, streak: u32, last_active: NaiveDate) {
        self.streak = streak;
        self.best_streak = self.best_streak.max(streak);
        self.last_active = Some(last_active);
    }

    /// Returns false if it was already unlocked.
    pub(crate) fn unlock_achievement(&mut self, id: &str) -> bool {
        self.achievements.insert(id.to_string())
    }

    pub(crate) fn unlock_cosmetic(&mut self, id: &str) -> bool {
        self.cosmetics.insert(id.to_string())
    }
}
