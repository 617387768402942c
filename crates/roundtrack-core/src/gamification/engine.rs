use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::achievements::{catalog, HistoryView};
use super::cosmetics::cosmetics_for_level;
use super::levels::{LevelProgress, LevelTable};
use super::profile::GamificationProfile;
use super::streak::update_streak;
use super::XpReason;
use crate::events::Event;
use crate::round::Block;

/// XP formula and level table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamificationConfig {
    /// XP per item of the process' primary "done" field.
    #[serde(default = "default_xp_per_item")]
    pub xp_per_item: u64,
    /// Flat XP for every finalized block, empty ones included.
    #[serde(default = "default_block_bonus")]
    pub block_bonus: u64,
    #[serde(default)]
    pub levels: LevelTable,
}

fn default_xp_per_item() -> u64 {
    2
}
fn default_block_bonus() -> u64 {
    10
}

impl Default for GamificationConfig {
    fn default() -> Self {
        Self {
            xp_per_item: default_xp_per_item(),
            block_bonus: default_block_bonus(),
            levels: LevelTable::default(),
        }
    }
}

/// Stateless rules applied to a [`GamificationProfile`].
#[derive(Debug, Clone, Default)]
pub struct GamificationEngine {
    config: GamificationConfig,
}

impl GamificationEngine {
    pub fn new(config: GamificationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GamificationConfig {
        &self.config
    }

    pub fn xp_for_block(&self, block: &Block) -> u64 {
        u64::from(block.done())
            .saturating_mul(self.config.xp_per_item)
            .saturating_add(self.config.block_bonus)
    }

    pub fn award_for_block(&self, profile: &mut GamificationProfile, block: &Block) -> Event {
        let amount = self.xp_for_block(block);
        let total = profile.add_xp(amount);
        debug!(user_id = profile.user_id(), amount, total, "xp awarded for block");
        Event::XpAwarded {
            amount,
            total,
            reason: XpReason::Block,
        }
    }

    pub fn update_streak(
        &self,
        profile: &mut GamificationProfile,
        date: chrono::NaiveDate,
    ) -> Event {
        let change = update_streak(profile, date);
        Event::StreakUpdated {
            streak: profile.streak(),
            change,
        }
    }

    pub fn evaluate_level(&self, xp: u64) -> LevelProgress {
        self.config.levels.evaluate(xp)
    }

    pub fn level_of(&self, profile: &GamificationProfile) -> LevelProgress {
        self.evaluate_level(profile.xp())
    }

    /// Unlock every achievement whose predicate now holds.
    ///
    /// Rewards are added as they unlock and the level is recomputed after
    /// each one, so a reward that crosses a level can unlock a level
    /// achievement in the same pass. Already unlocked entries are skipped.
    pub fn evaluate_achievements(
        &self,
        profile: &mut GamificationProfile,
        history: &HistoryView,
    ) -> Vec<Event> {
        let mut view = HistoryView {
            streak: profile.streak(),
            level: self.level_of(profile).level,
            ..*history
        };
        let mut events = Vec::new();
        loop {
            let mut unlocked_any = false;
            for achievement in catalog() {
                let id = achievement.id.as_str();
                if profile.has_achievement(id) || !achievement.id.is_met(&view) {
                    continue;
                }
                profile.unlock_achievement(id);
                let total = profile.add_xp(achievement.xp_reward);
                info!(user_id = profile.user_id(), achievement = id, "achievement unlocked");
                events.push(Event::AchievementUnlocked {
                    achievement: id.to_string(),
                    xp_reward: achievement.xp_reward,
                });
                events.push(Event::XpAwarded {
                    amount: achievement.xp_reward,
                    total,
                    reason: XpReason::Achievement,
                });
                view.level = self.level_of(profile).level;
                unlocked_any = true;
            }
            if !unlocked_any {
                return events;
            }
        }
    }

    /// Emit a level-up from `previous_level` and unlock the cosmetics that
    /// come with the current level.
    pub fn apply_level(
        &self,
        profile: &mut GamificationProfile,
        previous_level: u32,
    ) -> Vec<Event> {
        let level = self.level_of(profile).level;
        let mut events = Vec::new();
        if level > previous_level {
            info!(user_id = profile.user_id(), from = previous_level, to = level, "level up");
            events.push(Event::LevelUp {
                from: previous_level,
                to: level,
            });
        }
        for cosmetic in cosmetics_for_level(level) {
            if profile.unlock_cosmetic(cosmetic.id) {
                events.push(Event::CosmeticUnlocked {
                    cosmetic: cosmetic.id.to_string(),
                });
            }
        }
        events
    }

    /// Full pipeline for one finalized block, in the required order:
    /// award → streak → achievements → level.
    ///
    /// `history` must already include `block`.
    pub fn on_block_finalized(
        &self,
        profile: &mut GamificationProfile,
        block: &Block,
        history: &HistoryView,
    ) -> Vec<Event> {
        let previous_level = self.level_of(profile).level;
        let mut events = vec![self.award_for_block(profile, block)];
        events.push(self.update_streak(profile, block.date()));
        events.extend(self.evaluate_achievements(profile, history));
        events.extend(self.apply_level(profile, previous_level));
        events
    }
}
