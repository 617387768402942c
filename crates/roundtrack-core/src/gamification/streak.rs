//! Consecutive-day streak tracking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::profile::GamificationProfile;

/// What an activity day did to the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// First recorded activity.
    Started,
    /// Activity on the day after the last active day.
    Extended,
    /// Another block on the same day.
    Unchanged,
    /// A gap of two or more days.
    Reset,
    /// Activity dated before the last active day (late backfill); the
    /// streak and last active day are left alone.
    Ignored,
}

/// Register activity on `date`.
pub fn update_streak(profile: &mut GamificationProfile, date: NaiveDate) -> StreakChange {
    let Some(last) = profile.last_active() else {
        profile.set_streak(1, date);
        return StreakChange::Started;
    };

    match date.signed_duration_since(last).num_days() {
        0 => StreakChange::Unchanged,
        1 => {
            profile.set_streak(profile.streak().saturating_add(1), date);
            StreakChange::Extended
        }
        gap if gap >= 2 => {
            profile.set_streak(1, date);
            StreakChange::Reset
        }
        _ => StreakChange::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn consecutive_days_extend() {
        let mut p = GamificationProfile::new(1);
        assert_eq!(update_streak(&mut p, day(1)), StreakChange::Started);
        assert_eq!(update_streak(&mut p, day(2)), StreakChange::Extended);
        assert_eq!(update_streak(&mut p, day(3)), StreakChange::Extended);
        assert_eq!(p.streak(), 3);
        assert_eq!(p.last_active(), Some(day(3)));
    }

    #[test]
    fn same_day_is_idempotent() {
        let mut p = GamificationProfile::new(1);
        update_streak(&mut p, day(1));
        update_streak(&mut p, day(2));
        assert_eq!(update_streak(&mut p, day(2)), StreakChange::Unchanged);
        assert_eq!(p.streak(), 2);
    }

    #[test]
    fn gap_resets_to_one() {
        let mut p = GamificationProfile::new(1);
        update_streak(&mut p, day(1));
        assert_eq!(update_streak(&mut p, day(6)), StreakChange::Reset);
        assert_eq!(p.streak(), 1);
        assert_eq!(p.last_active(), Some(day(6)));
        assert_eq!(p.best_streak(), 1);
    }

    #[test]
    fn earlier_dates_do_not_rewind() {
        let mut p = GamificationProfile::new(1);
        update_streak(&mut p, day(4));
        update_streak(&mut p, day(5));
        assert_eq!(update_streak(&mut p, day(2)), StreakChange::Ignored);
        assert_eq!(p.streak(), 2);
        assert_eq!(p.last_active(), Some(day(5)));
    }

    #[test]
    fn current_streak_breaks_after_a_missed_day() {
        let mut p = GamificationProfile::new(1);
        update_streak(&mut p, day(1));
        update_streak(&mut p, day(2));
        assert_eq!(p.current_streak(day(3)), 2);
        assert_eq!(p.current_streak(day(4)), 0);
    }
}
