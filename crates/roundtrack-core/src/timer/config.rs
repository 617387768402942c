use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Urgency band derived from the share of time left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBand {
    Green,
    Yellow,
    Orange,
    Red,
}

/// Round timer configuration.
///
/// Thresholds are percentages of *remaining* time and must satisfy
/// `red < orange < yellow <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    pub duration_min: u32,
    pub yellow_pct: u8,
    pub orange_pct: u8,
    pub red_pct: u8,
    #[serde(default = "default_true")]
    pub sound_on_finish: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            duration_min: 25,
            yellow_pct: 50,
            orange_pct: 25,
            red_pct: 10,
            sound_on_finish: true,
        }
    }
}

impl TimerConfig {
    /// # Errors
    /// Returns [`ValidationError::ZeroDuration`] for a zero duration and
    /// [`ValidationError::UnorderedThresholds`] when the bands overlap or
    /// exceed 100%.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.duration_min == 0 {
            return Err(ValidationError::ZeroDuration);
        }
        let ordered = self.red_pct < self.orange_pct
            && self.orange_pct < self.yellow_pct
            && self.yellow_pct <= 100;
        if !ordered {
            return Err(ValidationError::UnorderedThresholds {
                yellow: self.yellow_pct,
                orange: self.orange_pct,
                red: self.red_pct,
            });
        }
        Ok(())
    }

    pub fn total_secs(&self) -> u64 {
        u64::from(self.duration_min) * 60
    }

    /// Band for `remaining_secs` left out of the configured duration.
    pub fn band_for(&self, remaining_secs: u64) -> ColorBand {
        let total = self.total_secs();
        if total == 0 {
            return ColorBand::Red;
        }
        let pct = remaining_secs as f64 / total as f64 * 100.0;
        if pct <= f64::from(self.red_pct) {
            ColorBand::Red
        } else if pct <= f64::from(self.orange_pct) {
            ColorBand::Orange
        } else if pct <= f64::from(self.yellow_pct) {
            ColorBand::Yellow
        } else {
            ColorBand::Green
        }
    }
}
