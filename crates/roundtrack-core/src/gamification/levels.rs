use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One row of the level table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelEntry {
    pub level: u32,
    pub xp_required: u64,
}

/// Strictly increasing `(level, xp_required)` table starting at 0 XP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LevelEntry>", into = "Vec<LevelEntry>")]
pub struct LevelTable {
    entries: Vec<LevelEntry>,
}

/// Where an XP total sits in the table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    pub xp: u64,
    pub current_threshold: u64,
    /// `None` at the max level.
    pub next_threshold: Option<u64>,
    /// 0.0 ..= 1.0 towards the next level; 1.0 at the max level.
    pub progress: f64,
}

impl LevelProgress {
    /// Whole percent, floored.
    pub fn progress_pct(&self) -> u8 {
        (self.progress * 100.0).floor().clamp(0.0, 100.0) as u8
    }

    pub fn is_max(&self) -> bool {
        self.next_threshold.is_none()
    }
}

impl LevelTable {
    /// # Errors
    /// The table must be non-empty, start at 0 XP and be strictly
    /// increasing in both level and XP.
    pub fn new(entries: Vec<LevelEntry>) -> Result<Self, ValidationError> {
        let first = entries
            .first()
            .ok_or_else(|| ValidationError::InvalidLevelTable("table is empty".into()))?;
        if first.xp_required != 0 {
            return Err(ValidationError::InvalidLevelTable(format!(
                "first level requires {} XP, expected 0",
                first.xp_required
            )));
        }
        for pair in entries.windows(2) {
            if pair[1].level <= pair[0].level || pair[1].xp_required <= pair[0].xp_required {
                return Err(ValidationError::InvalidLevelTable(format!(
                    "level {} ({} XP) does not follow level {} ({} XP)",
                    pair[1].level, pair[1].xp_required, pair[0].level, pair[0].xp_required
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Convenience constructor from `(level, xp)` pairs.
    ///
    /// # Errors
    /// See [`LevelTable::new`].
    pub fn from_pairs(pairs: &[(u32, u64)]) -> Result<Self, ValidationError> {
        Self::new(
            pairs
                .iter()
                .map(|&(level, xp_required)| LevelEntry { level, xp_required })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[LevelEntry] {
        &self.entries
    }

    pub fn max_level(&self) -> u32 {
        self.entries.last().map(|e| e.level).unwrap_or(1)
    }

    /// Greatest entry with `xp_required <= xp`.
    pub fn evaluate(&self, xp: u64) -> LevelProgress {
        let idx = self
            .entries
            .partition_point(|e| e.xp_required <= xp)
            .saturating_sub(1);
        let current = self.entries[idx];
        let next = self.entries.get(idx + 1).map(|e| e.xp_required);
        let progress = match next {
            Some(next) => (xp - current.xp_required) as f64 / (next - current.xp_required) as f64,
            None => 1.0,
        };
        LevelProgress {
            level: current.level,
            xp,
            current_threshold: current.xp_required,
            next_threshold: next,
            progress,
        }
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        let entries = [
            (1, 0),
            (2, 100),
            (3, 250),
            (4, 500),
            (5, 900),
            (6, 1_400),
            (7, 2_100),
            (8, 3_000),
            (9, 4_200),
            (10, 6_000),
        ]
        .into_iter()
        .map(|(level, xp_required)| LevelEntry { level, xp_required })
        .collect();
        Self { entries }
    }
}

impl TryFrom<Vec<LevelEntry>> for LevelTable {
    type Error = ValidationError;

    fn try_from(entries: Vec<LevelEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<LevelTable> for Vec<LevelEntry> {
    fn from(table: LevelTable) -> Self {
        table.entries
    }
}
