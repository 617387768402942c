use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::metrics::{success_rate, throughput};
use crate::process::{CounterSet, CounterSnapshot, ProcessType};

/// Where a block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockSource {
    /// Captured from a live round.
    #[default]
    Live,
    /// Backfilled from an external import.
    Imported,
    /// Pulled from the remote service during reconciliation.
    Remote,
}

/// Immutable record of a finished round.
///
/// Fields are private: a block can be read, stored and shipped, but never
/// edited after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    id: String,
    user_id: i64,
    process: ProcessType,
    round: u32,
    date: NaiveDate,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    duration_min: u32,
    elapsed_secs: u64,
    counters: CounterSet,
    success_pct: f64,
    items_per_minute: u64,
    #[serde(default)]
    source: BlockSource,
}

/// Proto-block exchanged with collaborators: import backfills and the
/// remote sync endpoint both speak this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: i64,
    pub process: ProcessType,
    #[serde(default)]
    pub round: u32,
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_min: u32,
    pub elapsed_minutes: u32,
    pub fields: BTreeMap<String, u32>,
}

impl Block {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn capture(
        user_id: i64,
        round: u32,
        date: NaiveDate,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        duration_min: u32,
        elapsed_secs: u64,
        counters: CounterSet,
    ) -> Self {
        let mut block = Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            process: counters.process(),
            round,
            date,
            started_at,
            ended_at,
            duration_min,
            elapsed_secs,
            counters,
            success_pct: 0.0,
            items_per_minute: 0,
            source: BlockSource::Live,
        };
        block.success_pct = success_rate(block.done().into(), block.cancelled().into());
        block.items_per_minute = throughput(block.done().into(), block.elapsed_minutes());
        block
    }

    /// Build a block from a collaborator record.
    ///
    /// # Errors
    /// Rejects unknown field ids and an end time before the start time.
    pub fn from_draft(draft: BlockDraft, source: BlockSource) -> Result<Self, ValidationError> {
        if draft.ended_at < draft.started_at {
            return Err(ValidationError::InvalidValue {
                field: "ended_at".into(),
                message: format!(
                    "{} is before started_at {}",
                    draft.ended_at, draft.started_at
                ),
            });
        }
        let counters = CounterSet::try_from(CounterSnapshot {
            process: draft.process,
            fields: draft.fields,
        })?;
        let mut block = Self::capture(
            draft.user_id,
            draft.round,
            draft.date,
            draft.started_at,
            draft.ended_at,
            draft.duration_min,
            u64::from(draft.elapsed_minutes) * 60,
            counters,
        );
        if let Some(id) = draft.id {
            block.id = id;
        }
        block.source = source;
        Ok(block)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn process(&self) -> ProcessType {
        self.process
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    pub fn duration_min(&self) -> u32 {
        self.duration_min
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    /// Consumed time floored to whole minutes.
    pub fn elapsed_minutes(&self) -> u64 {
        self.elapsed_secs / 60
    }

    pub fn counters(&self) -> &CounterSet {
        &self.counters
    }

    pub fn done(&self) -> u32 {
        self.counters.done()
    }

    pub fn cancelled(&self) -> u32 {
        self.counters.cancelled()
    }

    pub fn success_pct(&self) -> f64 {
        self.success_pct
    }

    pub fn items_per_minute(&self) -> u64 {
        self.items_per_minute
    }

    pub fn source(&self) -> BlockSource {
        self.source
    }
}

impl From<&Block> for BlockDraft {
    fn from(block: &Block) -> Self {
        Self {
            id: Some(block.id.clone()),
            user_id: block.user_id,
            process: block.process,
            round: block.round,
            date: block.date,
            started_at: block.started_at,
            ended_at: block.ended_at,
            duration_min: block.duration_min,
            elapsed_minutes: u32::try_from(block.elapsed_minutes()).unwrap_or(u32::MAX),
            fields: block.counters.to_map(),
        }
    }
}
