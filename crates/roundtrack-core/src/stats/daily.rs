//! Daily aggregation of blocks.
//!
//! Rollups sum raw counters first and derive success and throughput from
//! the totals, so a short block weighs exactly as much as the work it
//! holds.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::metrics::{success_rate, throughput};
use crate::process::ProcessType;
use crate::round::Block;

/// Inclusive date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// `today - days ..= today`, starting no earlier than the first
    /// representable date.
    pub fn rolling(today: NaiveDate, days: u32) -> Self {
        Self {
            start: today
                .checked_sub_days(Days::new(u64::from(days)))
                .unwrap_or(NaiveDate::MIN),
            end: today,
        }
    }

    /// # Errors
    /// Rejects `start > end`.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Totals for one process over a selection of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollup {
    pub process: ProcessType,
    pub block_count: usize,
    pub elapsed_minutes: u64,
    /// Summed value per field id, derived fields included.
    pub totals: BTreeMap<String, u64>,
    pub done: u64,
    pub cancelled: u64,
    pub success_pct: f64,
    pub items_per_minute: u64,
}

impl Rollup {
    fn empty(process: ProcessType) -> Self {
        let mut totals = BTreeMap::new();
        for field in process.fields() {
            totals.insert(field.id().to_string(), 0);
        }
        for derived in process.derived_fields() {
            totals.insert(derived.id().to_string(), 0);
        }
        Self {
            process,
            block_count: 0,
            elapsed_minutes: 0,
            totals,
            done: 0,
            cancelled: 0,
            success_pct: 0.0,
            items_per_minute: 0,
        }
    }

    fn add(&mut self, block: &Block) {
        self.block_count += 1;
        self.elapsed_minutes += block.elapsed_minutes();
        for (id, value) in block.counters().to_map() {
            *self.totals.entry(id).or_insert(0) += u64::from(value);
        }
        self.done += u64::from(block.done());
        self.cancelled += u64::from(block.cancelled());
    }

    fn finish(mut self) -> Self {
        self.success_pct = success_rate(self.done, self.cancelled);
        self.items_per_minute = throughput(self.done, self.elapsed_minutes);
        self
    }
}

/// One calendar day for one user, split by process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub user_id: i64,
    pub block_count: usize,
    pub rollups: Vec<Rollup>,
}

/// Stateless aggregation over a block slice.
pub struct DailyAggregator;

impl DailyAggregator {
    /// Blocks of `user_id` whose date falls in `range`.
    pub fn select<'a>(
        blocks: &'a [Block],
        user_id: i64,
        range: DateRange,
    ) -> impl Iterator<Item = &'a Block> + 'a {
        blocks
            .iter()
            .filter(move |b| b.user_id() == user_id && range.contains(b.date()))
    }

    /// Rollup of one process. Returns an all-zero rollup when nothing matches.
    pub fn rollup(
        blocks: &[Block],
        user_id: i64,
        range: DateRange,
        process: ProcessType,
    ) -> Rollup {
        Self::select(blocks, user_id, range)
            .filter(|b| b.process() == process)
            .fold(Rollup::empty(process), |mut acc, b| {
                acc.add(b);
                acc
            })
            .finish()
    }

    /// One rollup per process that has at least one matching block.
    pub fn per_process(blocks: &[Block], user_id: i64, range: DateRange) -> Vec<Rollup> {
        let mut by_process: BTreeMap<ProcessType, Rollup> = BTreeMap::new();
        for block in Self::select(blocks, user_id, range) {
            by_process
                .entry(block.process())
                .or_insert_with(|| Rollup::empty(block.process()))
                .add(block);
        }
        by_process.into_values().map(Rollup::finish).collect()
    }

    /// Per-day summaries in ascending date order. Days without blocks are
    /// omitted.
    pub fn by_day(blocks: &[Block], user_id: i64, range: DateRange) -> Vec<DailySummary> {
        let mut dates: Vec<NaiveDate> = Self::select(blocks, user_id, range)
            .map(|b| b.date())
            .collect();
        dates.sort();
        dates.dedup();

        dates
            .into_iter()
            .map(|date| {
                let day = DateRange::single(date);
                let rollups = Self::per_process(blocks, user_id, day);
                DailySummary {
                    date,
                    user_id,
                    block_count: rollups.iter().map(|r| r.block_count).sum(),
                    rollups,
                }
            })
            .collect()
    }
}
