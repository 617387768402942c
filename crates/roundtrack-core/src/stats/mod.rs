//! Read-side statistics over finalized blocks.
//!
//! Everything here is a pure function of a block slice; nothing is cached
//! or mutated.

mod daily;

pub use daily::{DailyAggregator, DailySummary, DateRange, Rollup};
