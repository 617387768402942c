//! Live round: counters plus timer for one user.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::block::Block;
use crate::error::ValidationError;
use crate::events::Event;
use crate::process::{CounterSet, Field, ProcessType};
use crate::timer::{ConfigureOutcome, TimerConfig, TimerEngine, TimerState};

/// The mutable half of the lifecycle.
///
/// Every method takes `&mut self` and runs to completion, so a finalize can
/// never interleave with a counter edit or a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSession {
    user_id: i64,
    counters: CounterSet,
    timer: TimerEngine,
    /// Number the next finalized block will carry, starting at 1.
    round: u32,
    /// Wall-clock instant the current round was first started.
    started_at: Option<DateTime<Utc>>,
}

impl RoundSession {
    /// # Errors
    /// Rejects an invalid timer configuration.
    pub fn new(
        user_id: i64,
        process: ProcessType,
        timer: TimerConfig,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            user_id,
            counters: CounterSet::new(process),
            timer: TimerEngine::new(timer)?,
            round: 1,
            started_at: None,
        })
    }

    /// Continue numbering after blocks already recorded today.
    pub fn with_round(mut self, round: u32) -> Self {
        self.round = round.max(1);
        self
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn process(&self) -> ProcessType {
        self.counters.process()
    }

    pub fn counters(&self) -> &CounterSet {
        &self.counters
    }

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    // ── Timer ────────────────────────────────────────────────────────

    pub fn start(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let event = self.timer.start()?;
        self.started_at.get_or_insert(now);
        Some(event)
    }

    pub fn pause(&mut self) -> Option<Event> {
        self.timer.pause()
    }

    /// Restart the countdown. Counters are kept: a reset round is still the
    /// same round until it is finalized.
    pub fn reset_timer(&mut self) -> Option<Event> {
        self.started_at = None;
        self.timer.reset()
    }

    pub fn tick(&mut self) -> Option<Event> {
        self.timer.tick()
    }

    pub fn catch_up(&mut self, missed_secs: u64) -> Vec<Event> {
        self.timer.catch_up(missed_secs)
    }

    /// # Errors
    /// Rejects an invalid configuration.
    pub fn configure(&mut self, config: TimerConfig) -> Result<ConfigureOutcome, ValidationError> {
        self.timer.configure(config)
    }

    // ── Counters ─────────────────────────────────────────────────────

    /// # Errors
    /// Rejects a zero delta or a field of another process.
    pub fn increment(&mut self, field: Field, delta: u32) -> Result<Event, ValidationError> {
        let value = self.counters.increment(field, delta)?;
        Ok(Event::CounterChanged {
            field: field.id().to_string(),
            value,
        })
    }

    /// Clamps at zero.
    ///
    /// # Errors
    /// Rejects a zero delta or a field of another process.
    pub fn decrement(&mut self, field: Field, delta: u32) -> Result<Event, ValidationError> {
        let value = self.counters.decrement(field, delta)?;
        Ok(Event::CounterChanged {
            field: field.id().to_string(),
            value,
        })
    }

    /// Change the active process. Only allowed between rounds, and drops
    /// the (necessarily empty) counters of the previous process.
    ///
    /// # Errors
    /// [`ValidationError::RoundInProgress`] when the timer is not idle or
    /// counters hold unsaved values.
    pub fn switch_process(&mut self, process: ProcessType) -> Result<(), ValidationError> {
        if process == self.process() {
            return Ok(());
        }
        if self.timer.state() != TimerState::Idle || !self.counters.is_all_zero() {
            return Err(ValidationError::RoundInProgress("switch process"));
        }
        self.counters = CounterSet::new(process);
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Freeze the round into a block and roll over to the next one.
    ///
    /// Captures a copy of the counters, the configured duration and the
    /// consumed seconds, then zeroes counters, bumps the round number and
    /// resets the timer to idle. Empty rounds still produce a block.
    pub fn finalize(&mut self, now: DateTime<Utc>, date: NaiveDate) -> Block {
        let block = Block::capture(
            self.user_id,
            self.round,
            date,
            self.started_at.unwrap_or(now),
            now,
            self.timer.config().duration_min,
            self.timer.consumed_secs(),
            self.counters.clone(),
        );
        info!(
            block_id = block.id(),
            round = self.round,
            process = %self.process(),
            done = block.done(),
            elapsed_secs = block.elapsed_secs(),
            "round finalized"
        );

        self.counters.reset();
        self.round += 1;
        self.started_at = None;
        self.timer.reset();
        block
    }
}
