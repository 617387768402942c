//! Round countdown engine.
//!
//! The engine is a tick-driven state machine. It does not read the clock
//! and does not own a thread - the host delivers one `tick()` per second.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused <-> Running) -> Finished -> Idle
//!                      reset() from any state -> Idle
//! ```
//!
//! Commands requested from a state that does not allow them return `None`
//! and leave the engine untouched.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(TimerConfig::default())?;
//! engine.start();
//! // Once per second:
//! if let Some(Event::TimerFinished { .. }) = engine.tick() { /* finalize */ }
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::{ColorBand, TimerConfig};
use crate::error::ValidationError;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Finished,
}

/// What `configure` did with the requested duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// Everything applied immediately.
    Applied,
    /// Thresholds applied; the new duration waits for the next reset.
    DurationQueued,
}

/// Core countdown engine for one user session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    config: TimerConfig,
    state: TimerState,
    remaining_secs: u64,
    /// Duration requested while a round was active.
    #[serde(default)]
    pending_duration_min: Option<u32>,
}

impl TimerEngine {
    /// Create an idle engine with a full countdown.
    ///
    /// # Errors
    /// Rejects an invalid configuration.
    pub fn new(config: TimerConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            config,
            state: TimerState::Idle,
            remaining_secs: config.total_secs(),
            pending_duration_min: None,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn total_secs(&self) -> u64 {
        self.config.total_secs()
    }

    /// Seconds of the countdown already used.
    pub fn consumed_secs(&self) -> u64 {
        self.total_secs().saturating_sub(self.remaining_secs)
    }

    pub fn pending_duration_min(&self) -> Option<u32> {
        self.pending_duration_min
    }

    pub fn color_band(&self) -> ColorBand {
        self.config.band_for(self.remaining_secs)
    }

    /// 0.0 .. 1.0 share of the countdown consumed.
    pub fn progress(&self) -> f64 {
        let total = self.total_secs();
        if total == 0 {
            return 0.0;
        }
        self.consumed_secs() as f64 / total as f64
    }

    /// True while a round has been started and not yet reset.
    pub fn is_active(&self) -> bool {
        matches!(self.state, TimerState::Running | TimerState::Paused)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            remaining_secs: self.remaining_secs,
            total_secs: self.total_secs(),
            band: self.color_band(),
            progress_pct: (self.progress() * 100.0).min(100.0),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Idle | TimerState::Paused => {
                let resumed = self.state == TimerState::Paused;
                self.state = TimerState::Running;
                debug!(remaining = self.remaining_secs, resumed, "timer running");
                Some(Event::TimerStarted {
                    remaining_secs: self.remaining_secs,
                    resumed,
                })
            }
            TimerState::Running | TimerState::Finished => None,
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Running => {
                self.state = TimerState::Paused;
                debug!(remaining = self.remaining_secs, "timer paused");
                Some(Event::TimerPaused {
                    remaining_secs: self.remaining_secs,
                })
            }
            _ => None,
        }
    }

    /// Back to `Idle` with a full countdown. Applies a queued duration.
    pub fn reset(&mut self) -> Option<Event> {
        if let Some(duration_min) = self.pending_duration_min.take() {
            self.config.duration_min = duration_min;
        }
        self.state = TimerState::Idle;
        self.remaining_secs = self.total_secs();
        Some(Event::TimerReset {
            remaining_secs: self.remaining_secs,
        })
    }

    /// Call once per delivered second.
    ///
    /// Returns `Some(Event::TimerFinished)` on the tick that reaches zero and
    /// `Some(Event::BandChanged)` when the urgency band moves.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        let band_before = self.color_band();
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.state = TimerState::Finished;
            debug!(duration_min = self.config.duration_min, "timer finished");
            return Some(Event::TimerFinished {
                duration_min: self.config.duration_min,
                sound: self.config.sound_on_finish,
            });
        }
        let band = self.color_band();
        (band != band_before).then_some(Event::BandChanged { band })
    }

    /// Deliver up to `missed_secs` ticks at once, for hosts that were
    /// suspended and know how long. Stops early once the timer finishes.
    pub fn catch_up(&mut self, missed_secs: u64) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..missed_secs {
            if self.state != TimerState::Running {
                break;
            }
            if let Some(event) = self.tick() {
                events.push(event);
            }
        }
        events
    }

    /// Replace the configuration.
    ///
    /// Thresholds and the sound flag take effect at once. A duration change
    /// while a round is running, paused or finished is queued until the
    /// next reset so remaining time is never rescaled.
    ///
    /// # Errors
    /// Rejects an invalid configuration without touching the engine.
    pub fn configure(&mut self, config: TimerConfig) -> Result<ConfigureOutcome, ValidationError> {
        config.validate()?;
        let duration_changed = config.duration_min != self.config.duration_min;

        self.config.yellow_pct = config.yellow_pct;
        self.config.orange_pct = config.orange_pct;
        self.config.red_pct = config.red_pct;
        self.config.sound_on_finish = config.sound_on_finish;

        if self.state == TimerState::Idle {
            self.config.duration_min = config.duration_min;
            self.remaining_secs = self.total_secs();
            self.pending_duration_min = None;
            return Ok(ConfigureOutcome::Applied);
        }
        if duration_changed {
            self.pending_duration_min = Some(config.duration_min);
            return Ok(ConfigureOutcome::DurationQueued);
        }
        self.pending_duration_min = None;
        Ok(ConfigureOutcome::Applied)
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        let config = TimerConfig::default();
        Self {
            config,
            state: TimerState::Idle,
            remaining_secs: config.total_secs(),
            pending_duration_min: None,
        }
    }
}
