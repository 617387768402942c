//! # Roundtrack Core Library
//!
//! Session engine for field-productivity tracking. Workers run timed
//! *rounds* of a manual task, count outcomes per round, and every
//! finished round becomes an immutable block that feeds daily stats,
//! gamification and an offline-first sync outbox.
//!
//! ## Architecture
//!
//! - **Timer**: tick-driven countdown state machine; the host delivers
//!   1-second ticks and the engine never reads the wall clock
//! - **Rounds**: live counters plus the finalize-and-roll lifecycle that
//!   produces [`Block`]s
//! - **Stats**: pure daily/rolling/range aggregation over blocks
//! - **Gamification**: XP, levels, streaks, achievements and cosmetics
//! - **Sync**: durable FIFO outbox drained into a [`RemoteService`]
//! - **Storage**: SQLite for users, blocks and profiles, TOML for config
//!
//! ## Key Components
//!
//! - [`SessionContext`]: owns one user's live state and wires the hot path
//! - [`TimerEngine`]: countdown state machine
//! - [`Database`]: durable storage
//! - [`SyncOutbox`]: offline queue of remote writes

pub mod clock;
pub mod context;
pub mod error;
pub mod events;
pub mod gamification;
pub mod metrics;
pub mod process;
pub mod round;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod timer;
pub mod users;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{ImportReport, SessionContext, UserAdmin};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::Event;
pub use gamification::{GamificationConfig, GamificationEngine, GamificationProfile};
pub use process::{CounterSet, Field, ProcessType};
pub use round::{Block, BlockDraft, BlockSource, RoundSession};
pub use stats::{DailyAggregator, DateRange};
pub use storage::{Config, Database};
pub use sync::{HttpRemote, RemoteService, SyncError, SyncOutbox};
pub use timer::{ColorBand, TimerConfig, TimerEngine, TimerState};
pub use users::{NewUser, Role, User, UserUpdate};
