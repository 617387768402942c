//! Core types for the sync outbox.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::gamification::GamificationProfile;
use crate::round::BlockDraft;
use crate::users::User;

/// A write meant to be mirrored on the remote service.
///
/// Every operation is a full replacement of the remote record, so the
/// last write to arrive wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "payload", rename_all = "snake_case")]
pub enum SyncOperation {
    UpsertBlock(BlockDraft),
    UpsertUser(User),
    UpsertProfile(GamificationProfile),
}

impl SyncOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncOperation::UpsertBlock(_) => "upsert_block",
            SyncOperation::UpsertUser(_) => "upsert_user",
            SyncOperation::UpsertProfile(_) => "upsert_profile",
        }
    }
}

/// Pending remote write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    /// Unique identifier, also sent as the idempotency key.
    pub id: String,
    pub operation: SyncOperation,
    /// Failed pushes counted against the retry budget. Connectivity
    /// losses are not counted.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    /// Earliest time the item may be retried after a failure.
    #[serde(default)]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl SyncQueueItem {
    pub fn new(operation: SyncOperation, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation,
            attempts: 0,
            created_at: now,
            next_attempt_at: None,
            last_error: None,
        }
    }
}

/// Item removed from the live queue after a permanent failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub item: SyncQueueItem,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Retry schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
    /// Transient failures allowed before an item is dead-lettered.
    /// `None` retries forever.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,
}

fn default_base_delay() -> u64 {
    2
}
fn default_max_delay() -> u64 {
    300
}
fn default_max_attempts() -> Option<u32> {
    Some(20)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl RetryPolicy {
    /// Upper bound accepted for `max_delay_secs`: one week.
    pub const MAX_DELAY_LIMIT_SECS: u64 = 7 * 24 * 60 * 60;

    /// `min(base * 2^(attempts - 1), max)` for `attempts >= 1`.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(32);
        let secs = self
            .base_delay_secs
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_secs);
        i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Earliest retry time after `attempts` failures, saturating at the
    /// largest representable instant.
    pub fn retry_at(&self, now: DateTime<Utc>, attempts: u32) -> DateTime<Utc> {
        now.checked_add_signed(self.delay_for(attempts))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// # Errors
    /// Rejects a maximum delay above [`Self::MAX_DELAY_LIMIT_SECS`] or
    /// below the base delay.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_delay_secs > Self::MAX_DELAY_LIMIT_SECS {
            return Err(ValidationError::InvalidValue {
                field: "sync.retry.max_delay_secs".into(),
                message: format!("must be at most {}", Self::MAX_DELAY_LIMIT_SECS),
            });
        }
        if self.base_delay_secs > self.max_delay_secs {
            return Err(ValidationError::InvalidValue {
                field: "sync.retry.base_delay_secs".into(),
                message: "must not exceed sync.retry.max_delay_secs".into(),
            });
        }
        Ok(())
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Current outbox status, suitable for a non-blocking "pending" badge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub online: bool,
    pub pending_count: usize,
    pub dead_letter_count: usize,
    /// Last successful push.
    pub last_sync_at: Option<DateTime<Utc>>,
    pub oldest_pending_at: Option<DateTime<Utc>>,
    /// Attempts already spent on the head item.
    pub head_attempts: u32,
}

/// Why a drain pass stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DrainStop {
    Empty,
    Offline,
    /// Head item is waiting for its retry time.
    Backoff { until: DateTime<Utc> },
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrainReport {
    pub sent: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    pub remaining: usize,
    pub stopped: DrainStop,
}

/// Sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Connectivity is gone; the drain pauses.
    #[error("Remote service unreachable: {0}")]
    Offline(String),

    /// The service failed but the request may succeed later.
    #[error("Remote service error: {0}")]
    Transient(String),

    /// The service refused the payload; retrying cannot help.
    #[error("Remote service rejected the request: {0}")]
    Rejected(String),

    #[error("Remote endpoint not configured")]
    NotConfigured,

    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    pub fn is_offline(&self) -> bool {
        matches!(self, SyncError::Offline(_))
    }

    /// Errors that will fail the same way on every retry.
    pub fn is_permanent(&self) -> bool {
        matches!(self, SyncError::Rejected(_) | SyncError::Serialization(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            SyncError::Offline(err.to_string())
        } else if err.is_builder() {
            SyncError::Rejected(err.to_string())
        } else {
            SyncError::Transient(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::seconds(2));
        assert_eq!(policy.delay_for(2), Duration::seconds(4));
        assert_eq!(policy.delay_for(5), Duration::seconds(32));
        assert_eq!(policy.delay_for(9), Duration::seconds(300));
        assert_eq!(policy.delay_for(200), Duration::seconds(300));
    }

    #[test]
    fn exhaustion_respects_optional_cap() {
        let capped = RetryPolicy::default();
        assert!(!capped.exhausted(19));
        assert!(capped.exhausted(20));

        let unbounded = RetryPolicy {
            max_attempts: None,
            ..RetryPolicy::default()
        };
        assert!(!unbounded.exhausted(u32::MAX));
    }

    #[test]
    fn oversized_delays_saturate_instead_of_panicking() {
        let huge = RetryPolicy {
            base_delay_secs: u64::MAX,
            max_delay_secs: u64::MAX,
            max_attempts: None,
        };
        assert_eq!(huge.delay_for(40), Duration::MAX);
        let now = Utc::now();
        assert_eq!(huge.retry_at(now, 40), DateTime::<Utc>::MAX_UTC);
        assert!(huge.validate().is_err());
    }

    #[test]
    fn validate_bounds_delays() {
        assert!(RetryPolicy::default().validate().is_ok());
        let inverted = RetryPolicy {
            base_delay_secs: 600,
            max_delay_secs: 300,
            max_attempts: Some(3),
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn operation_serializes_with_tag() {
        let op = SyncOperation::UpsertProfile(GamificationProfile::new(3));
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "upsert_profile");
        assert_eq!(json["payload"]["user_id"], 3);
    }
}
