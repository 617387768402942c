//! Durable FIFO outbox for remote writes.
//!
//! Every local mutation that must reach the remote service is appended
//! to the `sync_queue` table of the [`Database`], one row per item, so
//! several processes can enqueue and drain the same store without
//! overwriting each other. [`SyncOutbox::drain`] pushes items strictly in
//! order: a failing head item blocks everything behind it until it
//! succeeds or is dead-lettered.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::remote::RemoteService;
use super::types::{
    DeadLetter, DrainReport, DrainStop, RetryPolicy, SyncOperation, SyncQueueItem, SyncStatus,
};
use crate::clock::Clock;
use crate::error::{CoreError, DatabaseError};
use crate::storage::Database;

const LAST_SYNC_KEY: &str = "sync.last_sync_at";

/// Offline-tolerant queue of [`SyncOperation`]s.
///
/// The queue itself lives in the database; this handle carries the retry
/// policy and the host's connectivity hint.
#[derive(Debug, Clone)]
pub struct SyncOutbox {
    policy: RetryPolicy,
    /// Cleared when the remote reports a connectivity loss.
    online: bool,
}

impl SyncOutbox {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            online: true,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Host connectivity hint. Going back online lets the next drain
    /// retry immediately, ignoring the head item's backoff.
    pub fn set_online(&mut self, db: &Database, online: bool) -> Result<(), CoreError> {
        if online && !self.online {
            if let Some(mut head) = db.queue_head()? {
                if head.next_attempt_at.take().is_some() {
                    db.queue_update(&head)?;
                }
            }
        }
        self.online = online;
        Ok(())
    }

    pub fn len(&self, db: &Database) -> Result<usize, DatabaseError> {
        db.queue_len()
    }

    pub fn is_empty(&self, db: &Database) -> Result<bool, DatabaseError> {
        Ok(db.queue_len()? == 0)
    }

    pub fn pending(&self, db: &Database) -> Result<Vec<SyncQueueItem>, DatabaseError> {
        db.queue_items()
    }

    pub fn dead_letters(&self, db: &Database) -> Result<Vec<DeadLetter>, DatabaseError> {
        db.dead_letters()
    }

    pub fn status(&self, db: &Database) -> Result<SyncStatus, CoreError> {
        let head = db.queue_head()?;
        Ok(SyncStatus {
            online: self.online,
            pending_count: db.queue_len()?,
            dead_letter_count: db.dead_letters()?.len(),
            last_sync_at: last_sync_at(db)?,
            oldest_pending_at: head.as_ref().map(|i| i.created_at),
            head_attempts: head.map_or(0, |i| i.attempts),
        })
    }

    /// Append an operation with zero attempts. Returns the item id.
    ///
    /// Runs inside the caller's transaction when one is open, so the write
    /// that produced the operation and its queue entry commit together.
    pub fn enqueue(
        &self,
        db: &Database,
        operation: SyncOperation,
        now: DateTime<Utc>,
    ) -> Result<String, CoreError> {
        let item = SyncQueueItem::new(operation, now);
        db.queue_push(&item)?;
        debug!(item_id = %item.id, op = item.operation.kind(), "enqueued");
        Ok(item.id)
    }

    /// Push pending items to `remote` in FIFO order.
    ///
    /// Stops when the queue is empty, the outbox is offline, or the head
    /// item is waiting out its backoff. Success removes the item; a
    /// transient failure bumps its attempt count and schedules a retry;
    /// a permanent failure, or exhausting the retry budget, moves it to
    /// the dead-letter list. A connectivity loss records the error on the
    /// head item without spending its retry budget.
    pub async fn drain(
        &mut self,
        db: &Database,
        remote: &dyn RemoteService,
        clock: &dyn Clock,
    ) -> Result<DrainReport, CoreError> {
        let mut report = DrainReport {
            sent: 0,
            failed: 0,
            dead_lettered: 0,
            remaining: 0,
            stopped: DrainStop::Empty,
        };

        let stopped = loop {
            if !self.online {
                break DrainStop::Offline;
            }
            let now = clock.now();
            let Some(mut head) = db.queue_head()? else {
                break DrainStop::Empty;
            };
            if let Some(until) = head.next_attempt_at.filter(|at| *at > now) {
                break DrainStop::Backoff { until };
            }

            match remote.push(&head).await {
                Ok(()) => {
                    db.queue_remove(&head.id)?;
                    db.kv_set(LAST_SYNC_KEY, &now.to_rfc3339())?;
                    debug!(item_id = %head.id, op = head.operation.kind(), "pushed");
                    report.sent += 1;
                }
                Err(err) if err.is_offline() => {
                    head.last_error = Some(err.to_string());
                    db.queue_update(&head)?;
                    self.online = false;
                    report.failed += 1;
                    warn!(error = %err, "remote unreachable, outbox paused");
                }
                Err(err) if err.is_permanent() => {
                    head.attempts = head.attempts.saturating_add(1);
                    head.last_error = Some(err.to_string());
                    self.dead_letter(db, head, err.to_string(), now)?;
                    report.failed += 1;
                    report.dead_lettered += 1;
                }
                Err(err) => {
                    head.attempts = head.attempts.saturating_add(1);
                    head.last_error = Some(err.to_string());
                    report.failed += 1;
                    if self.policy.exhausted(head.attempts) {
                        self.dead_letter(db, head, format!("retries exhausted: {err}"), now)?;
                        report.dead_lettered += 1;
                    } else {
                        head.next_attempt_at = Some(self.policy.retry_at(now, head.attempts));
                        debug!(item_id = %head.id, attempts = head.attempts, "scheduled retry");
                        db.queue_update(&head)?;
                    }
                }
            }
        };

        report.remaining = db.queue_len()?;
        report.stopped = stopped;
        info!(
            sent = report.sent,
            failed = report.failed,
            dead = report.dead_lettered,
            remaining = report.remaining,
            "drain finished"
        );
        Ok(report)
    }

    /// Discard every pending item. Dead letters are kept.
    pub fn clear(&self, db: &Database, confirm: bool) -> Result<usize, CoreError> {
        if !confirm {
            return Err(CoreError::ConfirmationRequired {
                operation: "sync clear",
            });
        }
        let dropped = db.queue_clear()?;
        warn!(dropped, "outbox cleared");
        Ok(dropped)
    }

    /// Move every dead letter back to the tail of the queue with a fresh
    /// attempt budget.
    pub fn requeue_dead_letters(&self, db: &Database) -> Result<usize, CoreError> {
        let count = db.requeue_dead_letters()?;
        if count > 0 {
            info!(count, "requeued dead letters");
        }
        Ok(count)
    }

    fn dead_letter(
        &self,
        db: &Database,
        item: SyncQueueItem,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        warn!(item_id = %item.id, op = item.operation.kind(), %reason, "dead-lettered");
        db.queue_dead_letter(&DeadLetter {
            item,
            reason,
            failed_at: now,
        })?;
        Ok(())
    }
}

fn last_sync_at(db: &Database) -> Result<Option<DateTime<Utc>>, CoreError> {
    let Some(raw) = db.kv_get(LAST_SYNC_KEY)? else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(&raw).map_err(|e| DatabaseError::CorruptRow {
        table: "kv",
        message: format!("{LAST_SYNC_KEY}: {e}"),
    })?;
    Ok(Some(parsed.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gamification::GamificationProfile;
    use crate::sync::SyncError;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Remote that replays scripted results and records what it saw.
    #[derive(Default)]
    struct ScriptedRemote {
        script: Mutex<VecDeque<Result<(), SyncError>>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedRemote {
        fn with(results: Vec<Result<(), SyncError>>) -> Self {
            Self {
                script: Mutex::new(results.into()),
                seen: Mutex::default(),
            }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteService for ScriptedRemote {
        async fn push(&self, item: &SyncQueueItem) -> Result<(), SyncError> {
            self.seen.lock().unwrap().push(item.id.clone());
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn fetch_blocks(
            &self,
            _user_id: i64,
            _date: NaiveDate,
        ) -> Result<Vec<crate::round::BlockDraft>, SyncError> {
            Ok(Vec::new())
        }
    }

    fn clock() -> ManualClock {
        ManualClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap())
    }

    fn op(user: i64) -> SyncOperation {
        SyncOperation::UpsertProfile(GamificationProfile::new(user))
    }

    fn filled(n: i64, clock: &ManualClock) -> (Database, SyncOutbox, Vec<String>) {
        let db = Database::open_memory().unwrap();
        let outbox = SyncOutbox::new(RetryPolicy::default());
        let ids = (0..n)
            .map(|i| outbox.enqueue(&db, op(i), clock.now()).unwrap())
            .collect();
        (db, outbox, ids)
    }

    fn head(outbox: &SyncOutbox, db: &Database) -> SyncQueueItem {
        outbox.pending(db).unwrap().remove(0)
    }

    #[tokio::test]
    async fn drain_sends_in_fifo_order() {
        let clock = clock();
        let (db, mut outbox, ids) = filled(3, &clock);
        let remote = ScriptedRemote::default();

        let report = outbox.drain(&db, &remote, &clock).await.unwrap();
        assert_eq!(report.sent, 3);
        assert_eq!(report.stopped, DrainStop::Empty);
        assert_eq!(remote.seen(), ids);
        assert!(outbox.is_empty(&db).unwrap());
        assert_eq!(outbox.status(&db).unwrap().last_sync_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn transient_failure_keeps_head_and_backs_off() {
        let clock = clock();
        let (db, mut outbox, ids) = filled(2, &clock);
        let remote = ScriptedRemote::with(vec![Err(SyncError::Transient("503".into()))]);

        let report = outbox.drain(&db, &remote, &clock).await.unwrap();
        assert_eq!(report.sent, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(
            report.stopped,
            DrainStop::Backoff {
                until: clock.now() + Duration::seconds(2)
            }
        );
        let first = head(&outbox, &db);
        assert_eq!(first.id, ids[0]);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.last_error.as_deref(), Some("Remote service error: 503"));

        clock.advance(Duration::seconds(2));
        let report = outbox.drain(&db, &remote, &clock).await.unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(remote.seen(), vec![ids[0].clone(), ids[0].clone(), ids[1].clone()]);
    }

    #[tokio::test]
    async fn offline_pauses_without_discarding() {
        let clock = clock();
        let (db, mut outbox, _) = filled(2, &clock);
        let remote = ScriptedRemote::with(vec![Err(SyncError::Offline("no route".into()))]);

        let report = outbox.drain(&db, &remote, &clock).await.unwrap();
        assert_eq!(report.stopped, DrainStop::Offline);
        assert_eq!(report.remaining, 2);
        assert!(!outbox.is_online());
        assert!(outbox.dead_letters(&db).unwrap().is_empty());

        // Still offline: nothing is attempted.
        let report = outbox.drain(&db, &remote, &clock).await.unwrap();
        assert_eq!(report.failed, 0);
        assert_eq!(remote.seen().len(), 1);

        outbox.set_online(&db, true).unwrap();
        let report = outbox.drain(&db, &remote, &clock).await.unwrap();
        assert_eq!(report.sent, 2);
    }

    #[tokio::test]
    async fn connectivity_losses_do_not_spend_the_retry_budget() {
        let clock = clock();
        let db = Database::open_memory().unwrap();
        let mut outbox = SyncOutbox::new(RetryPolicy {
            base_delay_secs: 0,
            max_delay_secs: 0,
            max_attempts: Some(3),
        });
        outbox.enqueue(&db, op(1), clock.now()).unwrap();
        let remote = ScriptedRemote::with(vec![
            Err(SyncError::Offline("down".into())),
            Err(SyncError::Offline("down".into())),
            Err(SyncError::Transient("502".into())),
            Ok(()),
        ]);

        for _ in 0..2 {
            let report = outbox.drain(&db, &remote, &clock).await.unwrap();
            assert_eq!(report.stopped, DrainStop::Offline);
            outbox.set_online(&db, true).unwrap();
        }
        let offline_head = head(&outbox, &db);
        assert_eq!(offline_head.attempts, 0);
        assert_eq!(
            offline_head.last_error.as_deref(),
            Some("Remote service unreachable: down")
        );

        let report = outbox.drain(&db, &remote, &clock).await.unwrap();
        assert_eq!(report.dead_lettered, 0);
        assert_eq!(report.sent, 1);
        assert!(outbox.dead_letters(&db).unwrap().is_empty());
        assert!(outbox.is_empty(&db).unwrap());
    }

    #[tokio::test]
    async fn rejected_item_is_dead_lettered_and_queue_continues() {
        let clock = clock();
        let (db, mut outbox, ids) = filled(2, &clock);
        let remote = ScriptedRemote::with(vec![Err(SyncError::Rejected("400".into()))]);

        let report = outbox.drain(&db, &remote, &clock).await.unwrap();
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(outbox.dead_letters(&db).unwrap()[0].item.id, ids[0]);

        assert_eq!(outbox.requeue_dead_letters(&db).unwrap(), 1);
        let requeued = head(&outbox, &db);
        assert_eq!(requeued.id, ids[0]);
        assert_eq!(requeued.attempts, 0);
    }

    #[tokio::test]
    async fn exhausted_retries_are_dead_lettered() {
        let clock = clock();
        let db = Database::open_memory().unwrap();
        let mut outbox = SyncOutbox::new(RetryPolicy {
            base_delay_secs: 0,
            max_delay_secs: 0,
            max_attempts: Some(3),
        });
        outbox.enqueue(&db, op(1), clock.now()).unwrap();
        let remote = ScriptedRemote::with(
            (0..3)
                .map(|_| Err(SyncError::Transient("500".into())))
                .collect(),
        );

        let report = outbox.drain(&db, &remote, &clock).await.unwrap();
        assert_eq!(report.failed, 3);
        assert_eq!(report.dead_lettered, 1);
        assert!(outbox.is_empty(&db).unwrap());
        assert!(outbox.dead_letters(&db).unwrap()[0]
            .reason
            .starts_with("retries exhausted"));
    }

    #[test]
    fn clear_requires_confirmation() {
        let clock = clock();
        let (db, outbox, _) = filled(2, &clock);
        assert!(matches!(
            outbox.clear(&db, false),
            Err(CoreError::ConfirmationRequired { .. })
        ));
        assert_eq!(outbox.len(&db).unwrap(), 2);
        assert_eq!(outbox.clear(&db, true).unwrap(), 2);
        assert!(outbox.is_empty(&db).unwrap());
    }

    #[test]
    fn separate_handles_on_one_store_keep_every_item() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("roundtrack.db");
        let clock = clock();
        let outbox = SyncOutbox::new(RetryPolicy::default());

        let first = Database::open_at(&path).unwrap();
        let second = Database::open_at(&path).unwrap();
        let a = outbox.enqueue(&first, op(1), clock.now()).unwrap();
        let b = outbox.enqueue(&second, op(2), clock.now()).unwrap();
        assert!(first.queue_remove(&a).unwrap());
        let c = outbox.enqueue(&second, op(3), clock.now()).unwrap();
        drop((first, second));

        let reopened = Database::open_at(&path).unwrap();
        let ids: Vec<String> = outbox
            .pending(&reopened)
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![b, c]);
    }
}
