//! Session context: the single owner of one user's live state.
//!
//! Wires the hot path together: clock → timer → block lifecycle →
//! storage + gamification → sync outbox. Hosts hold one
//! [`SessionContext`] per active user and feed it ticks and commands;
//! every method runs to completion before the next one starts.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{CoreError, Result, ValidationError};
use crate::events::Event;
use crate::gamification::{GamificationEngine, GamificationProfile, HistoryView, LevelProgress};
use crate::process::{CounterSet, Field, ProcessType};
use crate::round::{Block, BlockDraft, BlockSource, RoundSession};
use crate::stats::{DailyAggregator, DailySummary, DateRange, Rollup};
use crate::storage::{Config, Database};
use crate::sync::{
    reconcile, DrainReport, ReconcileReport, RemoteService, SyncOperation, SyncOutbox,
    SyncQueueItem, SyncStatus,
};
use crate::timer::{ConfigureOutcome, TimerConfig, TimerEngine, TimerState};
use crate::users::{NewUser, User, UserUpdate};

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Drafts whose id already existed; the stored block is kept.
    pub duplicates: usize,
}

pub struct SessionContext {
    clock: Arc<dyn Clock>,
    db: Database,
    outbox: SyncOutbox,
    user: User,
    profile: GamificationProfile,
    gamification: GamificationEngine,
    round: RoundSession,
    repeat_delta: u32,
}

impl SessionContext {
    /// Open a session for `user_id`. Round numbering continues after the
    /// blocks already recorded today.
    ///
    /// # Errors
    /// Unknown or deactivated user, invalid timer configuration, or a
    /// storage failure.
    pub fn open(
        db: Database,
        outbox: SyncOutbox,
        clock: Arc<dyn Clock>,
        config: &Config,
        user_id: i64,
    ) -> Result<Self> {
        config.validate()?;
        let user = db.user(user_id)?;
        if !user.active {
            return Err(ValidationError::InvalidValue {
                field: "user".into(),
                message: format!("user {user_id} is deactivated"),
            }
            .into());
        }
        let profile = db.load_profile(user_id)?;
        let next_round = db.next_round(user_id, clock.today())?;
        let round = RoundSession::new(user_id, config.session.default_process, config.timer)?
            .with_round(next_round);
        info!(user_id, round = next_round, process = %round.process(), "session opened");

        Ok(Self {
            clock,
            db,
            outbox,
            user,
            profile,
            gamification: GamificationEngine::new(config.gamification.clone()),
            round,
            repeat_delta: config.session.repeat_delta,
        })
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn profile(&self) -> &GamificationProfile {
        &self.profile
    }

    pub fn level(&self) -> LevelProgress {
        self.gamification.level_of(&self.profile)
    }

    pub fn round(&self) -> &RoundSession {
        &self.round
    }

    pub fn timer(&self) -> &TimerEngine {
        self.round.timer()
    }

    pub fn counters(&self) -> &CounterSet {
        self.round.counters()
    }

    pub fn process(&self) -> ProcessType {
        self.round.process()
    }

    pub fn repeat_delta(&self) -> u32 {
        self.repeat_delta
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn outbox(&self) -> &SyncOutbox {
        &self.outbox
    }

    /// Connectivity hint forwarded to the outbox.
    pub fn set_online(&mut self, online: bool) -> Result<()> {
        self.outbox.set_online(&self.db, online)
    }

    pub fn sync_status(&self) -> Result<SyncStatus> {
        self.outbox.status(&self.db)
    }

    /// Items waiting to be pushed, oldest first.
    pub fn pending_sync(&self) -> Result<Vec<SyncQueueItem>> {
        Ok(self.outbox.pending(&self.db)?)
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    // ── Timer ────────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        self.round.start(self.clock.now())
    }

    pub fn pause(&mut self) -> Option<Event> {
        self.round.pause()
    }

    pub fn reset_timer(&mut self) -> Option<Event> {
        self.round.reset_timer()
    }

    /// # Errors
    /// Rejects an invalid configuration.
    pub fn configure(&mut self, config: TimerConfig) -> Result<ConfigureOutcome> {
        Ok(self.round.configure(config)?)
    }

    pub fn snapshot(&self) -> Event {
        self.round.timer().snapshot()
    }

    /// One second elapsed. A tick that finishes the countdown finalizes
    /// the round in the same call.
    pub fn tick(&mut self) -> Result<Vec<Event>> {
        let events: Vec<Event> = self.round.tick().into_iter().collect();
        self.finish_if_done(events)
    }

    /// Replay `missed_secs` ticks after the host was suspended.
    pub fn catch_up(&mut self, missed_secs: u64) -> Result<Vec<Event>> {
        let events = self.round.catch_up(missed_secs);
        self.finish_if_done(events)
    }

    fn finish_if_done(&mut self, mut events: Vec<Event>) -> Result<Vec<Event>> {
        if self.round.timer().state() == TimerState::Finished {
            events.extend(self.finalize_block()?);
        }
        Ok(events)
    }

    // ── Counters ─────────────────────────────────────────────────────

    fn field(&self, id: &str) -> Result<Field, ValidationError> {
        self.process().parse_field(id)
    }

    /// # Errors
    /// Unknown or derived field id, or a zero delta.
    pub fn increment(&mut self, field_id: &str, delta: u32) -> Result<Event> {
        let field = self.field(field_id)?;
        Ok(self.round.increment(field, delta)?)
    }

    /// Clamps at zero.
    pub fn decrement(&mut self, field_id: &str, delta: u32) -> Result<Event> {
        let field = self.field(field_id)?;
        Ok(self.round.decrement(field, delta)?)
    }

    /// One long-press repeat step, using the configured delta.
    pub fn repeat_increment(&mut self, field_id: &str) -> Result<Event> {
        self.increment(field_id, self.repeat_delta)
    }

    pub fn repeat_decrement(&mut self, field_id: &str) -> Result<Event> {
        self.decrement(field_id, self.repeat_delta)
    }

    /// Only between rounds.
    pub fn switch_process(&mut self, process: ProcessType) -> Result<()> {
        self.round.switch_process(process)?;
        info!(user_id = self.user.id, %process, "process switched");
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Freeze the current round into a stored block, then score it and
    /// queue it for sync.
    ///
    /// The block, the updated profile and both queue entries commit in one
    /// transaction. On any failure nothing is stored and the round and
    /// profile are left exactly as they were.
    pub fn finalize_block(&mut self) -> Result<Vec<Event>> {
        let now = self.clock.now();
        let today = self.clock.today();

        let round_before = self.round.clone();
        let profile_before = self.profile.clone();
        let block = self.round.finalize(now, today);
        match self.commit_block(&block, today) {
            Ok(events) => {
                debug!(user_id = self.user.id, block_id = block.id(), "block committed");
                Ok(events)
            }
            Err(err) => {
                self.round = round_before;
                self.profile = profile_before;
                Err(err)
            }
        }
    }

    fn commit_block(&mut self, block: &Block, today: NaiveDate) -> Result<Vec<Event>> {
        let tx = self.db.conn().unchecked_transaction()?;
        self.db.insert_block(block)?;

        let mut events = vec![Event::BlockFinalized {
            block_id: block.id().to_string(),
            round: block.round(),
            process: block.process(),
            done: block.done(),
            success_pct: block.success_pct(),
        }];

        let blocks = self.db.all_blocks(self.user.id)?;
        let history = HistoryView::from_blocks(&blocks, today, self.user.daily_goal);
        events.extend(
            self.gamification
                .on_block_finalized(&mut self.profile, block, &history),
        );
        self.db.save_profile(&self.profile)?;

        events.push(self.queue(SyncOperation::UpsertBlock(BlockDraft::from(block)))?);
        events.push(self.queue(SyncOperation::UpsertProfile(self.profile.clone()))?);
        tx.commit()?;
        Ok(events)
    }

    fn queue(&self, operation: SyncOperation) -> Result<Event> {
        let kind = operation.kind();
        let item_id = self.outbox.enqueue(&self.db, operation, self.clock.now())?;
        Ok(Event::SyncQueued {
            item_id,
            operation: kind.to_string(),
        })
    }

    /// Archive the user's blocks up to today and restart round numbering.
    ///
    /// # Errors
    /// [`CoreError::ConfirmationRequired`] without `confirm`, and
    /// [`ValidationError::RoundInProgress`] while a round holds data.
    pub fn new_day(&mut self, confirm: bool) -> Result<Event> {
        if !confirm {
            return Err(CoreError::ConfirmationRequired {
                operation: "new day",
            });
        }
        if self.round.timer().state() != TimerState::Idle || !self.round.counters().is_all_zero() {
            return Err(ValidationError::RoundInProgress("start a new day").into());
        }
        let date = self.clock.today();
        let archived = self.db.archive_through(self.user.id, date)?;
        self.round = self.round.clone().with_round(1);
        info!(user_id = self.user.id, %date, archived, "new day");
        Ok(Event::DayArchived {
            date,
            blocks: archived,
        })
    }

    /// Append externally produced blocks through the lifecycle's append
    /// path. No XP is awarded for imported work.
    ///
    /// All drafts are validated before any is stored.
    pub fn import_blocks(&mut self, drafts: Vec<BlockDraft>) -> Result<ImportReport> {
        let blocks = drafts
            .into_iter()
            .map(|draft| Block::from_draft(draft, BlockSource::Imported))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(foreign) = blocks.iter().find(|b| b.user_id() != self.user.id) {
            return Err(ValidationError::InvalidValue {
                field: "user_id".into(),
                message: format!(
                    "block {} belongs to user {}, not {}",
                    foreign.id(),
                    foreign.user_id(),
                    self.user.id
                ),
            }
            .into());
        }

        let tx = self.db.conn().unchecked_transaction()?;
        let mut report = ImportReport::default();
        for block in &blocks {
            if self.db.insert_block(block)? {
                report.imported += 1;
                self.queue(SyncOperation::UpsertBlock(BlockDraft::from(block)))?;
            } else {
                report.duplicates += 1;
            }
        }
        tx.commit()?;
        info!(
            user_id = self.user.id,
            imported = report.imported,
            duplicates = report.duplicates,
            "blocks imported"
        );
        Ok(report)
    }

    /// Admin correction of the profile's XP. The only way XP can go down.
    pub fn correct_xp(&mut self, xp: u64) -> Result<Vec<Event>> {
        let previous = self.profile.xp();
        let mut corrected = self.profile.clone();
        corrected.correct_xp(xp);

        let tx = self.db.conn().unchecked_transaction()?;
        self.db.save_profile(&corrected)?;
        let queued = self.queue(SyncOperation::UpsertProfile(corrected.clone()))?;
        tx.commit()?;

        self.profile = corrected;
        debug!(user_id = self.user.id, previous, xp, "xp corrected");
        Ok(vec![Event::XpCorrected { from: previous, to: xp }, queued])
    }

    // ── Export ───────────────────────────────────────────────────────

    /// Raw block list for the user.
    pub fn blocks(&self, range: DateRange, include_archived: bool) -> Result<Vec<Block>> {
        Ok(self.db.blocks_for(self.user.id, range, include_archived)?)
    }

    /// One summary per day with at least one block.
    pub fn daily_rollup(&self, range: DateRange) -> Result<Vec<DailySummary>> {
        let blocks = self.blocks(range, true)?;
        Ok(DailyAggregator::by_day(&blocks, self.user.id, range))
    }

    /// Totals per process over the range.
    pub fn process_summary(&self, range: DateRange) -> Result<Vec<Rollup>> {
        let blocks = self.blocks(range, true)?;
        Ok(DailyAggregator::per_process(&blocks, self.user.id, range))
    }

    pub fn today(&self) -> DateRange {
        DateRange::single(self.clock.today())
    }

    // ── Sync ─────────────────────────────────────────────────────────

    pub async fn drain(&mut self, remote: &dyn RemoteService) -> Result<DrainReport> {
        self.outbox
            .drain(&self.db, remote, self.clock.as_ref())
            .await
    }

    /// Pull remote blocks for `date` that are missing locally.
    pub async fn reconcile(
        &self,
        remote: &dyn RemoteService,
        date: NaiveDate,
    ) -> Result<ReconcileReport> {
        reconcile(remote, &self.db, self.user.id, date).await
    }
}

/// Admin operations on users. Every edit is mirrored to the remote
/// service through the outbox, in the same transaction as the edit.
pub struct UserAdmin<'a> {
    db: &'a Database,
    outbox: &'a SyncOutbox,
    clock: &'a dyn Clock,
}

impl<'a> UserAdmin<'a> {
    pub fn new(db: &'a Database, outbox: &'a SyncOutbox, clock: &'a dyn Clock) -> Self {
        Self { db, outbox, clock }
    }

    pub fn create(&self, new: NewUser) -> Result<User> {
        self.db.in_transaction(|| {
            let user = self.db.create_user(new)?;
            self.mirror(&user)?;
            Ok(user)
        })
    }

    pub fn update(&self, id: i64, update: UserUpdate) -> Result<User> {
        self.db.in_transaction(|| {
            let user = self.db.update_user(id, update)?;
            self.mirror(&user)?;
            Ok(user)
        })
    }

    /// Soft delete; blocks keep referencing the user.
    pub fn deactivate(&self, id: i64) -> Result<User> {
        self.db.in_transaction(|| {
            let user = self.db.deactivate_user(id)?;
            self.mirror(&user)?;
            Ok(user)
        })
    }

    pub fn get(&self, id: i64) -> Result<Option<User>> {
        Ok(self.db.get_user(id)?)
    }

    pub fn list(&self, include_inactive: bool) -> Result<Vec<User>> {
        Ok(self.db.list_users(include_inactive)?)
    }

    fn mirror(&self, user: &User) -> Result<()> {
        self.outbox
            .enqueue(self.db, SyncOperation::UpsertUser(user.clone()), self.clock.now())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sync::RetryPolicy;
    use chrono::Duration;

    fn setup() -> (SessionContext, ManualClock) {
        let clock = ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 8, 12)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap()
                .and_utc(),
        );
        let db = Database::open_memory().unwrap();
        let outbox = SyncOutbox::new(RetryPolicy::default());
        let user = UserAdmin::new(&db, &outbox, &clock)
            .create(NewUser::named("Ana"))
            .unwrap();
        let mut config = Config::default();
        config.timer.duration_min = 1;
        let ctx =
            SessionContext::open(db, outbox, Arc::new(clock.clone()), &config, user.id).unwrap();
        (ctx, clock)
    }

    #[test]
    fn tick_to_zero_finalizes_and_rolls_round() {
        let (mut ctx, clock) = setup();
        ctx.increment("realizado", 3).unwrap();
        ctx.start().unwrap();

        let mut events = Vec::new();
        for _ in 0..60 {
            clock.advance(Duration::seconds(1));
            events.extend(ctx.tick().unwrap());
        }

        assert!(events.iter().any(|e| matches!(e, Event::TimerFinished { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::BlockFinalized { round: 1, done: 3, .. })));
        assert_eq!(ctx.round().round(), 2);
        assert_eq!(ctx.timer().state(), TimerState::Idle);
        assert!(ctx.counters().is_all_zero());

        let stored = ctx.blocks(ctx.today(), false).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].elapsed_secs(), 60);
        assert_eq!(stored[0].elapsed_minutes(), 1);
        // 3 items * 2 + 10 bonus, then first_block +20
        assert_eq!(ctx.profile().xp(), 36);
        assert!(ctx.profile().has_achievement("first_block"));
    }

    #[test]
    fn finalize_queues_block_then_profile() {
        let (mut ctx, _) = setup();
        let before = ctx.pending_sync().unwrap().len();
        ctx.finalize_block().unwrap();

        let kinds: Vec<&str> = ctx
            .pending_sync()
            .unwrap()
            .iter()
            .skip(before)
            .map(|i| i.operation.kind())
            .collect();
        assert_eq!(kinds, vec!["upsert_block", "upsert_profile"]);
    }

    #[test]
    fn failed_finalize_stores_nothing_and_keeps_the_round() {
        let (mut ctx, _) = setup();
        ctx.increment("realizado", 4).unwrap();
        ctx.database()
            .conn()
            .execute_batch("DROP TABLE sync_queue")
            .unwrap();

        assert!(ctx.finalize_block().is_err());
        assert!(ctx.blocks(ctx.today(), true).unwrap().is_empty());
        assert_eq!(ctx.round().round(), 1);
        assert_eq!(ctx.counters().get_by_id("realizado"), Some(4));
        assert_eq!(ctx.profile().xp(), 0);
        assert_eq!(ctx.database().load_profile(ctx.user().id).unwrap().xp(), 0);
    }

    #[test]
    fn xp_correction_reports_both_values_and_queues_profile() {
        let (mut ctx, _) = setup();
        ctx.increment("realizado", 5).unwrap();
        ctx.finalize_block().unwrap();
        let earned = ctx.profile().xp();
        assert!(earned > 10);

        let events = ctx.correct_xp(10).unwrap();
        assert_eq!(events[0], Event::XpCorrected { from: earned, to: 10 });
        assert!(matches!(
            &events[1],
            Event::SyncQueued { operation, .. } if operation == "upsert_profile"
        ));
        assert_eq!(ctx.profile().xp(), 10);
        assert_eq!(ctx.database().load_profile(ctx.user().id).unwrap().xp(), 10);
    }

    #[test]
    fn derived_and_unknown_fields_are_rejected() {
        let (mut ctx, _) = setup();
        ctx.switch_process(ProcessType::Novelties).unwrap();
        assert!(matches!(
            ctx.increment("total_contactos", 1),
            Err(CoreError::Validation(ValidationError::DerivedField(_)))
        ));
        assert!(ctx.increment("realizado", 1).is_err());
        ctx.repeat_increment("llamada").unwrap();
        assert_eq!(ctx.counters().get_by_id("total_contactos"), Some(5));
    }

    #[test]
    fn switching_process_mid_round_is_refused() {
        let (mut ctx, _) = setup();
        ctx.increment("realizado", 1).unwrap();
        assert!(ctx.switch_process(ProcessType::Novelties).is_err());
        assert_eq!(ctx.process(), ProcessType::Guides);
    }

    #[test]
    fn new_day_requires_confirmation_and_archives() {
        let (mut ctx, _) = setup();
        ctx.finalize_block().unwrap();
        ctx.finalize_block().unwrap();
        assert_eq!(ctx.round().round(), 3);

        assert!(matches!(
            ctx.new_day(false),
            Err(CoreError::ConfirmationRequired { .. })
        ));
        assert_eq!(ctx.blocks(ctx.today(), false).unwrap().len(), 2);

        let event = ctx.new_day(true).unwrap();
        assert!(matches!(event, Event::DayArchived { blocks: 2, .. }));
        assert!(ctx.blocks(ctx.today(), false).unwrap().is_empty());
        assert_eq!(ctx.blocks(ctx.today(), true).unwrap().len(), 2);
        assert_eq!(ctx.round().round(), 1);
    }

    #[test]
    fn import_awards_no_xp_and_skips_duplicates() {
        let (mut ctx, clock) = setup();
        let now = clock.now();
        let draft = BlockDraft {
            id: Some("legacy-1".into()),
            user_id: ctx.user().id,
            process: ProcessType::Guides,
            round: 1,
            date: clock.today(),
            started_at: now,
            ended_at: now + Duration::minutes(25),
            duration_min: 25,
            elapsed_minutes: 25,
            fields: [("realizado".to_string(), 40)].into(),
        };

        let report = ctx.import_blocks(vec![draft.clone(), draft.clone()]).unwrap();
        assert_eq!(report, ImportReport { imported: 1, duplicates: 1 });
        assert_eq!(ctx.profile().xp(), 0);

        let stored = ctx.database().block("legacy-1").unwrap().unwrap();
        assert_eq!(stored.source(), BlockSource::Imported);
        assert_eq!(stored.items_per_minute(), 2);
    }

    #[test]
    fn import_is_all_or_nothing() {
        let (mut ctx, clock) = setup();
        let now = clock.now();
        let good = BlockDraft {
            id: Some("ok".into()),
            user_id: ctx.user().id,
            process: ProcessType::Guides,
            round: 1,
            date: clock.today(),
            started_at: now,
            ended_at: now,
            duration_min: 25,
            elapsed_minutes: 0,
            fields: Default::default(),
        };
        let mut bad = good.clone();
        bad.id = Some("bad".into());
        bad.fields.insert("solucionada".into(), 1);

        assert!(ctx.import_blocks(vec![good, bad]).is_err());
        assert!(!ctx.database().block_exists("ok").unwrap());
    }

    #[test]
    fn user_admin_mirrors_edits() {
        let db = Database::open_memory().unwrap();
        let outbox = SyncOutbox::new(RetryPolicy::default());
        let clock = ManualClock::at_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let admin = UserAdmin::new(&db, &outbox, &clock);

        let user = admin.create(NewUser::named("Luis")).unwrap();
        admin.deactivate(user.id).unwrap();
        assert!(admin.list(false).unwrap().is_empty());
        assert_eq!(outbox.len(&db).unwrap(), 2);
    }

    #[test]
    fn deactivated_user_cannot_open_a_session() {
        let db = Database::open_memory().unwrap();
        let user = db.create_user(NewUser::named("Eva")).unwrap();
        db.deactivate_user(user.id).unwrap();
        let clock = ManualClock::at_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let result = SessionContext::open(
            db,
            SyncOutbox::new(RetryPolicy::default()),
            Arc::new(clock),
            &Config::default(),
            user.id,
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
}
