//! Integration tests for the round → block → stats → gamification path.
//!
//! A manual clock drives several workdays of rounds through a
//! SessionContext backed by an in-memory database.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use roundtrack_core::gamification::StreakChange;
use roundtrack_core::stats::DateRange;
use roundtrack_core::sync::{RetryPolicy, SyncOutbox};
use roundtrack_core::{
    Clock, Config, Database, Event, ManualClock, NewUser, ProcessType, SessionContext, UserAdmin,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
}

fn open(duration_min: u32) -> (SessionContext, ManualClock) {
    let clock = ManualClock::new(day(2).and_hms_opt(8, 0, 0).unwrap().and_utc());
    let db = Database::open_memory().unwrap();
    let outbox = SyncOutbox::new(RetryPolicy::default());
    let mut new = NewUser::named("Marta");
    new.daily_goal = 20;
    let user = UserAdmin::new(&db, &outbox, &clock).create(new).unwrap();

    let mut config = Config::default();
    config.timer.duration_min = duration_min;
    let ctx = SessionContext::open(db, outbox, Arc::new(clock.clone()), &config, user.id).unwrap();
    (ctx, clock)
}

/// Run one full round with `done`/`cancelled` guide counts.
fn run_round(
    ctx: &mut SessionContext,
    clock: &ManualClock,
    done: u32,
    cancelled: u32,
) -> Vec<Event> {
    if done > 0 {
        ctx.increment("realizado", done).unwrap();
    }
    if cancelled > 0 {
        ctx.increment("cancelado", cancelled).unwrap();
    }
    ctx.start().unwrap();
    let total = ctx.timer().total_secs();
    let mut events = Vec::new();
    for _ in 0..total {
        clock.advance(Duration::seconds(1));
        events.extend(ctx.tick().unwrap());
    }
    events
}

#[test]
fn rounds_across_days_build_streak_and_stats() {
    let (mut ctx, clock) = open(2);

    run_round(&mut ctx, &clock, 8, 2);
    run_round(&mut ctx, &clock, 12, 0);
    assert_eq!(ctx.round().round(), 3);

    let today = ctx.process_summary(ctx.today()).unwrap();
    assert_eq!(today.len(), 1);
    let guides = &today[0];
    assert_eq!(guides.process, ProcessType::Guides);
    assert_eq!(guides.block_count, 2);
    assert_eq!(guides.done, 20);
    assert_eq!(guides.cancelled, 2);
    // 20 / 22 = 90.909..
    assert_eq!(guides.success_pct, 90.9);
    assert_eq!(guides.elapsed_minutes, 4);
    assert_eq!(guides.items_per_minute, 5);

    // Daily goal of 20 reached on the second round.
    assert!(ctx.profile().has_achievement("daily_goal"));
    assert!(ctx.profile().has_achievement("perfect_round"));

    // Next day extends the streak, a skipped day resets it.
    clock.set(day(3).and_hms_opt(8, 0, 0).unwrap().and_utc());
    let events = run_round(&mut ctx, &clock, 1, 0);
    assert!(events.contains(&Event::StreakUpdated {
        streak: 2,
        change: StreakChange::Extended
    }));

    clock.set(day(6).and_hms_opt(8, 0, 0).unwrap().and_utc());
    let events = run_round(&mut ctx, &clock, 1, 0);
    assert!(events.contains(&Event::StreakUpdated {
        streak: 1,
        change: StreakChange::Reset
    }));
    assert_eq!(ctx.profile().best_streak(), 2);

    let rolling = ctx
        .daily_rollup(DateRange::rolling(clock.today(), 7))
        .unwrap();
    let days: Vec<NaiveDate> = rolling.iter().map(|d| d.date).collect();
    assert_eq!(days, vec![day(2), day(3), day(6)]);
}

#[test]
fn xp_never_decreases_and_level_follows_table() {
    let (mut ctx, clock) = open(1);
    let mut last_xp = 0;
    for _ in 0..12 {
        run_round(&mut ctx, &clock, 10, 0);
        let xp = ctx.profile().xp();
        assert!(xp >= last_xp);
        last_xp = xp;
    }
    let level = ctx.level();
    assert!(level.level >= 2);
    assert!(level.xp >= level.current_threshold);
    assert!(ctx.profile().has_achievement("ten_blocks"));
}

#[test]
fn empty_round_still_produces_a_block() {
    let (mut ctx, _) = open(25);
    let events = ctx.finalize_block().unwrap();
    assert!(matches!(
        events[0],
        Event::BlockFinalized {
            done: 0,
            success_pct,
            ..
        } if success_pct == 0.0
    ));
    let blocks = ctx.blocks(ctx.today(), false).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].elapsed_secs(), 0);
    assert_eq!(blocks[0].items_per_minute(), 0);
}

#[test]
fn duration_change_waits_for_reset() {
    let (mut ctx, clock) = open(10);
    ctx.start().unwrap();
    clock.advance(Duration::seconds(30));
    ctx.catch_up(30).unwrap();
    assert_eq!(ctx.timer().remaining_secs(), 570);

    let mut cfg = *ctx.timer().config();
    cfg.duration_min = 5;
    ctx.configure(cfg).unwrap();
    assert_eq!(ctx.timer().remaining_secs(), 570);
    assert_eq!(ctx.timer().pending_duration_min(), Some(5));

    ctx.reset_timer().unwrap();
    assert_eq!(ctx.timer().remaining_secs(), 300);
}
