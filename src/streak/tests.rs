use super::*;
use crate::detect::DetectionFeatures;
use crate::notify::Notifier;
use crate::store::{DateRange, EventStore, Statistics, StoreError};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<TrackerEvent>>,
}

impl RecordingNotifier {
    fn take(&self) -> Vec<TrackerEvent> {
        std::mem::take(&mut *self.events.lock().expect("events lock"))
    }

    fn labels(&self) -> Vec<String> {
        self.take()
            .into_iter()
            .filter_map(|event| match event {
                TrackerEvent::Milestone { milestone, .. } => Some(milestone.label),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &TrackerEvent) {
        self.events.lock().expect("events lock").push(event.clone());
    }
}

#[derive(Default)]
struct CountingStore {
    kills: Mutex<Vec<DateTime<Local>>>,
    fail: bool,
}

impl EventStore for CountingStore {
    fn record_event(&self, _: &DetectionFeatures, _: DateTime<Local>) -> Result<i64, StoreError> {
        Ok(0)
    }

    fn record_kill(&self, at: DateTime<Local>) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Corrupt("offline".into()));
        }
        self.kills.lock().expect("kills lock").push(at);
        Ok(())
    }

    fn daily_score(&self, _: NaiveDate) -> Result<u32, StoreError> {
        Ok(0)
    }

    fn statistics(&self, _: DateRange) -> Result<Statistics, StoreError> {
        Err(StoreError::Corrupt("unsupported".into()))
    }
}

fn at(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 6, 15, hour, minute, second)
        .earliest()
        .expect("valid local time")
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

fn m(label: &str) -> Milestone {
    Milestone::new(label, PathBuf::from(format!("{label}.wav")))
}

fn headshot(escalate_multi_kills: bool) -> HeadshotPolicy {
    HeadshotPolicy {
        milestone: m("Headshot"),
        after_kills: 6,
        after_multi_kills: 5,
        escalate_multi_kills,
    }
}

fn table_with(
    kills: &[(u32, &str)],
    multi: &[(u32, &str)],
    escalate_multi_kills: bool,
) -> MilestoneTable {
    MilestoneTable::new(
        kills.iter().map(|(count, label)| (*count, m(label))).collect(),
        multi.iter().map(|(count, label)| (*count, m(label))).collect(),
        headshot(escalate_multi_kills),
    )
    .expect("milestone table")
}

fn table(kills: &[(u32, &str)], multi: &[(u32, &str)]) -> MilestoneTable {
    table_with(kills, multi, true)
}

fn clock(quiet: Vec<QuietWindow>) -> StreakClock {
    StreakClock {
        cooldown: Duration::seconds(4),
        multi_kill_window: Duration::seconds(60),
        quiet_hours: QuietHours::new(quiet),
        ..StreakClock::default()
    }
}

fn tracker_with(
    clock: StreakClock,
    milestones: MilestoneTable,
    start: DateTime<Local>,
) -> (KillTracker, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let tracker = KillTracker::new(
        TrackerConfig { clock, milestones },
        notifier.clone(),
        None,
        start,
    );
    (tracker, notifier)
}

fn default_tracker(start: DateTime<Local>) -> (KillTracker, Arc<RecordingNotifier>) {
    tracker_with(
        clock(Vec::new()),
        table(
            &[(1, "First Blood"), (2, "Killing Spree"), (3, "Rampage")],
            &[(2, "Double Kill"), (3, "Multi Kill")],
        ),
        start,
    )
}

#[test]
fn cooldown_blocks_second_call_and_keeps_first_timestamp() {
    let clock = clock(Vec::new());
    let t0 = at(12, 0, 0);
    let mut state = StreakState::new(t0);

    assert!(!clock.in_cooldown(&mut state, t0));
    assert_eq!(state.last_detection_time, Some(t0));
    assert!(clock.in_cooldown(&mut state, t0 + Duration::seconds(2)));
    assert!(clock.in_cooldown(&mut state, t0 + Duration::milliseconds(3_999)));
    assert_eq!(state.last_detection_time, Some(t0));

    assert!(clock.in_cooldown(&mut state, t0 - Duration::seconds(10)));
    assert_eq!(state.last_detection_time, Some(t0));

    assert!(!clock.in_cooldown(&mut state, t0 + Duration::seconds(4)));
    assert_eq!(state.last_detection_time, Some(t0 + Duration::seconds(4)));
}

#[test]
fn multi_kill_expiry_fires_once() {
    let clock = clock(Vec::new());
    let t0 = at(12, 0, 0);
    let mut state = StreakState::new(t0);
    assert!(!clock.multi_kill_window_expired(&mut state, t0 + Duration::hours(1)));

    state.last_kill_time = Some(t0);
    assert!(!clock.multi_kill_window_expired(&mut state, t0 + Duration::seconds(60)));
    assert!(clock.multi_kill_window_expired(&mut state, t0 + Duration::seconds(61)));
    assert!(!clock.multi_kill_window_expired(&mut state, t0 + Duration::seconds(62)));
    assert!(state.multi_kill_expired);
}

#[test]
fn daily_counter_resets_after_24_hours_once() {
    let clock = clock(Vec::new());
    let t0 = at(12, 0, 0);
    let mut state = StreakState::new(t0);
    state.kill_count = 5;
    state.last_kill_time = Some(t0 + Duration::hours(2));

    assert!(!clock.maybe_reset_daily_counter(&mut state, t0 + Duration::hours(23)));
    assert_eq!(state.kill_count, 5);

    let later = t0 + Duration::hours(24) + Duration::milliseconds(1);
    assert!(clock.maybe_reset_daily_counter(&mut state, later));
    assert_eq!(state.kill_count, 0);
    assert_eq!(state.last_kill_time, None);
    assert_eq!(state.window_start_time, later);
    assert!(!clock.maybe_reset_daily_counter(&mut state, later + Duration::seconds(1)));
}

#[test]
fn calendar_rollover_only_crosses_days() {
    let clock = clock(Vec::new());
    let mut state = StreakState::new(at(8, 0, 0));
    state.kill_count = 3;
    assert!(!clock.calendar_rollover(&mut state, at(23, 59, 59)));
    assert_eq!(state.kill_count, 3);

    let midnight = next_local_midnight(at(8, 0, 0));
    assert_eq!(
        midnight.date_naive(),
        at(8, 0, 0).date_naive().succ_opt().expect("next day")
    );
    assert!(clock.calendar_rollover(&mut state, midnight));
    assert_eq!(state.kill_count, 0);
    assert!(!clock.calendar_rollover(&mut state, midnight + Duration::seconds(1)));
}

#[test]
fn quiet_windows_are_half_open_and_wrap() {
    let morning = QuietWindow::new(hm(0, 0), hm(8, 30));
    assert!(morning.contains(hm(0, 0)));
    assert!(morning.contains(hm(3, 0)));
    assert!(!morning.contains(hm(8, 30)));

    let overnight = QuietWindow::new(hm(22, 0), hm(6, 0));
    assert!(overnight.wraps_midnight());
    assert!(overnight.contains(hm(23, 0)));
    assert!(overnight.contains(hm(5, 59)));
    assert!(!overnight.contains(hm(6, 0)));
    assert!(!overnight.contains(hm(12, 0)));

    let empty = QuietWindow::new(hm(5, 0), hm(5, 0));
    assert!(empty.is_empty());
    assert!(!empty.contains(hm(5, 0)));
}

#[test]
fn quiet_window_parses_and_formats() {
    let window = QuietWindow::parse("00:00", "08:30").expect("parse");
    assert_eq!(window, QuietWindow::new(hm(0, 0), hm(8, 30)));
    assert_eq!(window.to_string(), "12:00 AM to 8:30 AM");
    assert!(QuietWindow::parse("8am", "09:00").is_err());
}

#[test]
fn time_until_quiet_change() {
    let clock = clock(vec![
        QuietWindow::new(hm(0, 0), hm(8, 30)),
        QuietWindow::new(hm(13, 0), hm(14, 0)),
    ]);

    assert_eq!(
        clock.time_until_quiet_hours_end(at(3, 0, 0)),
        Some(Duration::minutes(330))
    );
    assert_eq!(
        clock.time_until_quiet_hours_end(at(12, 0, 0)),
        Some(Duration::hours(1))
    );
    // Past the last window today: next start is tomorrow's midnight window.
    assert_eq!(
        clock.time_until_quiet_hours_end(at(20, 0, 0)),
        Some(Duration::hours(4))
    );
    assert_eq!(
        StreakClock::default().time_until_quiet_hours_end(at(3, 0, 0)),
        None
    );
}

#[test]
fn overlapping_quiet_windows_report_latest_end() {
    let clock = clock(vec![
        QuietWindow::new(hm(22, 0), hm(2, 0)),
        QuietWindow::new(hm(23, 0), hm(6, 0)),
    ]);
    assert_eq!(
        clock.time_until_quiet_hours_end(at(23, 30, 0)),
        Some(Duration::minutes(390))
    );
}

#[test]
fn detection_during_quiet_hours_is_dropped() {
    let (tracker, notifier) = tracker_with(
        clock(vec![QuietWindow::new(hm(0, 0), hm(8, 30))]),
        table(&[(1, "First Blood")], &[]),
        at(0, 0, 0),
    );
    assert_eq!(
        tracker.register_detection(at(3, 0, 0)),
        DetectionOutcome::QuietHours
    );
    let state = tracker.snapshot();
    assert_eq!(state.kill_count, 0);
    assert_eq!(state.last_kill_time, None);
    assert!(notifier.take().is_empty());

    assert_eq!(
        tracker.register_detection(at(8, 30, 0)),
        DetectionOutcome::Kill { kill_count: 1 }
    );
}

#[test]
fn regular_kills_fire_exact_milestones_only() {
    let (tracker, notifier) = tracker_with(
        clock(Vec::new()),
        table(&[(1, "First Blood"), (2, "Killing Spree")], &[]),
        at(9, 0, 0),
    );
    let mut now = at(9, 0, 0);
    tracker.register_detection(now);
    assert_eq!(notifier.labels(), vec!["First Blood"]);

    now += Duration::minutes(2);
    tracker.register_detection(now);
    assert_eq!(notifier.labels(), vec!["Killing Spree"]);

    now += Duration::minutes(2);
    assert_eq!(
        tracker.register_detection(now),
        DetectionOutcome::Kill { kill_count: 3 }
    );
    assert!(notifier.labels().is_empty());
}

#[test]
fn detection_inside_cooldown_is_not_a_multi_kill() {
    let (tracker, notifier) = default_tracker(at(9, 0, 0));
    let t0 = at(9, 0, 0);
    assert_eq!(
        tracker.register_detection(t0),
        DetectionOutcome::Kill { kill_count: 1 }
    );
    notifier.take();

    assert_eq!(
        tracker.register_detection(t0 + Duration::seconds(2)),
        DetectionOutcome::Cooldown
    );
    let state = tracker.snapshot();
    assert_eq!(state.multi_kill_count, 1);
    assert_eq!(state.last_kill_time, Some(t0));
    assert!(notifier.take().is_empty());
}

#[test]
fn seventh_kill_fires_headshot() {
    let (tracker, notifier) = default_tracker(at(9, 0, 0));
    let mut now = at(9, 0, 0);
    for _ in 0..6 {
        tracker.register_detection(now);
        now += Duration::minutes(2);
    }
    notifier.take();

    assert_eq!(
        tracker.register_detection(now),
        DetectionOutcome::Kill { kill_count: 7 }
    );
    let events = notifier.take();
    assert!(events.iter().any(|event| matches!(
        event,
        TrackerEvent::Milestone {
            kind: MilestoneKind::Headshot,
            count: 7,
            ..
        }
    )));
}

#[test]
fn multi_kills_escalate_to_headshot() {
    let (tracker, notifier) = default_tracker(at(9, 0, 0));
    let mut now = at(9, 0, 0);
    let mut outcomes = Vec::new();
    for _ in 0..6 {
        outcomes.push(tracker.register_detection(now));
        now += Duration::seconds(5);
    }
    assert_eq!(outcomes[0], DetectionOutcome::Kill { kill_count: 1 });
    assert_eq!(
        outcomes[5],
        DetectionOutcome::MultiKill {
            multi_kill_count: 6
        }
    );
    assert_eq!(
        notifier.labels(),
        vec!["First Blood", "Double Kill", "Multi Kill", "Headshot"]
    );
    assert_eq!(tracker.snapshot().kill_count, 1);
}

#[test]
fn multi_kills_without_escalation_stay_silent_past_table() {
    let milestones = table_with(&[(1, "First Blood")], &[(2, "Double Kill")], false);
    let (tracker, notifier) = tracker_with(clock(Vec::new()), milestones, at(9, 0, 0));
    let mut now = at(9, 0, 0);
    for _ in 0..8 {
        tracker.register_detection(now);
        now += Duration::seconds(5);
    }
    assert_eq!(notifier.labels(), vec!["First Blood", "Double Kill"]);
}

#[test]
fn tick_closes_streak_once() {
    let (tracker, notifier) = default_tracker(at(9, 0, 0));
    let t0 = at(9, 0, 0);
    tracker.register_detection(t0);
    tracker.register_detection(t0 + Duration::seconds(10));
    notifier.take();

    assert!(!tracker.tick(t0 + Duration::seconds(60)).streak_expired);
    assert!(tracker.tick(t0 + Duration::seconds(71)).streak_expired);
    assert!(!tracker.tick(t0 + Duration::seconds(72)).streak_expired);
    assert_eq!(
        notifier.take(),
        vec![TrackerEvent::StreakExpired {
            additional_kills: 1
        }]
    );
}

#[test]
fn fresh_kill_closes_unflagged_streak_first() {
    let (tracker, notifier) = default_tracker(at(9, 0, 0));
    let t0 = at(9, 0, 0);
    tracker.register_detection(t0);
    tracker.register_detection(t0 + Duration::seconds(5));
    notifier.take();

    tracker.register_detection(t0 + Duration::minutes(5));
    let events = notifier.take();
    assert_eq!(
        events[0],
        TrackerEvent::StreakExpired {
            additional_kills: 1
        }
    );
    assert!(matches!(
        &events[1],
        TrackerEvent::Milestone { milestone, .. } if milestone.label == "Killing Spree"
    ));
    assert!(!tracker.snapshot().multi_kill_expired);
}

#[test]
fn late_frame_after_tick_starts_a_new_streak() {
    let (tracker, notifier) = default_tracker(at(9, 0, 0));
    let t0 = at(9, 0, 0);
    tracker.register_detection(t0);
    assert!(tracker.tick(t0 + Duration::seconds(61)).streak_expired);
    notifier.take();

    // Captured inside the old window but scored after the tick closed it.
    assert_eq!(
        tracker.register_detection(t0 + Duration::seconds(59)),
        DetectionOutcome::Kill { kill_count: 2 }
    );
    assert_eq!(notifier.labels(), vec!["Killing Spree"]);
    let state = tracker.snapshot();
    assert_eq!(state.multi_kill_count, 1);
    assert!(!state.multi_kill_expired);
}

#[test]
fn tick_resets_counter_after_a_day() {
    let start = at(9, 0, 0);
    let (tracker, notifier) = default_tracker(start);
    tracker.register_detection(start);
    tracker.tick(start + Duration::minutes(5));
    notifier.take();

    let outcome = tracker.tick(start + Duration::hours(24));
    assert!(outcome.counter_reset);
    assert_eq!(tracker.snapshot().kill_count, 0);
    assert_eq!(
        notifier.take(),
        vec![TrackerEvent::CounterReset {
            previous_kills: 1,
            reason: ResetReason::WindowElapsed
        }]
    );
    assert!(!tracker.tick(start + Duration::hours(24)).counter_reset);
}

#[test]
fn midnight_rollover_is_idempotent_with_poll() {
    let start = at(9, 0, 0);
    let (tracker, _notifier) = default_tracker(start);
    tracker.register_detection(start);

    let midnight = next_local_midnight(start);
    assert!(tracker.midnight_rollover(midnight));
    assert!(!tracker.midnight_rollover(midnight + Duration::seconds(1)));
    assert!(!tracker.tick(midnight + Duration::seconds(1)).counter_reset);
    assert_eq!(
        tracker.register_detection(midnight + Duration::hours(10)),
        DetectionOutcome::Kill { kill_count: 1 }
    );
}

#[test]
fn apply_config_keeps_counters() {
    let start = at(9, 0, 0);
    let (tracker, notifier) = default_tracker(start);
    tracker.register_detection(start);
    notifier.take();

    tracker.apply_config(TrackerConfig {
        clock: clock(Vec::new()),
        milestones: table(&[(2, "Second")], &[]),
    });
    tracker.register_detection(start + Duration::minutes(2));
    assert_eq!(notifier.labels(), vec!["Second"]);
    assert_eq!(tracker.snapshot().kill_count, 2);
}

#[test]
fn kills_are_recorded_best_effort() {
    let start = at(9, 0, 0);
    let store = Arc::new(CountingStore::default());
    let tracker = KillTracker::new(
        TrackerConfig {
            clock: clock(vec![QuietWindow::new(hm(0, 0), hm(8, 0))]),
            milestones: table(&[], &[]),
        },
        Arc::new(RecordingNotifier::default()),
        Some(store.clone()),
        start,
    );
    tracker.register_detection(at(3, 0, 0));
    tracker.register_detection(start);
    tracker.register_detection(start + Duration::seconds(1));
    tracker.register_detection(start + Duration::seconds(10));
    assert_eq!(
        *store.kills.lock().expect("kills lock"),
        vec![start, start + Duration::seconds(10)]
    );

    let failing = KillTracker::new(
        TrackerConfig {
            clock: clock(Vec::new()),
            milestones: table(&[], &[]),
        },
        Arc::new(RecordingNotifier::default()),
        Some(Arc::new(CountingStore {
            fail: true,
            ..CountingStore::default()
        })),
        start,
    );
    assert_eq!(
        failing.register_detection(start),
        DetectionOutcome::Kill { kill_count: 1 }
    );
}

#[test]
fn milestone_tables_must_increase() {
    let out_of_order = vec![(2, m("b")), (1, m("a"))];
    assert!(MilestoneTable::new(out_of_order, Vec::new(), headshot(true)).is_err());
    assert!(MilestoneTable::new(vec![(0, m("zero"))], Vec::new(), headshot(true)).is_err());
    let duplicate = vec![(1, m("a")), (1, m("b"))];
    assert!(MilestoneTable::new(duplicate, Vec::new(), headshot(true)).is_err());
}

#[test]
fn quiet_hours_log_is_rate_limited() {
    let mut log = RateLimitedLog::new(Duration::seconds(5));
    let t0 = at(3, 0, 0);
    assert_eq!(log.record(t0), LogDecision::Emit { suppressed: 0 });
    assert_eq!(log.record(t0 + Duration::seconds(1)), LogDecision::Suppress);
    assert_eq!(log.record(t0 + Duration::seconds(5)), LogDecision::Suppress);
    assert_eq!(
        log.record(t0 + Duration::seconds(6)),
        LogDecision::Emit { suppressed: 2 }
    );
}

#[test]
fn suppressed_count_flushes_after_window_closes() {
    let mut log = RateLimitedLog::new(Duration::seconds(5));
    let t0 = at(3, 0, 0);
    assert_eq!(log.flush(t0), None);
    log.record(t0);
    log.record(t0 + Duration::seconds(2));
    log.record(t0 + Duration::seconds(3));
    assert_eq!(log.flush(t0 + Duration::seconds(5)), None);
    assert_eq!(log.flush(t0 + Duration::seconds(6)), Some(2));
    assert_eq!(log.flush(t0 + Duration::seconds(7)), None);
    assert_eq!(
        log.record(t0 + Duration::seconds(8)),
        LogDecision::Emit { suppressed: 0 }
    );
}

#[test]
fn tick_after_quiet_drops_leaves_state_untouched() {
    let (tracker, _notifier) = tracker_with(
        clock(vec![QuietWindow::new(hm(0, 0), hm(8, 30))]),
        table(&[(1, "First Blood")], &[]),
        at(2, 0, 0),
    );
    let t0 = at(3, 0, 0);
    for offset in [0, 5] {
        assert_eq!(
            tracker.register_detection(t0 + Duration::seconds(offset)),
            DetectionOutcome::QuietHours
        );
    }
    assert_eq!(tracker.tick(t0 + Duration::seconds(30)), TickOutcome::default());
    assert_eq!(tracker.snapshot().kill_count, 0);
}

#[test]
fn concurrent_ticks_fire_expiry_once() {
    let start = at(9, 0, 0);
    let (tracker, notifier) = default_tracker(start);
    tracker.register_detection(start);
    notifier.take();
    let tracker = Arc::new(tracker);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tracker = tracker.clone();
            std::thread::spawn(move || tracker.tick(start + Duration::minutes(2)).streak_expired)
        })
        .collect();
    let fired = handles
        .into_iter()
        .map(|handle| handle.join().expect("tick thread"))
        .filter(|expired| *expired)
        .count();
    assert_eq!(fired, 1);
    assert_eq!(notifier.take().len(), 1);
}
