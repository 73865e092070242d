use super::clock::StreakClock;
use super::events::{ResetReason, TrackerEvent};
use super::milestones::MilestoneTable;
use super::ratelimit::{LogDecision, RateLimitedLog};
use super::state::StreakState;
use crate::lock::lock_or_recover;
use crate::notify::Notifier;
use crate::store::EventStore;
use chrono::{DateTime, Duration, Local};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const QUIET_LOG_WINDOW_SECS: i64 = 5;

/// Everything the tracker needs to score detections; swapped wholesale on settings reload.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub clock: StreakClock,
    pub milestones: MilestoneTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionOutcome {
    Cooldown,
    QuietHours,
    Kill { kill_count: u32 },
    MultiKill { multi_kill_count: u32 },
}

impl DetectionOutcome {
    pub fn is_kill(self) -> bool {
        matches!(
            self,
            DetectionOutcome::Kill { .. } | DetectionOutcome::MultiKill { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub streak_expired: bool,
    pub counter_reset: bool,
}

struct TrackerInner {
    state: StreakState,
    config: TrackerConfig,
    quiet_log: RateLimitedLog,
}

/// Owns the streak state. Detections, expiry ticks and rollovers each run as one
/// critical section, so no check-then-act can interleave with another.
pub struct KillTracker {
    inner: Mutex<TrackerInner>,
    notifier: Arc<dyn Notifier>,
    store: Option<Arc<dyn EventStore>>,
}

impl KillTracker {
    pub fn new(
        config: TrackerConfig,
        notifier: Arc<dyn Notifier>,
        store: Option<Arc<dyn EventStore>>,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                state: StreakState::new(now),
                config,
                quiet_log: RateLimitedLog::new(Duration::seconds(QUIET_LOG_WINDOW_SECS)),
            }),
            notifier,
            store,
        }
    }

    /// Score one classified zap.
    pub fn register_detection(&self, now: DateTime<Local>) -> DetectionOutcome {
        let outcome = {
            let mut guard = lock_or_recover(&self.inner, "kill tracker");
            let inner = &mut *guard;
            self.score(inner, now)
        };

        if outcome.is_kill() {
            if let Some(store) = &self.store {
                if let Err(err) = store.record_kill(now) {
                    warn!("failed to record kill: {err}");
                }
            }
        }
        outcome
    }

    fn score(&self, inner: &mut TrackerInner, now: DateTime<Local>) -> DetectionOutcome {
        let TrackerInner {
            state,
            config,
            quiet_log,
        } = inner;

        if config.clock.in_cooldown(state, now) {
            debug!("detection inside cooldown; ignored");
            return DetectionOutcome::Cooldown;
        }

        if config.clock.during_quiet_hours(now) {
            if let LogDecision::Emit { suppressed } = quiet_log.record(now) {
                if suppressed > 0 {
                    debug!(
                        suppressed,
                        "Zap detected during quiet hours. Not counting kill."
                    );
                } else {
                    debug!("Zap detected during quiet hours. Not counting kill.");
                }
            }
            return DetectionOutcome::QuietHours;
        }

        // A closed streak stays closed, even for a frame captured before the tick that closed it.
        let outcome = if state.has_open_streak()
            && config.clock.within_multi_kill_window(state, now)
        {
            state.multi_kill_count += 1;
            let count = state.multi_kill_count;
            info!(multi_kill_count = count, "multi-kill");
            if let Some((kind, milestone)) = config.milestones.for_multi_kill(count) {
                self.notify(TrackerEvent::Milestone {
                    kind,
                    count,
                    milestone: milestone.clone(),
                });
            }
            DetectionOutcome::MultiKill {
                multi_kill_count: count,
            }
        } else {
            if state.has_open_streak() {
                state.multi_kill_expired = true;
                self.streak_expired(state.multi_kill_count);
            }
            state.kill_count += 1;
            state.multi_kill_count = 1;
            let count = state.kill_count;
            info!(kill_count = count, "kill");
            if let Some((kind, milestone)) = config.milestones.for_kill(count) {
                self.notify(TrackerEvent::Milestone {
                    kind,
                    count,
                    milestone: milestone.clone(),
                });
            }
            DetectionOutcome::Kill { kill_count: count }
        };

        state.last_kill_time = Some(now);
        state.multi_kill_expired = false;
        debug!(
            kill_count = state.kill_count,
            "kills so far today (excluding multi-kills)"
        );
        outcome
    }

    /// Periodic check: closes an expired streak and resets a 24 hour old counter.
    pub fn tick(&self, now: DateTime<Local>) -> TickOutcome {
        let mut guard = lock_or_recover(&self.inner, "kill tracker");
        let TrackerInner {
            state,
            config,
            quiet_log,
        } = &mut *guard;
        let mut outcome = TickOutcome::default();

        if let Some(suppressed) = quiet_log.flush(now) {
            debug!(suppressed, "Further zaps detected during quiet hours were not counted.");
        }

        if config.clock.multi_kill_window_expired(state, now) {
            outcome.streak_expired = true;
            self.streak_expired(state.multi_kill_count);
        }

        let previous_kills = state.kill_count;
        if config.clock.maybe_reset_daily_counter(state, now) {
            info!(previous_kills, "Cumulative kill timer reset.");
            outcome.counter_reset = true;
            self.notify(TrackerEvent::CounterReset {
                previous_kills,
                reason: ResetReason::WindowElapsed,
            });
        }
        outcome
    }

    /// Calendar-day reset; a no-op when the window already started today.
    pub fn midnight_rollover(&self, now: DateTime<Local>) -> bool {
        let mut guard = lock_or_recover(&self.inner, "kill tracker");
        let TrackerInner { state, config, .. } = &mut *guard;
        let previous_kills = state.kill_count;
        if !config.clock.calendar_rollover(state, now) {
            return false;
        }
        info!(previous_kills, "Cumulative kill count reset at midnight.");
        self.notify(TrackerEvent::CounterReset {
            previous_kills,
            reason: ResetReason::Midnight,
        });
        true
    }

    /// Replace thresholds, windows and milestones. Counters are kept.
    pub fn apply_config(&self, config: TrackerConfig) {
        let mut guard = lock_or_recover(&self.inner, "kill tracker");
        guard.config = config;
    }

    pub fn snapshot(&self) -> StreakState {
        lock_or_recover(&self.inner, "kill tracker").state.clone()
    }

    pub fn clock(&self) -> StreakClock {
        lock_or_recover(&self.inner, "kill tracker")
            .config
            .clock
            .clone()
    }

    pub fn milestones(&self) -> MilestoneTable {
        lock_or_recover(&self.inner, "kill tracker")
            .config
            .milestones
            .clone()
    }

    fn streak_expired(&self, multi_kill_count: u32) {
        let additional_kills = multi_kill_count.saturating_sub(1);
        if additional_kills > 0 {
            info!(additional_kills, "multi-kill window expired");
        } else {
            debug!("multi-kill window expired");
        }
        self.notify(TrackerEvent::StreakExpired { additional_kills });
    }

    fn notify(&self, event: TrackerEvent) {
        self.notifier.notify(&event);
    }
}
