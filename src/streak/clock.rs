use super::quiet::QuietHours;
use super::state::StreakState;
use chrono::{DateTime, Duration, Local};
use tracing::debug;

pub const DEFAULT_COOLDOWN_MS: u64 = 4_000;
pub const DEFAULT_MULTI_KILL_WINDOW_MS: u64 = 60_000;
pub const COUNTER_WINDOW_HOURS: i64 = 24;

/// Time policy for the tracker: cooldown, multi-kill window, daily window and quiet hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakClock {
    pub cooldown: Duration,
    pub multi_kill_window: Duration,
    pub counter_window: Duration,
    pub quiet_hours: QuietHours,
}

impl Default for StreakClock {
    fn default() -> Self {
        Self {
            cooldown: Duration::milliseconds(DEFAULT_COOLDOWN_MS as i64),
            multi_kill_window: Duration::milliseconds(DEFAULT_MULTI_KILL_WINDOW_MS as i64),
            counter_window: Duration::hours(COUNTER_WINDOW_HOURS),
            quiet_hours: QuietHours::default(),
        }
    }
}

impl StreakClock {
    /// True when `now` falls within the cooldown of the last accepted detection.
    /// Otherwise `now` becomes the last detection time.
    pub fn in_cooldown(&self, state: &mut StreakState, now: DateTime<Local>) -> bool {
        if let Some(last) = state.last_detection_time {
            if now - last < self.cooldown {
                return true;
            }
        }
        state.last_detection_time = Some(now);
        false
    }

    pub fn during_quiet_hours(&self, now: DateTime<Local>) -> bool {
        self.quiet_hours.contains(now.time())
    }

    /// While quiet: time until quiet hours end. Otherwise: time until they begin.
    pub fn time_until_quiet_hours_end(&self, now: DateTime<Local>) -> Option<Duration> {
        self.quiet_hours.time_until_change(now.naive_local())
    }

    pub fn within_multi_kill_window(&self, state: &StreakState, now: DateTime<Local>) -> bool {
        state
            .last_kill_time
            .is_some_and(|last| now - last <= self.multi_kill_window)
    }

    /// Closes an open streak once the window has passed. Returns true exactly once per streak.
    pub fn multi_kill_window_expired(&self, state: &mut StreakState, now: DateTime<Local>) -> bool {
        let Some(last) = state.last_kill_time else {
            return false;
        };
        if state.multi_kill_expired || now - last <= self.multi_kill_window {
            return false;
        }
        state.multi_kill_expired = true;
        true
    }

    /// Starts a new counting window once the current one is 24 hours old.
    pub fn maybe_reset_daily_counter(&self, state: &mut StreakState, now: DateTime<Local>) -> bool {
        if now - state.window_start_time < self.counter_window {
            return false;
        }
        debug!(previous_kills = state.kill_count, "counting window elapsed");
        reset_window(state, now);
        true
    }

    /// Starts a new counting window when the current one opened on an earlier calendar day.
    pub fn calendar_rollover(&self, state: &mut StreakState, now: DateTime<Local>) -> bool {
        if state.window_start_time.date_naive() >= now.date_naive() {
            return false;
        }
        reset_window(state, now);
        true
    }
}

fn reset_window(state: &mut StreakState, now: DateTime<Local>) {
    state.kill_count = 0;
    state.last_kill_time = None;
    state.window_start_time = now;
}
