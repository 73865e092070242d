use chrono::{DateTime, Local};

/// Live streak counters. Never persisted; a restart begins a fresh window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakState {
    /// Regular kills in the current 24 hour window (multi-kill continuations excluded).
    pub kill_count: u32,
    /// Kills in the current streak, starting at 1 with each regular kill.
    pub multi_kill_count: u32,
    pub last_kill_time: Option<DateTime<Local>>,
    pub last_detection_time: Option<DateTime<Local>>,
    pub multi_kill_expired: bool,
    pub window_start_time: DateTime<Local>,
}

impl StreakState {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            kill_count: 0,
            multi_kill_count: 0,
            last_kill_time: None,
            last_detection_time: None,
            multi_kill_expired: false,
            window_start_time: now,
        }
    }

    /// A streak is open when a kill happened and its window has not been closed yet.
    pub fn has_open_streak(&self) -> bool {
        self.last_kill_time.is_some() && !self.multi_kill_expired
    }
}
