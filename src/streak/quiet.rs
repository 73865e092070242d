use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use std::fmt;

/// Half-open `[start, end)` time-of-day window. `start > end` wraps past midnight and
/// `start == end` never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse `HH:MM` or `HH:MM:SS` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self::new(parse_time_of_day(start)?, parse_time_of_day(end)?))
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start < self.end {
            self.start <= time && time < self.end
        } else if self.wraps_midnight() {
            time >= self.start || time < self.end
        } else {
            false
        }
    }

    /// End of the occurrence of this window that contains `now`.
    fn end_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today_end = now.date().and_time(self.end);
        if today_end > now {
            today_end
        } else {
            today_end + Duration::days(1)
        }
    }

    fn next_start_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today_start = now.date().and_time(self.start);
        if today_start > now {
            today_start
        } else {
            today_start + Duration::days(1)
        }
    }
}

impl fmt::Display for QuietWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%-I:%M %p"),
            self.end.format("%-I:%M %p")
        )
    }
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| anyhow!("invalid time of day '{value}' (expected HH:MM)"))
}

/// Every configured quiet window; a time inside any of them is quiet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuietHours {
    windows: Vec<QuietWindow>,
}

impl QuietHours {
    pub fn new(windows: Vec<QuietWindow>) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &[QuietWindow] {
        &self.windows
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.windows.iter().any(|window| window.contains(time))
    }

    /// Inside quiet hours: time until the containing window ends (the latest end if
    /// several overlap). Outside: time until the next window starts. `None` when no
    /// window can ever match.
    pub fn time_until_change(&self, now: NaiveDateTime) -> Option<Duration> {
        let time = now.time();
        let current_end = self
            .windows
            .iter()
            .filter(|window| window.contains(time))
            .map(|window| window.end_after(now))
            .max();
        if let Some(end) = current_end {
            return Some(end - now);
        }

        self.windows
            .iter()
            .filter(|window| !window.is_empty())
            .map(|window| window.next_start_after(now))
            .min()
            .map(|start| start - now)
    }
}
