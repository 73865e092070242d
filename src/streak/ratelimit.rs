use chrono::{DateTime, Duration, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDecision {
    /// Log now; `suppressed` messages were swallowed in the window that just closed.
    Emit { suppressed: usize },
    Suppress,
}

/// At most one message per rolling window; the rest are counted and reported with the
/// next message that opens a new window, or by `flush` once the window closes.
#[derive(Debug, Clone)]
pub struct RateLimitedLog {
    window: Duration,
    window_start: Option<DateTime<Local>>,
    suppressed: usize,
}

impl RateLimitedLog {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            suppressed: 0,
        }
    }

    pub fn record(&mut self, now: DateTime<Local>) -> LogDecision {
        match self.window_start {
            Some(start) if now - start <= self.window => {
                self.suppressed += 1;
                LogDecision::Suppress
            }
            _ => {
                let suppressed = std::mem::take(&mut self.suppressed);
                self.window_start = Some(now);
                LogDecision::Emit { suppressed }
            }
        }
    }

    /// Hand back the suppressed count once its window has closed with no message to carry it.
    pub fn flush(&mut self, now: DateTime<Local>) -> Option<usize> {
        match self.window_start {
            Some(start) if now - start > self.window && self.suppressed > 0 => {
                Some(std::mem::take(&mut self.suppressed))
            }
            _ => None,
        }
    }
}
