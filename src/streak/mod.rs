//! Streak scoring: turns accepted zap detections into kills, multi-kills and milestones.
//!
//! `StreakState` is owned by [`KillTracker`] behind a single mutex; [`StreakClock`] holds the
//! time policy and only ever mutates state it is handed. Background threads drive expiry
//! and rollover through the tracker so every check-and-set happens under that one lock.

mod clock;
mod events;
mod milestones;
mod quiet;
mod ratelimit;
mod state;
#[cfg(test)]
mod tests;
mod ticker;
mod tracker;

pub use clock::{StreakClock, DEFAULT_COOLDOWN_MS, DEFAULT_MULTI_KILL_WINDOW_MS};
pub use events::{ResetReason, TrackerEvent};
pub use milestones::{HeadshotPolicy, Milestone, MilestoneKind, MilestoneTable};
pub use quiet::{QuietHours, QuietWindow};
pub use ratelimit::{LogDecision, RateLimitedLog};
pub use state::StreakState;
pub use ticker::{next_local_midnight, spawn_expiry_ticker, spawn_midnight_rollover};
pub use tracker::{DetectionOutcome, KillTracker, TickOutcome, TrackerConfig};
