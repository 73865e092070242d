use super::milestones::{Milestone, MilestoneKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// 24 hours elapsed since the counting window opened.
    WindowElapsed,
    /// Local midnight passed.
    Midnight,
}

/// Everything the tracker reports to its notifier, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Milestone {
        kind: MilestoneKind,
        count: u32,
        milestone: Milestone,
    },
    StreakExpired {
        additional_kills: u32,
    },
    CounterReset {
        previous_kills: u32,
        reason: ResetReason,
    },
}
