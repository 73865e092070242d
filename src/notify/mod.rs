//! Milestone announcements: sound playback and its log-only stand-in.

mod playback;
mod player;

pub use playback::{play_with_retry, PlayRequest, PlaybackError, PlaybackQueue, SoundBackend};
pub use player::{load_wav, CpalPlayer, SoundClip};

use crate::streak::{ResetReason, TrackerEvent};
use tracing::info;

/// Receives tracker events. Called while the tracker lock is held, so implementations
/// must hand work off and return without blocking.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &TrackerEvent);
}

/// Logs events without playing anything (`--no-sounds`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &TrackerEvent) {
        log_event(event);
    }
}

pub(crate) fn log_event(event: &TrackerEvent) {
    match event {
        TrackerEvent::Milestone {
            kind,
            count,
            milestone,
        } => info!(kind = kind.label(), count, "{}", milestone.label),
        TrackerEvent::StreakExpired { additional_kills } => {
            info!(additional_kills, "streak over")
        }
        TrackerEvent::CounterReset {
            previous_kills,
            reason,
        } => {
            let reason = match reason {
                ResetReason::WindowElapsed => "24 hour window elapsed",
                ResetReason::Midnight => "midnight",
            };
            info!(previous_kills, reason, "kill counter reset")
        }
    }
}
