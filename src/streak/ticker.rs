use super::tracker::KillTracker;
use crate::shutdown::Shutdown;
use chrono::{DateTime, Duration, Local, TimeZone};
use crossbeam_channel::{select, tick};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Run [`KillTracker::tick`] every `interval` until shutdown.
pub fn spawn_expiry_ticker(
    tracker: Arc<KillTracker>,
    interval: std::time::Duration,
    shutdown: Shutdown,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("streak-ticker".into())
        .spawn(move || {
            let ticks = tick(interval);
            loop {
                select! {
                    recv(shutdown.receiver()) -> _ => break,
                    recv(ticks) -> _ => {
                        tracker.tick(Local::now());
                    }
                }
            }
            debug!("streak ticker stopped");
        })
}

/// Sleep until each local midnight and roll the daily counter over.
pub fn spawn_midnight_rollover(
    tracker: Arc<KillTracker>,
    shutdown: Shutdown,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("midnight-rollover".into())
        .spawn(move || {
            loop {
                let now = Local::now();
                let wait = (next_local_midnight(now) - now)
                    .to_std()
                    .unwrap_or_default();
                info!(
                    hours = format_args!("{:.1}", wait.as_secs_f64() / 3_600.0),
                    "hours until midnight reset"
                );
                if shutdown.wait_timeout(wait) {
                    break;
                }
                tracker.midnight_rollover(Local::now());
            }
            debug!("midnight rollover stopped");
        })
}

/// First instant of the next local calendar day. Falls back to 24 hours ahead when the
/// zone skips midnight.
pub fn next_local_midnight(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .unwrap_or_else(|| now + Duration::hours(24))
}
