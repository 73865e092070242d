//! ZapStreak: listens for bug zapper discharges and announces kill streaks.

mod cli_utils;
mod report;
mod test_mode;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};
use zapstreak::audio::CpalBackend;
use zapstreak::config::{
    AppConfig, SettingsHandle, SettingsOverrides, SettingsWatcher, ZapSettings,
};
use zapstreak::notify::{CpalPlayer, LogNotifier, Notifier, PlaybackQueue, SoundBackend};
use zapstreak::shutdown::{install_termination_handlers, take_termination_request, Shutdown};
use zapstreak::store::{EventStore, SqliteStore};
use zapstreak::streak::{spawn_expiry_ticker, spawn_midnight_rollover};
use zapstreak::telemetry::init_tracing;
use zapstreak::{CaptureLoop, KillTracker};

use crate::cli_utils::{list_input_devices, mark_event};
use crate::test_mode::TEST_MODE_MULTI_KILL_WINDOW_MS;

/// How often the main thread checks for termination signals.
const SIGNAL_POLL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    if config.list_input_devices {
        list_input_devices()?;
        return Ok(());
    }

    init_tracing(&config);
    if config.stats {
        return report::print_statistics(&config.database, Local::now());
    }
    if let Some(id) = config.mark_zap {
        return mark_event(&config.database, id, true);
    }
    if let Some(id) = config.mark_not_zap {
        return mark_event(&config.database, id, false);
    }

    run(config)
}

fn run(config: AppConfig) -> Result<()> {
    let overrides = if config.test_mode {
        SettingsOverrides {
            multi_kill_window_ms: Some(TEST_MODE_MULTI_KILL_WINDOW_MS),
        }
    } else {
        SettingsOverrides::default()
    };
    let contents = ZapSettings::read_contents(&config.settings)?;
    let mut settings = ZapSettings::from_contents(contents.as_deref())
        .with_context(|| format!("settings {}", config.settings.display()))?;
    overrides.apply(&mut settings);

    let store = open_store(&config);
    let playback = if config.no_sounds {
        None
    } else {
        Some(Arc::new(PlaybackQueue::spawn(|| {
            Box::new(CpalPlayer::new()) as Box<dyn SoundBackend>
        })?))
    };
    let notifier: Arc<dyn Notifier> = match &playback {
        Some(queue) => queue.clone(),
        None => Arc::new(LogNotifier),
    };

    let now = Local::now();
    let tracker = Arc::new(KillTracker::new(
        settings.tracker_config(&config.sounds_dir)?,
        notifier,
        store.clone(),
        now,
    ));
    info!("ZapStreak started");
    for line in report::startup_lines(&settings, &tracker.clock(), now) {
        info!("{line}");
    }

    install_termination_handlers()?;
    let shutdown = Shutdown::new();
    let handle = SettingsHandle::new(settings);
    let workers = vec![
        spawn_expiry_ticker(tracker.clone(), config.tick_interval(), shutdown.clone())?,
        spawn_midnight_rollover(tracker.clone(), shutdown.clone())?,
        SettingsWatcher::new(
            config.settings.clone(),
            config.sounds_dir.clone(),
            handle.clone(),
            tracker.clone(),
            overrides,
            contents,
        )
        .spawn(config.settings_poll_interval(), shutdown.clone())?,
    ];

    let result = if config.test_mode {
        test_mode::run(&tracker, &shutdown)
    } else {
        let capture = CaptureLoop::new(
            Box::new(CpalBackend),
            config.audio_source_config(),
            config.capture_policy(),
            handle,
            tracker.clone(),
            store,
            shutdown.clone(),
        )
        .spawn()?;
        wait_for_capture(capture, &shutdown)
    };

    shutdown.trigger();
    for worker in workers {
        if worker.join().is_err() {
            error!("background thread panicked");
        }
    }
    if let Some(queue) = playback {
        queue.abort();
    }
    let state = tracker.snapshot();
    info!(kills_today = state.kill_count, "ZapStreak stopped");
    result
}

/// Persistence is best-effort: an unavailable database disables it rather than aborting.
fn open_store(config: &AppConfig) -> Option<Arc<dyn EventStore>> {
    if config.no_store {
        return None;
    }
    match SqliteStore::open(&config.database) {
        Ok(store) => Some(Arc::new(store)),
        Err(err) => {
            warn!("event store unavailable; continuing without persistence: {err}");
            None
        }
    }
}

fn wait_for_capture(
    capture: JoinHandle<Result<zapstreak::CaptureStats>>,
    shutdown: &Shutdown,
) -> Result<()> {
    while !capture.is_finished() {
        if take_termination_request() {
            info!("shutdown requested");
            shutdown.trigger();
        }
        thread::sleep(SIGNAL_POLL);
    }
    let stats = capture
        .join()
        .map_err(|_| anyhow!("capture loop panicked"))??;
    info!(
        frames = stats.frames,
        zaps = stats.zaps,
        kills = stats.kills,
        read_failures = stats.read_failures,
        stalled_reads = stats.stalled_reads,
        reinitializations = stats.reinitializations,
        "capture summary"
    );
    Ok(())
}
