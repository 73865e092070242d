//! Command-line parsing, validation, and the hot-reloadable settings file.

mod defaults;
pub mod settings;
#[cfg(test)]
mod tests;
mod validation;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_DATABASE_FILE, DEFAULT_FRAME_MS, DEFAULT_MAX_INIT_ATTEMPTS,
    DEFAULT_READ_BACKOFF_MS, DEFAULT_READ_FAILURE_THRESHOLD, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_SAMPLE_RATE, DEFAULT_SETTINGS_FILE, DEFAULT_SETTINGS_POLL_SECS, DEFAULT_SOUNDS_DIR,
    DEFAULT_TICK_MS,
};
pub use settings::{
    DetectionSettings, HeadshotSettings, MilestoneSetting, QuietWindowSetting, SettingsHandle,
    SettingsOverrides, SettingsWatcher, ZapSettings,
};

/// CLI options for the zap streak tracker. Validated values keep the capture loop sane.
#[derive(Debug, Parser, Clone)]
#[command(about = "ZapStreak bug zapper kill streak tracker", author, version)]
pub struct AppConfig {
    /// JSON settings file (thresholds, quiet hours, milestones); reloaded while running
    #[arg(long, env = "ZAPSTREAK_SETTINGS", default_value = DEFAULT_SETTINGS_FILE)]
    pub settings: PathBuf,

    /// How often the settings file is checked for changes (seconds)
    #[arg(long = "settings-poll-secs", default_value_t = DEFAULT_SETTINGS_POLL_SECS)]
    pub settings_poll_secs: u64,

    /// SQLite database for detection events and daily scores
    #[arg(long, env = "ZAPSTREAK_DB", default_value = DEFAULT_DATABASE_FILE)]
    pub database: PathBuf,

    /// Do not persist events or scores
    #[arg(long = "no-store", default_value_t = false)]
    pub no_store: bool,

    /// Directory that relative milestone sound paths resolve against
    #[arg(long = "sounds-dir", default_value = DEFAULT_SOUNDS_DIR)]
    pub sounds_dir: PathBuf,

    /// Disable milestone sound playback (milestones are still logged)
    #[arg(long = "no-sounds", default_value_t = false)]
    pub no_sounds: bool,

    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Capture sample rate (Hz)
    #[arg(long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Analysis frame length (milliseconds)
    #[arg(long = "frame-ms", default_value_t = DEFAULT_FRAME_MS)]
    pub frame_ms: u64,

    /// Frame channel capacity between the audio callback and the capture loop
    #[arg(long = "channel-capacity", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Bounded wait for the next audio frame (milliseconds)
    #[arg(long = "read-timeout-ms", default_value_t = DEFAULT_READ_TIMEOUT_MS)]
    pub read_timeout_ms: u64,

    /// Backoff after a failed or empty read (milliseconds)
    #[arg(long = "read-backoff-ms", default_value_t = DEFAULT_READ_BACKOFF_MS)]
    pub read_backoff_ms: u64,

    /// Consecutive read failures before the audio source is re-opened
    #[arg(long = "read-failure-threshold", default_value_t = DEFAULT_READ_FAILURE_THRESHOLD)]
    pub read_failure_threshold: u32,

    /// Attempts to open the audio device before giving up
    #[arg(long = "max-init-attempts", default_value_t = DEFAULT_MAX_INIT_ATTEMPTS)]
    pub max_init_attempts: u32,

    /// Expiry/rollover ticker interval (milliseconds)
    #[arg(long = "tick-ms", default_value_t = DEFAULT_TICK_MS)]
    pub tick_ms: u64,

    /// Simulate zaps with key presses instead of listening to the microphone
    #[arg(long = "test-mode", default_value_t = false)]
    pub test_mode: bool,

    /// Print stored statistics and exit
    #[arg(long = "stats", default_value_t = false)]
    pub stats: bool,

    /// Mark a stored audio event as a zap and exit
    #[arg(long = "mark-zap", value_name = "EVENT_ID", conflicts_with = "mark_not_zap")]
    pub mark_zap: Option<i64>,

    /// Mark a stored audio event as not a zap and exit
    #[arg(long = "mark-not-zap", value_name = "EVENT_ID")]
    pub mark_not_zap: Option<i64>,

    /// Log verbosity
    #[arg(long = "log-level", env = "ZAPSTREAK_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Write JSON trace lines to this file instead of stderr
    #[arg(long = "trace-log")]
    pub trace_log: Option<PathBuf>,

    /// Disable all logging
    #[arg(long = "no-logs", env = "ZAPSTREAK_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Tunables for the capture loop, derived from CLI flags.
#[derive(Debug, Clone)]
pub struct CapturePolicy {
    pub read_timeout: std::time::Duration,
    pub read_backoff: std::time::Duration,
    pub read_failure_threshold: u32,
    pub max_init_attempts: u32,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            read_timeout: std::time::Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            read_backoff: std::time::Duration::from_millis(DEFAULT_READ_BACKOFF_MS),
            read_failure_threshold: DEFAULT_READ_FAILURE_THRESHOLD,
            max_init_attempts: DEFAULT_MAX_INIT_ATTEMPTS,
        }
    }
}
