//! JSON settings file: detection thresholds, quiet hours and milestone tables.
//!
//! The file is optional; a missing file means defaults. While running, the
//! [`SettingsWatcher`] re-reads it and applies valid changes without a restart.

use crate::detect::ClassifierConfig;
use crate::lock::{read_or_recover, write_or_recover};
use crate::shutdown::Shutdown;
use crate::streak::{
    HeadshotPolicy, KillTracker, Milestone, MilestoneTable, QuietHours, QuietWindow, StreakClock,
    TrackerConfig, DEFAULT_COOLDOWN_MS, DEFAULT_MULTI_KILL_WINDOW_MS,
};
use anyhow::{bail, Context, Result};
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_THRESHOLD: f32 = 32_768.0;
const MAX_COOLDOWN_MS: u64 = 3_600_000;
const MAX_MULTI_KILL_WINDOW_MS: u64 = 3_600_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZapSettings {
    /// Frames louder than this (int16 RMS) are logged and stored.
    pub logging_threshold: f32,
    /// Frames quieter than this are never classified. 0 disables the gate.
    pub trigger_threshold: f32,
    pub cooldown_ms: u64,
    pub multi_kill_window_ms: u64,
    pub quiet_hours: Vec<QuietWindowSetting>,
    pub kill_milestones: Vec<MilestoneSetting>,
    pub multi_kill_milestones: Vec<MilestoneSetting>,
    pub headshot: HeadshotSettings,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietWindowSetting {
    /// `HH:MM`, inclusive.
    pub start: String,
    /// `HH:MM`, exclusive.
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneSetting {
    pub count: u32,
    pub label: String,
    pub sound: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadshotSettings {
    pub label: String,
    pub sound: PathBuf,
    pub after_kills: u32,
    pub after_multi_kills: u32,
    pub escalate_multi_kills: bool,
}

impl Default for HeadshotSettings {
    fn default() -> Self {
        Self {
            label: "Headshot!".into(),
            sound: "headshot.wav".into(),
            after_kills: 6,
            after_multi_kills: 5,
            escalate_multi_kills: true,
        }
    }
}

fn milestone(count: u32, label: &str, sound: &str) -> MilestoneSetting {
    MilestoneSetting {
        count,
        label: label.into(),
        sound: sound.into(),
    }
}

impl Default for ZapSettings {
    fn default() -> Self {
        Self {
            logging_threshold: 30.0,
            trigger_threshold: 70.0,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            multi_kill_window_ms: DEFAULT_MULTI_KILL_WINDOW_MS,
            quiet_hours: vec![QuietWindowSetting {
                start: "00:00".into(),
                end: "08:00".into(),
            }],
            kill_milestones: vec![
                milestone(1, "First Blood", "first_blood.wav"),
                milestone(2, "Killing Spree", "killing_spree.wav"),
                milestone(3, "Rampage", "rampage.wav"),
                milestone(4, "Dominating", "dominating.wav"),
                milestone(5, "Unstoppable", "unstoppable.wav"),
                milestone(6, "Godlike", "godlike.wav"),
            ],
            multi_kill_milestones: vec![
                milestone(2, "Double Kill", "double_kill.wav"),
                milestone(3, "Multi Kill", "multi_kill.wav"),
                milestone(4, "Ultra Kill", "ultra_kill.wav"),
                milestone(5, "Monster Kill", "monster_kill.wav"),
            ],
            headshot: HeadshotSettings::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

/// The per-frame slice of settings the capture loop reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionSettings {
    pub logging_threshold: f32,
    pub trigger_threshold: f32,
    pub classifier: ClassifierConfig,
}

/// Values forced on top of whatever the file says (test mode shortens the multi-kill window).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub multi_kill_window_ms: Option<u64>,
}

impl SettingsOverrides {
    pub fn apply(&self, settings: &mut ZapSettings) {
        if let Some(window) = self.multi_kill_window_ms {
            settings.multi_kill_window_ms = window;
        }
    }
}

impl ZapSettings {
    /// Raw file contents, or `None` when the file does not exist.
    pub fn read_contents(path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read settings {}", path.display()))
            }
        }
    }

    /// Parse and validate; `None` yields defaults.
    pub fn from_contents(contents: Option<&str>) -> Result<Self> {
        let settings = match contents {
            Some(text) => serde_json::from_str::<Self>(text).context("invalid settings JSON")?,
            None => Self::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = Self::read_contents(path)?;
        if contents.is_none() {
            info!(path = %path.display(), "settings file not found; using defaults");
        }
        Self::from_contents(contents.as_deref())
            .with_context(|| format!("settings {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("logging_threshold", self.logging_threshold),
            ("trigger_threshold", self.trigger_threshold),
        ] {
            if !value.is_finite() || !(0.0..=MAX_THRESHOLD).contains(&value) {
                bail!("{name} must be between 0 and {MAX_THRESHOLD}, got {value}");
            }
        }
        if self.cooldown_ms > MAX_COOLDOWN_MS {
            bail!(
                "cooldown_ms must be at most {MAX_COOLDOWN_MS}, got {}",
                self.cooldown_ms
            );
        }
        if !(1..=MAX_MULTI_KILL_WINDOW_MS).contains(&self.multi_kill_window_ms) {
            bail!(
                "multi_kill_window_ms must be between 1 and {MAX_MULTI_KILL_WINDOW_MS}, got {}",
                self.multi_kill_window_ms
            );
        }
        let classifier = &self.classifier;
        let valid = positive(classifier.max_duration_secs)
            && classifier.min_dominant_hz.is_finite()
            && classifier.min_dominant_hz >= 0.0
            && (0.0..=1.0).contains(&classifier.min_high_energy_ratio)
            && positive(f64::from(classifier.peak_height_ratio))
            && classifier.peak_height_ratio <= 1.0
            && positive(classifier.max_rise_ms)
            && positive(classifier.max_decay_ms);
        if !valid {
            bail!("classifier thresholds must be positive and ratios within 0..=1");
        }
        self.quiet_hours()?;
        self.milestone_table(Path::new(""))?;
        Ok(())
    }

    pub fn detection(&self) -> DetectionSettings {
        DetectionSettings {
            logging_threshold: self.logging_threshold,
            trigger_threshold: self.trigger_threshold,
            classifier: self.classifier,
        }
    }

    pub fn quiet_hours(&self) -> Result<QuietHours> {
        let windows = self
            .quiet_hours
            .iter()
            .map(|window| QuietWindow::parse(&window.start, &window.end))
            .collect::<Result<Vec<_>>>()?;
        Ok(QuietHours::new(windows))
    }

    /// Milestone tables with relative sound paths resolved against `sounds_dir`.
    pub fn milestone_table(&self, sounds_dir: &Path) -> Result<MilestoneTable> {
        let resolve = |setting: &MilestoneSetting| {
            (
                setting.count,
                Milestone::new(setting.label.clone(), resolve_sound(sounds_dir, &setting.sound)),
            )
        };
        MilestoneTable::new(
            self.kill_milestones.iter().map(resolve).collect(),
            self.multi_kill_milestones.iter().map(resolve).collect(),
            HeadshotPolicy {
                milestone: Milestone::new(
                    self.headshot.label.clone(),
                    resolve_sound(sounds_dir, &self.headshot.sound),
                ),
                after_kills: self.headshot.after_kills,
                after_multi_kills: self.headshot.after_multi_kills,
                escalate_multi_kills: self.headshot.escalate_multi_kills,
            },
        )
    }

    pub fn tracker_config(&self, sounds_dir: &Path) -> Result<TrackerConfig> {
        let clock = StreakClock {
            cooldown: millis(self.cooldown_ms),
            multi_kill_window: millis(self.multi_kill_window_ms),
            quiet_hours: self.quiet_hours()?,
            ..StreakClock::default()
        };
        Ok(TrackerConfig {
            clock,
            milestones: self.milestone_table(sounds_dir)?,
        })
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn millis(ms: u64) -> ChronoDuration {
    ChronoDuration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

fn resolve_sound(sounds_dir: &Path, sound: &Path) -> PathBuf {
    if sound.is_absolute() {
        sound.to_path_buf()
    } else {
        sounds_dir.join(sound)
    }
}

/// Shared view of the active settings.
#[derive(Debug, Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<ZapSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: ZapSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn current(&self) -> ZapSettings {
        read_or_recover(&self.inner, "settings").clone()
    }

    pub fn detection(&self) -> DetectionSettings {
        read_or_recover(&self.inner, "settings").detection()
    }

    pub fn replace(&self, settings: ZapSettings) {
        *write_or_recover(&self.inner, "settings") = settings;
    }
}

/// Re-reads the settings file and pushes valid changes to the handle and the tracker.
pub struct SettingsWatcher {
    path: PathBuf,
    sounds_dir: PathBuf,
    handle: SettingsHandle,
    tracker: Arc<KillTracker>,
    overrides: SettingsOverrides,
    last_contents: Option<String>,
}

impl SettingsWatcher {
    /// `loaded_contents` is what the initial settings were parsed from.
    pub fn new(
        path: PathBuf,
        sounds_dir: PathBuf,
        handle: SettingsHandle,
        tracker: Arc<KillTracker>,
        overrides: SettingsOverrides,
        loaded_contents: Option<String>,
    ) -> Self {
        Self {
            path,
            sounds_dir,
            handle,
            tracker,
            overrides,
            last_contents: loaded_contents,
        }
    }

    /// Apply the file if it changed since the last poll. Invalid files leave the active
    /// settings untouched and are reported once per change.
    pub fn poll(&mut self) -> Result<bool> {
        let contents = ZapSettings::read_contents(&self.path)?;
        if contents == self.last_contents {
            return Ok(false);
        }
        let parsed = self.parse(contents.as_deref());
        self.last_contents = contents;
        let (settings, tracker_config) = parsed?;

        self.tracker.apply_config(tracker_config);
        self.handle.replace(settings);
        info!(path = %self.path.display(), "settings reloaded");
        Ok(true)
    }

    fn parse(&self, contents: Option<&str>) -> Result<(ZapSettings, TrackerConfig)> {
        let mut settings = ZapSettings::from_contents(contents)?;
        self.overrides.apply(&mut settings);
        let tracker_config = settings.tracker_config(&self.sounds_dir)?;
        Ok((settings, tracker_config))
    }

    pub fn spawn(mut self, interval: Duration, shutdown: Shutdown) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("settings-watcher".into())
            .spawn(move || {
                while !shutdown.wait_timeout(interval) {
                    if let Err(err) = self.poll() {
                        warn!("settings reload failed; keeping previous settings: {err:#}");
                    }
                }
                debug!("settings watcher stopped");
            })
    }
}
