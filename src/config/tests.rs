use super::settings::SettingsOverrides;
use super::{AppConfig, LogLevel, SettingsHandle, SettingsWatcher, ZapSettings};
use crate::notify::LogNotifier;
use crate::streak::KillTracker;
use chrono::{Duration as ChronoDuration, Local};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn parse(args: &[&str]) -> AppConfig {
    let mut argv = vec!["test-app"];
    argv.extend_from_slice(args);
    AppConfig::parse_from(argv)
}

#[test]
fn accepts_valid_defaults() {
    let mut cfg = parse(&[]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.frame_samples(), 512);
    assert_eq!(cfg.log_level, LogLevel::Info);
}

#[test]
fn rejects_sample_rate_out_of_bounds() {
    let mut cfg = parse(&["--sample-rate", "4000"]);
    assert!(cfg.validate().is_err());

    let mut cfg = parse(&["--sample-rate", "192000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn accepts_sample_rate_bounds() {
    let mut cfg = parse(&["--sample-rate", "8000"]);
    assert!(cfg.validate().is_ok());

    let mut cfg = parse(&["--sample-rate", "96000"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_frame_ms_out_of_bounds() {
    let mut cfg = parse(&["--frame-ms", "4"]);
    assert!(cfg.validate().is_err());

    let mut cfg = parse(&["--frame-ms", "101"]);
    let err = cfg.validate().expect_err("frame too long");
    assert!(err.to_string().contains("--frame-ms"));
}

#[test]
fn rejects_zero_failure_threshold() {
    let mut cfg = parse(&["--read-failure-threshold", "0"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_zero_init_attempts() {
    let mut cfg = parse(&["--max-init-attempts", "0"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_tick_interval_out_of_bounds() {
    let mut cfg = parse(&["--tick-ms", "50"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn trims_input_device_name() {
    let mut cfg = parse(&["--input-device", "  USB Mic  "]);
    cfg.validate().expect("valid device");
    assert_eq!(cfg.input_device.as_deref(), Some("USB Mic"));
    assert_eq!(cfg.audio_source_config().device.as_deref(), Some("USB Mic"));
}

#[test]
fn rejects_blank_or_control_device_names() {
    let mut cfg = parse(&["--input-device", "   "]);
    assert!(cfg.validate().is_err());

    let mut cfg = parse(&["--input-device", "mic\u{7}"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn mark_flags_conflict() {
    let result = AppConfig::try_parse_from(["test-app", "--mark-zap", "1", "--mark-not-zap", "2"]);
    assert!(result.is_err());
}

#[test]
fn capture_policy_uses_flags() {
    let cfg = parse(&["--read-timeout-ms", "100", "--read-backoff-ms", "0"]);
    let policy = cfg.capture_policy();
    assert_eq!(policy.read_timeout, std::time::Duration::from_millis(100));
    assert!(policy.read_backoff.is_zero());
}

#[test]
fn missing_settings_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = ZapSettings::load(&dir.path().join("absent.json")).expect("defaults");
    assert_eq!(settings, ZapSettings::default());
}

#[test]
fn partial_settings_file_keeps_other_defaults() {
    let settings = ZapSettings::from_contents(Some(
        r#"{ "cooldown_ms": 2000, "classifier": { "min_dominant_hz": 4500 } }"#,
    ))
    .expect("settings");
    assert_eq!(settings.cooldown_ms, 2_000);
    assert_eq!(settings.classifier.min_dominant_hz, 4_500.0);
    assert_eq!(settings.classifier.max_rise_ms, 10.0);
    assert_eq!(settings.multi_kill_window_ms, 60_000);
    assert_eq!(settings.kill_milestones.len(), 6);
}

#[test]
fn rejects_invalid_settings() {
    assert!(ZapSettings::from_contents(Some("{ not json")).is_err());
    assert!(ZapSettings::from_contents(Some(r#"{ "trigger_threshold": -1 }"#)).is_err());
    assert!(ZapSettings::from_contents(Some(r#"{ "multi_kill_window_ms": 0 }"#)).is_err());
    assert!(ZapSettings::from_contents(Some(
        r#"{ "quiet_hours": [ { "start": "25:00", "end": "08:00" } ] }"#
    ))
    .is_err());
    assert!(ZapSettings::from_contents(Some(
        r#"{ "kill_milestones": [
            { "count": 2, "label": "b", "sound": "b.wav" },
            { "count": 1, "label": "a", "sound": "a.wav" } ] }"#
    ))
    .is_err());
}

#[test]
fn tracker_config_resolves_relative_sounds() {
    let mut settings = ZapSettings::default();
    settings.headshot.sound = PathBuf::from("/abs/headshot.wav");
    let config = settings
        .tracker_config(Path::new("/sounds"))
        .expect("tracker config");

    let (_, first) = config.milestones.kill_milestones().next().expect("first");
    assert_eq!(first.sound, PathBuf::from("/sounds/first_blood.wav"));
    assert_eq!(
        config.milestones.headshot().milestone.sound,
        PathBuf::from("/abs/headshot.wav")
    );
    assert_eq!(config.clock.cooldown, ChronoDuration::seconds(4));
    assert_eq!(config.clock.quiet_hours.windows().len(), 1);
}

#[test]
fn overrides_replace_multi_kill_window() {
    let mut settings = ZapSettings::default();
    SettingsOverrides {
        multi_kill_window_ms: Some(3_000),
    }
    .apply(&mut settings);
    assert_eq!(settings.multi_kill_window_ms, 3_000);
}

fn watcher_fixture(
    path: &Path,
    overrides: SettingsOverrides,
) -> (SettingsWatcher, SettingsHandle, Arc<KillTracker>) {
    let settings = ZapSettings::default();
    let handle = SettingsHandle::new(settings.clone());
    let tracker = Arc::new(KillTracker::new(
        settings
            .tracker_config(Path::new("sounds"))
            .expect("tracker config"),
        Arc::new(LogNotifier),
        None,
        Local::now(),
    ));
    let watcher = SettingsWatcher::new(
        path.to_path_buf(),
        PathBuf::from("sounds"),
        handle.clone(),
        tracker.clone(),
        overrides,
        None,
    );
    (watcher, handle, tracker)
}

#[test]
fn watcher_applies_changed_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("zapstreak.json");
    let (mut watcher, handle, tracker) = watcher_fixture(&path, SettingsOverrides::default());

    assert!(!watcher.poll().expect("no file, no change"));

    fs::write(&path, r#"{ "cooldown_ms": 1000, "trigger_threshold": 0 }"#).expect("write");
    assert!(watcher.poll().expect("reload"));
    assert_eq!(handle.detection().trigger_threshold, 0.0);
    assert_eq!(tracker.clock().cooldown, ChronoDuration::seconds(1));

    assert!(!watcher.poll().expect("unchanged"));
}

#[test]
fn watcher_keeps_previous_settings_on_invalid_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("zapstreak.json");
    let (mut watcher, handle, tracker) = watcher_fixture(&path, SettingsOverrides::default());

    fs::write(&path, r#"{ "cooldown_ms": 1000 }"#).expect("write");
    assert!(watcher.poll().expect("reload"));

    fs::write(&path, r#"{ "cooldown_ms": "soon" }"#).expect("write");
    assert!(watcher.poll().is_err());
    assert!(!watcher.poll().expect("same invalid file is not re-reported"));
    assert_eq!(handle.current().cooldown_ms, 1_000);
    assert_eq!(tracker.clock().cooldown, ChronoDuration::seconds(1));
}

#[test]
fn watcher_reapplies_overrides() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("zapstreak.json");
    let overrides = SettingsOverrides {
        multi_kill_window_ms: Some(3_000),
    };
    let (mut watcher, handle, tracker) = watcher_fixture(&path, overrides);

    fs::write(&path, r#"{ "multi_kill_window_ms": 90000 }"#).expect("write");
    assert!(watcher.poll().expect("reload"));
    assert_eq!(handle.current().multi_kill_window_ms, 3_000);
    assert_eq!(tracker.clock().multi_kill_window, ChronoDuration::seconds(3));
}
