use super::defaults::{MAX_INPUT_DEVICE_LEN, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
use super::{AppConfig, CapturePolicy};
use crate::audio::AudioSourceConfig;
use anyhow::{bail, Result};
use clap::Parser;
use std::time::Duration;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize strings.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            bail!(
                "--sample-rate must be between {MIN_SAMPLE_RATE} and {MAX_SAMPLE_RATE} Hz, got {}",
                self.sample_rate
            );
        }
        // Frames longer than 100 ms can never classify as a zap.
        if !(5..=100).contains(&self.frame_ms) {
            bail!("--frame-ms must be between 5 and 100, got {}", self.frame_ms);
        }
        if !(8..=1024).contains(&self.channel_capacity) {
            bail!(
                "--channel-capacity must be between 8 and 1024, got {}",
                self.channel_capacity
            );
        }
        if !(10..=5_000).contains(&self.read_timeout_ms) {
            bail!(
                "--read-timeout-ms must be between 10 and 5000, got {}",
                self.read_timeout_ms
            );
        }
        if self.read_backoff_ms > 10_000 {
            bail!(
                "--read-backoff-ms must be at most 10000, got {}",
                self.read_backoff_ms
            );
        }
        if !(1..=1_000).contains(&self.read_failure_threshold) {
            bail!(
                "--read-failure-threshold must be between 1 and 1000, got {}",
                self.read_failure_threshold
            );
        }
        if !(1..=100).contains(&self.max_init_attempts) {
            bail!(
                "--max-init-attempts must be between 1 and 100, got {}",
                self.max_init_attempts
            );
        }
        if !(100..=60_000).contains(&self.tick_ms) {
            bail!("--tick-ms must be between 100 and 60000, got {}", self.tick_ms);
        }
        if !(1..=86_400).contains(&self.settings_poll_secs) {
            bail!(
                "--settings-poll-secs must be between 1 and 86400, got {}",
                self.settings_poll_secs
            );
        }

        if let Some(device) = &mut self.input_device {
            let trimmed = device.trim();
            if trimmed.is_empty() {
                bail!("--input-device must not be empty");
            }
            if trimmed.len() > MAX_INPUT_DEVICE_LEN || trimmed.chars().any(char::is_control) {
                bail!(
                    "--input-device must be <={MAX_INPUT_DEVICE_LEN} characters with no control characters"
                );
            }
            *device = trimmed.to_string();
        }

        Ok(())
    }

    /// Samples per analysis frame at the configured rate.
    pub fn frame_samples(&self) -> usize {
        ((u64::from(self.sample_rate) * self.frame_ms) / 1000).max(1) as usize
    }

    pub fn audio_source_config(&self) -> AudioSourceConfig {
        AudioSourceConfig {
            device: self.input_device.clone(),
            channels: 1,
            sample_rate: self.sample_rate,
            frame_samples: self.frame_samples(),
            channel_capacity: self.channel_capacity,
        }
    }

    pub fn capture_policy(&self) -> CapturePolicy {
        CapturePolicy {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            read_backoff: Duration::from_millis(self.read_backoff_ms),
            read_failure_threshold: self.read_failure_threshold,
            max_init_attempts: self.max_init_attempts,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn settings_poll_interval(&self) -> Duration {
        Duration::from_secs(self.settings_poll_secs)
    }
}
