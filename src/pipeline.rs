//! The capture loop: read frames, gate on volume, classify, and score zaps.

use crate::audio::{mic_permission_hint, rms_volume, AudioBackend, AudioSource, AudioSourceConfig};
use crate::config::{CapturePolicy, DetectionSettings, SettingsHandle};
use crate::detect::{DetectionFeatures, SignalClassifier};
use crate::shutdown::Shutdown;
use crate::store::EventStore;
use crate::streak::{DetectionOutcome, KillTracker};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    pub classified: u64,
    pub zaps: u64,
    pub kills: u64,
    pub read_failures: u64,
    /// Reads that timed out without a frame.
    pub stalled_reads: u64,
    pub reinitializations: u32,
}

enum ReadStep {
    Frame,
    Stalled,
    Failed,
}

pub struct CaptureLoop {
    backend: Box<dyn AudioBackend>,
    source_config: AudioSourceConfig,
    policy: CapturePolicy,
    settings: SettingsHandle,
    tracker: Arc<KillTracker>,
    store: Option<Arc<dyn EventStore>>,
    shutdown: Shutdown,
    stats: CaptureStats,
}

impl CaptureLoop {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        source_config: AudioSourceConfig,
        policy: CapturePolicy,
        settings: SettingsHandle,
        tracker: Arc<KillTracker>,
        store: Option<Arc<dyn EventStore>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            backend,
            source_config,
            policy,
            settings,
            tracker,
            store,
            shutdown,
            stats: CaptureStats::default(),
        }
    }

    /// Run on a dedicated thread; audio sources are opened there since they may be `!Send`.
    pub fn spawn(self) -> io::Result<JoinHandle<Result<CaptureStats>>> {
        thread::Builder::new()
            .name("capture-loop".into())
            .spawn(move || self.run())
    }

    /// Loop until shutdown. Only an audio device that cannot be opened is fatal.
    pub fn run(mut self) -> Result<CaptureStats> {
        let Some(mut source) = self.open_source()? else {
            return Ok(self.stats);
        };
        info!(source = %source.name(), "Audio stream started successfully.");

        let threshold = self.policy.read_failure_threshold;
        let mut consecutive_failures = 0u32;
        let mut consecutive_stalls = 0u32;
        while !self.shutdown.is_triggered() {
            match self.read_step(source.as_mut()) {
                ReadStep::Frame => {
                    consecutive_failures = 0;
                    consecutive_stalls = 0;
                }
                // A live stream delivers a frame every few tens of milliseconds, even in silence.
                ReadStep::Stalled => {
                    consecutive_stalls += 1;
                    self.stats.stalled_reads += 1;
                    if consecutive_stalls >= threshold && !self.shutdown.is_triggered() {
                        warn!(
                            consecutive_stalls,
                            "Audio stream stalled. Re-initializing audio source."
                        );
                        source = match self.reopen_source(source)? {
                            Some(source) => source,
                            None => break,
                        };
                        consecutive_failures = 0;
                        consecutive_stalls = 0;
                    }
                }
                ReadStep::Failed => {
                    consecutive_failures += 1;
                    self.stats.read_failures += 1;
                    if consecutive_failures >= threshold {
                        warn!(
                            consecutive_failures,
                            "Error threshold reached. Re-initializing audio source."
                        );
                        source = match self.reopen_source(source)? {
                            Some(source) => source,
                            None => break,
                        };
                        consecutive_failures = 0;
                        consecutive_stalls = 0;
                    } else if self.shutdown.wait_timeout(self.policy.read_backoff) {
                        break;
                    }
                }
            }
        }

        info!(
            frames = self.stats.frames,
            zaps = self.stats.zaps,
            kills = self.stats.kills,
            "capture loop stopped"
        );
        Ok(self.stats)
    }

    fn read_step(&mut self, source: &mut dyn AudioSource) -> ReadStep {
        match source.read_frame(self.policy.read_timeout) {
            Ok(Some(frame)) if frame.is_empty() => {
                warn!("Received empty audio frame");
                ReadStep::Failed
            }
            Ok(Some(frame)) => {
                self.stats.frames += 1;
                self.process_samples(&frame.samples, frame.sample_rate, frame.captured_at);
                ReadStep::Frame
            }
            Ok(None) => {
                debug!(timeout = ?self.policy.read_timeout, "no audio frame within read timeout");
                ReadStep::Stalled
            }
            Err(err) => {
                warn!("Error reading audio: {err}");
                ReadStep::Failed
            }
        }
    }

    fn reopen_source(
        &mut self,
        source: Box<dyn AudioSource>,
    ) -> Result<Option<Box<dyn AudioSource>>> {
        drop(source);
        let reopened = self.open_source()?;
        if let Some(source) = &reopened {
            self.stats.reinitializations += 1;
            info!(source = %source.name(), "audio source re-initialized");
        }
        Ok(reopened)
    }

    /// `Ok(None)` means shutdown arrived while waiting between attempts.
    fn open_source(&mut self) -> Result<Option<Box<dyn AudioSource>>> {
        let attempts = self.policy.max_init_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            if self.shutdown.is_triggered() {
                return Ok(None);
            }
            match self.backend.open(&self.source_config) {
                Ok(source) => return Ok(Some(source)),
                Err(err) => {
                    error!(attempt, attempts, "Failed to start audio stream: {err:#}");
                    last_error = Some(err);
                }
            }
            let backoff = self.policy.read_backoff * attempt;
            if attempt < attempts && self.shutdown.wait_timeout(backoff) {
                return Ok(None);
            }
        }
        let reason = last_error
            .map(|err| format!("{err:#}"))
            .unwrap_or_else(|| "unknown error".to_string());
        Err(anyhow!(
            "failed to open audio input after {attempts} attempts: {reason}. {}",
            mic_permission_hint()
        ))
    }

    /// Gate, classify and score one frame of samples.
    pub fn process_samples(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        captured_at: DateTime<Local>,
    ) -> Option<DetectionOutcome> {
        let detection = self.settings.detection();
        let volume = rms_volume(samples);
        let loud = volume > detection.logging_threshold;
        if loud {
            debug!(volume = format_args!("{volume:.0}"), "volume");
        }
        if !passes_trigger(&detection, volume) {
            return None;
        }

        self.stats.classified += 1;
        let features =
            SignalClassifier::new(detection.classifier).classify_samples(samples, sample_rate);
        if features.is_zap || loud {
            self.record_event(&features, captured_at);
        }
        if !features.is_zap {
            if let Some(reason) = features.rejected_by {
                debug!(reason = reason.label(), "not a zap");
            }
            return None;
        }

        self.stats.zaps += 1;
        info!("Zap detected!");
        let outcome = self.tracker.register_detection(captured_at);
        if outcome.is_kill() {
            self.stats.kills += 1;
        }
        Some(outcome)
    }

    fn record_event(&self, features: &DetectionFeatures, at: DateTime<Local>) {
        let Some(store) = &self.store else {
            return;
        };
        match store.record_event(features, at) {
            Ok(id) => debug!(id, is_zap = features.is_zap, "audio event recorded"),
            Err(err) => warn!("failed to record audio event: {err}"),
        }
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }
}

/// A trigger threshold of 0 disables the gate.
fn passes_trigger(detection: &DetectionSettings, volume: f32) -> bool {
    detection.trigger_threshold <= 0.0 || volume >= detection.trigger_threshold
}
