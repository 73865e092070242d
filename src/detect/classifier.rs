use super::peaks::find_peaks;
use super::spectrum::PowerSpectrum;
use crate::audio::AudioFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Thresholds for the zap decision chain. Defaults match field observations of
/// electric bug zappers and can be tuned from the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Frames longer than this are never zaps (seconds).
    pub max_duration_secs: f64,
    /// Minimum dominant frequency (Hz).
    pub min_dominant_hz: f32,
    /// Minimum share of band energy above 5 kHz.
    pub min_high_energy_ratio: f64,
    /// Peak height as a fraction of the envelope maximum.
    pub peak_height_ratio: f32,
    pub max_rise_ms: f64,
    pub max_decay_ms: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 0.1,
            min_dominant_hz: 5_000.0,
            min_high_energy_ratio: 0.5,
            peak_height_ratio: 0.8,
            max_rise_ms: 10.0,
            max_decay_ms: 50.0,
        }
    }
}

/// Why a frame was not classified as a zap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Empty,
    TooLong,
    LowFrequency,
    NoEnergy,
    LowHighEnergyRatio,
    PeakCount,
    SlowRise,
    SlowDecay,
}

impl RejectReason {
    pub fn label(self) -> &'static str {
        match self {
            RejectReason::Empty => "empty",
            RejectReason::TooLong => "too_long",
            RejectReason::LowFrequency => "low_frequency",
            RejectReason::NoEnergy => "no_energy",
            RejectReason::LowHighEnergyRatio => "low_high_energy_ratio",
            RejectReason::PeakCount => "peak_count",
            RejectReason::SlowRise => "slow_rise",
            RejectReason::SlowDecay => "slow_decay",
        }
    }
}

/// Everything the classifier learned about a frame, including partial results for
/// rejected frames so they can be logged and stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFeatures {
    pub duration_secs: f64,
    pub dominant_frequency: f32,
    pub low_energy: f64,
    pub mid_energy: f64,
    pub high_energy: f64,
    pub high_energy_ratio: f64,
    pub peak_amplitude: f32,
    pub peak_count: usize,
    pub rise_ms: Option<f64>,
    pub decay_ms: Option<f64>,
    pub is_zap: bool,
    pub rejected_by: Option<RejectReason>,
}

impl DetectionFeatures {
    fn empty(duration_secs: f64, peak_amplitude: f32) -> Self {
        Self {
            duration_secs,
            dominant_frequency: 0.0,
            low_energy: 0.0,
            mid_energy: 0.0,
            high_energy: 0.0,
            high_energy_ratio: 0.0,
            peak_amplitude,
            peak_count: 0,
            rise_ms: None,
            decay_ms: None,
            is_zap: false,
            rejected_by: None,
        }
    }

    fn reject(mut self, reason: RejectReason) -> Self {
        self.is_zap = false;
        self.rejected_by = Some(reason);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignalClassifier {
    config: ClassifierConfig,
}

impl SignalClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn classify(&self, frame: &AudioFrame) -> DetectionFeatures {
        self.classify_samples(&frame.samples, frame.sample_rate)
    }

    /// Run the decision chain; the first failing check decides the reject reason.
    pub fn classify_samples(&self, samples: &[f32], sample_rate: u32) -> DetectionFeatures {
        let cfg = &self.config;
        let envelope: Vec<f32> = samples.iter().map(|sample| sample.abs()).collect();
        let peak_amplitude = envelope.iter().copied().fold(0.0f32, f32::max);

        if samples.is_empty() || sample_rate == 0 {
            return DetectionFeatures::empty(0.0, peak_amplitude).reject(RejectReason::Empty);
        }
        let rate = f64::from(sample_rate);
        let n = samples.len();
        let duration_secs = n as f64 / rate;
        let mut features = DetectionFeatures::empty(duration_secs, peak_amplitude);

        if duration_secs > cfg.max_duration_secs {
            return features.reject(RejectReason::TooLong);
        }

        let spectrum = PowerSpectrum::compute(samples, sample_rate);
        let Some(dominant) = spectrum.dominant_frequency() else {
            return features.reject(RejectReason::Empty);
        };
        let bands = spectrum.bands();
        features.dominant_frequency = dominant;
        features.low_energy = bands.low;
        features.mid_energy = bands.mid;
        features.high_energy = bands.high;
        features.high_energy_ratio = bands.high_ratio();

        if dominant < cfg.min_dominant_hz {
            return features.reject(RejectReason::LowFrequency);
        }
        if bands.total() == 0.0 {
            return features.reject(RejectReason::NoEnergy);
        }
        if features.high_energy_ratio < cfg.min_high_energy_ratio {
            return features.reject(RejectReason::LowHighEnergyRatio);
        }

        let peaks = find_peaks(
            &envelope,
            Some(peak_amplitude * cfg.peak_height_ratio),
            Some(n / 2),
        );
        features.peak_count = peaks.len();
        let &[peak_index] = peaks.as_slice() else {
            return features.reject(RejectReason::PeakCount);
        };

        let rise_secs = peak_index as f64 / rate;
        let decay_secs = (n - peak_index) as f64 / rate;
        features.rise_ms = Some(rise_secs * 1_000.0);
        features.decay_ms = Some(decay_secs * 1_000.0);
        if rise_secs > cfg.max_rise_ms / 1_000.0 {
            return features.reject(RejectReason::SlowRise);
        }
        if decay_secs > cfg.max_decay_ms / 1_000.0 {
            return features.reject(RejectReason::SlowDecay);
        }

        features.is_zap = true;
        debug!(
            duration_s = format_args!("{:.3}", features.duration_secs),
            dominant_hz = format_args!("{:.2}", features.dominant_frequency),
            high_energy_ratio = format_args!("{:.2}", features.high_energy_ratio),
            "potential zap detected"
        );
        features
    }
}
