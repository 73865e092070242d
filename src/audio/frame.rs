use chrono::{DateTime, Local};

/// One block of mono samples as delivered by the capture source.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Normalized samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub captured_at: DateTime<Local>,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32, captured_at: DateTime<Local>) -> Self {
        Self {
            samples,
            sample_rate,
            captured_at,
        }
    }

    /// Build a frame from signed 16-bit PCM.
    pub fn from_i16(samples: &[i16], sample_rate: u32, captured_at: DateTime<Local>) -> Self {
        let samples = samples
            .iter()
            .map(|&sample| sample as f32 / 32_768.0)
            .collect();
        Self::new(samples, sample_rate, captured_at)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame length in seconds; zero when the sample rate is unknown.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}
