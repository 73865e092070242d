use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

const LOW_BAND_HZ: (f32, f32) = (100.0, 1_000.0);
const MID_BAND_HZ: (f32, f32) = (1_000.0, 5_000.0);
const HIGH_BAND_FLOOR_HZ: f32 = 5_000.0;

/// Power per strictly-positive frequency bin of a real frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PowerSpectrum {
    pub frequencies: Vec<f32>,
    pub power: Vec<f64>,
}

/// Summed power in the three classification bands. Band edges are exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandEnergy {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

impl BandEnergy {
    pub fn total(&self) -> f64 {
        self.low + self.mid + self.high
    }

    /// High-band share of the total; zero when there is no energy at all.
    pub fn high_ratio(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        self.high / total
    }
}

impl PowerSpectrum {
    /// Forward FFT of `samples`. Bin `k` sits at `k * sample_rate / N`; only bins
    /// `1..=(N-1)/2` have a positive frequency, the rest mirror them.
    pub fn compute(samples: &[f32], sample_rate: u32) -> Self {
        let n = samples.len();
        if n < 3 || sample_rate == 0 {
            return Self::default();
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let mut buffer: Vec<Complex<f32>> = samples
            .iter()
            .map(|&sample| Complex::new(sample, 0.0))
            .collect();
        fft.process(&mut buffer);

        let bin_hz = sample_rate as f32 / n as f32;
        let positive_bins = 1..=(n - 1) / 2;
        let mut frequencies = Vec::with_capacity(n / 2);
        let mut power = Vec::with_capacity(n / 2);
        for k in positive_bins {
            frequencies.push(k as f32 * bin_hz);
            power.push(f64::from(buffer[k].norm_sqr()));
        }
        Self { frequencies, power }
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }

    /// Frequency of the first bin holding the maximum power.
    pub fn dominant_frequency(&self) -> Option<f32> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, &value) in self.power.iter().enumerate() {
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((idx, value)),
            }
        }
        best.map(|(idx, _)| self.frequencies[idx])
    }

    fn energy_between(&self, low_hz: f32, high_hz: Option<f32>) -> f64 {
        self.frequencies
            .iter()
            .zip(&self.power)
            .filter(|(&freq, _)| freq > low_hz && high_hz.map_or(true, |high| freq < high))
            .map(|(_, &power)| power)
            .sum()
    }

    pub fn bands(&self) -> BandEnergy {
        BandEnergy {
            low: self.energy_between(LOW_BAND_HZ.0, Some(LOW_BAND_HZ.1)),
            mid: self.energy_between(MID_BAND_HZ.0, Some(MID_BAND_HZ.1)),
            high: self.energy_between(HIGH_BAND_FLOOR_HZ, None),
        }
    }
}
