/// Full-scale value for 16-bit PCM; volume thresholds are expressed in these units.
const I16_FULL_SCALE: f32 = 32_768.0;
const VOLUME_FLOOR: f32 = 1e-5;

/// RMS level of a normalized frame in 16-bit PCM units, the scale the logging and
/// trigger thresholds are configured in.
pub fn rms_volume(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_square: f32 = samples
        .iter()
        .map(|s| {
            let scaled = s * I16_FULL_SCALE;
            scaled * scaled
        })
        .sum::<f32>()
        / samples.len() as f32;
    mean_square.max(VOLUME_FLOOR * VOLUME_FLOOR).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_volume_handles_empty() {
        assert_eq!(rms_volume(&[]), 0.0);
    }

    #[test]
    fn rms_volume_uses_pcm_scale() {
        let volume = rms_volume(&[0.5, -0.5, 0.5, -0.5]);
        assert!((volume - 16_384.0).abs() < 1e-2);
    }

    #[test]
    fn rms_volume_never_returns_zero_for_silence() {
        assert!(rms_volume(&[0.0; 32]) > 0.0);
    }
}
