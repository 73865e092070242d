/// Linear interpolation resampler; good enough for short notification clips.
pub(crate) fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == 0 || to_rate == 0 || from_rate == to_rate {
        return input.to_vec();
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let output_len = (input.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        match (input.get(idx), input.get(idx + 1)) {
            (Some(&a), Some(&b)) => output.push(a * (1.0 - frac) + b * frac),
            _ => output.push(input.last().copied().unwrap_or(0.0)),
        }
    }

    output
}
