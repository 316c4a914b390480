//! Playback-rate resampling via linear interpolation.
//!
//! Reading the source faster or slower shifts its pitch and its tempo
//! together, like a buffer source with a playback rate.

use super::buffer::read_interpolated;

/// Number of output frames when `input_frames` are played at `rate`.
pub fn output_len(input_frames: usize, rate: f64) -> usize {
    (input_frames as f64 / rate).round() as usize
}

/// Play `input` at `rate` (1.0 = original speed) and scale by `gain`.
pub fn resample(input: &[f32], rate: f64, gain: f32) -> Vec<f32> {
    let len = output_len(input.len(), rate);
    let mut output = Vec::with_capacity(len);
    for i in 0..len {
        let position = i as f64 * rate;
        output.push(read_interpolated(input, position) * gain);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_rate_is_exact_copy() {
        let input: Vec<f32> = (0..100).map(|i| ((i as f32) * 0.37).sin()).collect();
        let out = resample(&input, 1.0, 1.0);
        assert_eq!(out, input);
    }

    #[test]
    fn gain_scales_samples() {
        let input = [0.5, -0.25, 0.125];
        let out = resample(&input, 1.0, 2.0);
        assert_eq!(out, vec![1.0, -0.5, 0.25]);
    }

    #[test]
    fn double_rate_halves_length() {
        let input: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        let out = resample(&input, 2.0, 1.0);
        assert_eq!(out.len(), 500);
        // Every other source sample
        assert_eq!(out[10], input[20]);
    }

    #[test]
    fn half_rate_doubles_length_and_interpolates() {
        let input = [0.0, 1.0, 0.0, -1.0];
        let out = resample(&input, 0.5, 1.0);
        assert_eq!(out.len(), 8);
        assert_eq!(&out[..6], &[0.0, 0.5, 1.0, 0.5, 0.0, -0.5]);
        assert_eq!(out[6], -1.0);
        // Past the last source frame
        assert_eq!(out[7], -1.0);
    }

    #[test]
    fn length_rounds() {
        assert_eq!(output_len(44100, 2.0_f64.powf(1.0 / 12.0)), 41625);
        assert_eq!(output_len(3, 2.0), 2);
        assert_eq!(output_len(0, 0.5), 0);
    }
}
