//! Synthetic room impulse response — decaying stereo noise used as the
//! reverb convolution kernel.

use rand::Rng;

use super::buffer::SampleBuffer;

/// Generate a two-channel impulse response of `duration_secs` at
/// `sample_rate`.
///
/// Sample `i` of each channel is uniform noise in [-1, 1] scaled by
/// `(1 - n/length)^decay`, where `n = i`, or `n = length - i` when `reverse`
/// is set (a rising envelope). Every sample is drawn independently.
pub fn generate_impulse_response<R: Rng + ?Sized>(
    sample_rate: u32,
    duration_secs: f64,
    decay: f64,
    reverse: bool,
    rng: &mut R,
) -> SampleBuffer {
    let length = ((sample_rate as f64 * duration_secs) as usize).max(1);
    let mut left = Vec::with_capacity(length);
    let mut right = Vec::with_capacity(length);

    for i in 0..length {
        let n = if reverse { length - i } else { i };
        let envelope = (1.0 - n as f64 / length as f64).powf(decay) as f32;
        left.push(rng.gen_range(-1.0_f32..=1.0) * envelope);
        right.push(rng.gen_range(-1.0_f32..=1.0) * envelope);
    }

    SampleBuffer::from_parts(vec![left, right], sample_rate)
}
