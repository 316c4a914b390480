//! Convolver — applies an impulse response to a signal with FFT overlap-add.
//!
//! Kernel spectra are computed once per impulse response; the input is cut
//! into blocks so memory stays proportional to the kernel, not the signal.

use realfft::num_complex::Complex;

use super::buffer::SampleBuffer;
use super::context::{FftPlan, RenderContext};
use crate::error::RenderError;

// Host convolver calibration: kernels are scaled to a fixed power so that
// wet level does not depend on impulse length.
const GAIN_CALIBRATION: f64 = 0.00125; // -58 dB
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;
const MIN_POWER: f64 = 0.000125;

/// Scale applied to an impulse response when normalization is enabled.
pub fn normalization_scale(ir: &SampleBuffer) -> f32 {
    let count = ir.num_channels() * ir.len();
    if count == 0 {
        return 1.0;
    }
    let sum: f64 = ir
        .channels()
        .flat_map(|ch| ch.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    let mut power = (sum / count as f64).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = GAIN_CALIBRATION / power;
    scale *= GAIN_CALIBRATION_SAMPLE_RATE / ir.sample_rate() as f64;
    // True-stereo kernels feed each output twice
    if ir.num_channels() == 4 {
        scale *= 0.5;
    }
    scale as f32
}

pub struct Convolver {
    plan: FftPlan,
    /// One spectrum per impulse-response channel.
    kernels: Vec<Vec<Complex<f32>>>,
    kernel_len: usize,
    block_len: usize,
}

impl Convolver {
    /// Prepare `ir` for convolution, optionally normalizing its power.
    pub fn new(ir: &SampleBuffer, normalize: bool, ctx: &RenderContext) -> Result<Self, RenderError> {
        let kernel_len = ir.len().max(1);
        let fft_size = (2 * kernel_len).next_power_of_two();
        let plan = ctx.plan(fft_size);
        let scale = if normalize { normalization_scale(ir) } else { 1.0 };

        let mut kernels = Vec::with_capacity(ir.num_channels());
        let mut scratch = plan.forward.make_scratch_vec();
        for ch in ir.channels() {
            let mut padded = plan.forward.make_input_vec();
            for (dst, &s) in padded.iter_mut().zip(ch) {
                *dst = s * scale;
            }
            let mut spectrum = plan.forward.make_output_vec();
            plan.forward
                .process_with_scratch(&mut padded, &mut spectrum, &mut scratch)?;
            kernels.push(spectrum);
        }

        Ok(Convolver {
            plan,
            kernels,
            kernel_len,
            block_len: fft_size - kernel_len + 1,
        })
    }

    pub fn kernel_channels(&self) -> usize {
        self.kernels.len()
    }

    pub fn fft_size(&self) -> usize {
        self.plan.len()
    }

    /// Convolve `input` with kernel channel `kernel_channel`, scale by `wet`
    /// and add into `output`. The convolution is truncated to `output`'s
    /// length.
    pub fn process_into(
        &self,
        input: &[f32],
        kernel_channel: usize,
        wet: f32,
        output: &mut [f32],
    ) -> Result<(), RenderError> {
        let kernel = &self.kernels[kernel_channel];
        let fft_size = self.fft_size();
        let norm = wet / fft_size as f32;

        let mut time = self.plan.forward.make_input_vec();
        let mut spectrum = self.plan.forward.make_output_vec();
        let mut fwd_scratch = self.plan.forward.make_scratch_vec();
        let mut inv_scratch = self.plan.inverse.make_scratch_vec();

        let mut start = 0;
        while start < input.len() && start < output.len() {
            let end = (start + self.block_len).min(input.len());

            time.fill(0.0);
            time[..end - start].copy_from_slice(&input[start..end]);
            self.plan
                .forward
                .process_with_scratch(&mut time, &mut spectrum, &mut fwd_scratch)?;

            for (bin, k) in spectrum.iter_mut().zip(kernel) {
                *bin *= *k;
            }
            // Real input: DC and Nyquist bins carry no imaginary part
            spectrum[0].im = 0.0;
            if let Some(last) = spectrum.last_mut() {
                last.im = 0.0;
            }

            self.plan
                .inverse
                .process_with_scratch(&mut spectrum, &mut time, &mut inv_scratch)?;

            // realfft's inverse is unnormalized
            let block_out = (end - start) + self.kernel_len - 1;
            for (j, &s) in time.iter().take(block_out).enumerate() {
                match output.get_mut(start + j) {
                    Some(out) => *out += s * norm,
                    None => break,
                }
            }

            start += self.block_len;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn direct_convolve(signal: &[f32], kernel: &[f32], len: usize) -> Vec<f32> {
        let mut out = vec![0.0; len];
        for (i, &x) in signal.iter().enumerate() {
            for (j, &h) in kernel.iter().enumerate() {
                if i + j < len {
                    out[i + j] += x * h;
                }
            }
        }
        out
    }

    fn mono_kernel(data: Vec<f32>) -> SampleBuffer {
        SampleBuffer::from_planar(vec![data], 44100).unwrap()
    }

    #[test]
    fn unit_impulse_is_identity() {
        let ctx = RenderContext::new();
        let conv = Convolver::new(&mono_kernel(vec![1.0]), false, &ctx).unwrap();
        let input = [0.5, -0.25, 0.75, 0.0, 1.0];
        let mut out = [0.0; 5];
        conv.process_into(&input, 0, 1.0, &mut out).unwrap();
        for (a, b) in out.iter().zip(input) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn shifted_impulse_delays_and_scales() {
        let ctx = RenderContext::new();
        let conv = Convolver::new(&mono_kernel(vec![0.0, 0.0, 1.0]), false, &ctx).unwrap();
        let input = [1.0, 2.0, 3.0, 0.0, 0.0];
        let mut out = [0.0; 5];
        conv.process_into(&input, 0, 0.5, &mut out).unwrap();
        let expected = [0.0, 0.0, 0.5, 1.0, 1.5];
        for (a, b) in out.iter().zip(expected) {
            assert!((a - b).abs() < 1e-5, "got {out:?}");
        }
    }

    #[test]
    fn matches_direct_convolution_across_blocks() {
        let mut rng = StdRng::seed_from_u64(11);
        let kernel: Vec<f32> = (0..37).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let signal: Vec<f32> = (0..500).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let ctx = RenderContext::new();
        let conv = Convolver::new(&mono_kernel(kernel.clone()), false, &ctx).unwrap();
        assert!(conv.fft_size() < signal.len(), "test should span several blocks");

        let mut out = vec![0.0; signal.len()];
        conv.process_into(&signal, 0, 1.0, &mut out).unwrap();
        let expected = direct_convolve(&signal, &kernel, signal.len());
        for (i, (a, b)) in out.iter().zip(&expected).enumerate() {
            assert!((a - b).abs() < 1e-3, "frame {i}: {a} vs {b}");
        }
    }

    #[test]
    fn adds_into_existing_output() {
        let ctx = RenderContext::new();
        let conv = Convolver::new(&mono_kernel(vec![1.0]), false, &ctx).unwrap();
        let mut out = [1.0; 3];
        conv.process_into(&[1.0, 1.0, 1.0], 0, 0.5, &mut out).unwrap();
        for s in out {
            assert!((s - 1.5).abs() < 1e-6);
        }
    }

    #[test]
    fn output_longer_than_input_gets_tail() {
        let ctx = RenderContext::new();
        let conv = Convolver::new(&mono_kernel(vec![1.0, 1.0, 1.0]), false, &ctx).unwrap();
        let mut out = [0.0; 4];
        conv.process_into(&[1.0], 0, 1.0, &mut out).unwrap();
        let expected = [1.0, 1.0, 1.0, 0.0];
        for (a, b) in out.iter().zip(expected) {
            assert!((a - b).abs() < 1e-5, "got {out:?}");
        }
    }

    #[test]
    fn normalization_targets_calibrated_power() {
        // Constant kernel of amplitude 0.5 has power 0.5
        let ir = SampleBuffer::from_planar(vec![vec![0.5; 100], vec![0.5; 100]], 44100).unwrap();
        let scale = normalization_scale(&ir);
        assert!((scale - 0.0025).abs() < 1e-7);

        // Sample-rate compensation
        let ir = SampleBuffer::from_planar(vec![vec![0.5; 100]], 22050).unwrap();
        assert!((normalization_scale(&ir) - 0.005).abs() < 1e-7);

        // Silent kernels clamp to the minimum power
        let ir = SampleBuffer::from_planar(vec![vec![0.0; 100]], 44100).unwrap();
        assert!((normalization_scale(&ir) - 10.0).abs() < 1e-4);
    }
}
