//! Delay effect — single-channel delay line with optional feedback.

/// A delay line producing only the wet (delayed) signal.
///
/// The buffer holds up to `max_delay_seconds` of audio at the given sample
/// rate. With zero feedback it is a single tap.
#[derive(Debug, Clone)]
pub struct Delay {
    buffer: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,

    /// Feedback amount (0.0 = single echo, < 1.0 always).
    pub feedback: f32,
}

impl Delay {
    /// Create a delay line of `delay_time` seconds.
    ///
    /// # Arguments
    /// - `sample_rate`: Audio sample rate in Hz.
    /// - `max_delay_seconds`: Maximum supported delay time.
    /// - `delay_time`: Delay in seconds, clamped to the maximum.
    /// - `feedback`: Clamped to [0, 0.99].
    pub fn new(sample_rate: f64, max_delay_seconds: f64, delay_time: f64, feedback: f64) -> Self {
        let buffer_size = (sample_rate * max_delay_seconds) as usize + 1;
        let delay_time = delay_time.clamp(0.0, max_delay_seconds);
        let delay_samples = ((delay_time * sample_rate).round() as usize).min(buffer_size - 1);
        Self {
            buffer: vec![0.0; buffer_size],
            write_pos: 0,
            delay_samples,
            feedback: feedback.clamp(0.0, 0.99) as f32,
        }
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    /// Push one input sample, returning the sample from `delay_samples` ago.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        if self.delay_samples == 0 {
            return input;
        }
        let buffer_len = self.buffer.len();

        // Calculate read position
        let read_pos = if self.write_pos >= self.delay_samples {
            self.write_pos - self.delay_samples
        } else {
            buffer_len - (self.delay_samples - self.write_pos)
        };

        let delayed = self.buffer[read_pos];
        self.buffer[self.write_pos] = input + delayed * self.feedback;
        self.write_pos = (self.write_pos + 1) % buffer_len;

        delayed
    }

    /// Delay a whole signal, scaling the output by `wet` and adding it into
    /// `output`. `output` may be shorter or longer than `input`; missing
    /// input is treated as silence.
    pub fn process_into(&mut self, input: &[f32], wet: f32, output: &mut [f32]) {
        for (i, out) in output.iter_mut().enumerate() {
            let x = input.get(i).copied().unwrap_or(0.0);
            *out += self.process(x) * wet;
        }
    }
}
