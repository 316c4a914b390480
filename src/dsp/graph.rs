//! Offline render graph — wires a decoded source through the studio effects.
//!
//! The topology is fixed:
//!
//! ```text
//! source (playback rate) -> gain -+-------------------------------+-> stereo merge
//!                                 +-> convolver -> reverb wet ----+
//!                                 +-> delay -> delay wet ---------+
//! ```
//!
//! Inputs with more than two channels are folded to stereo first. Branches
//! are only built when their mix is above zero. Rendering runs the
//! whole buffer to completion in one call.

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::Rng;

use super::buffer::SampleBuffer;
use super::context::RenderContext;
use super::convolver::Convolver;
use super::delay::Delay;
use super::encoder::MAX_DATA_BYTES;
use super::impulse::generate_impulse_response;
use super::resampler::{output_len, resample};
use crate::cancel::CancelToken;
use crate::config::RenderConfig;
use crate::error::{GraphError, RenderError};
use crate::settings::EffectSettings;

pub const MIN_SAMPLE_RATE: u32 = 3000;
pub const MAX_SAMPLE_RATE: u32 = 768_000;
/// The merge stage always produces stereo.
pub const OUTPUT_CHANNELS: usize = 2;
/// Longest delay line; the delay mix maps to at most 100 ms.
const MAX_DELAY_SECONDS: f64 = 1.0;

/// Reverb send: the impulse response and its wet level.
#[derive(Debug, Clone)]
pub struct ReverbBranch {
    pub impulse: SampleBuffer,
    pub wet: f32,
    pub normalize: bool,
}

/// Delay send: line length, wet level and feedback.
#[derive(Debug, Clone, Copy)]
pub struct DelayBranch {
    pub seconds: f64,
    pub wet: f32,
    pub feedback: f64,
}

/// A built graph, owning the source it will render.
#[derive(Debug)]
pub struct RenderGraph {
    source: SampleBuffer,
    playback_rate: f64,
    gain: f32,
    output_frames: usize,
    reverb: Option<ReverbBranch>,
    delay: Option<DelayBranch>,
}

impl RenderGraph {
    /// Build the graph, drawing impulse-response noise from `rng`.
    pub fn build<R: Rng + ?Sized>(
        source: SampleBuffer,
        settings: &EffectSettings,
        config: &RenderConfig,
        rng: &mut R,
    ) -> Result<Self, GraphError> {
        let channels = source.num_channels();
        if channels == 0 {
            return Err(GraphError::UnsupportedChannels(channels));
        }
        let source = downmix_to_stereo(source);
        let sample_rate = source.sample_rate();
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(GraphError::UnsupportedSampleRate(sample_rate));
        }

        let playback_rate = settings.playback_rate();
        let output_frames = output_len(source.len(), playback_rate);
        let limit = max_output_frames(sample_rate, config.max_output_seconds);
        if output_frames > limit {
            return Err(GraphError::TooLong {
                frames: output_frames,
                limit,
            });
        }

        let reverb = settings.has_reverb().then(|| ReverbBranch {
            impulse: generate_impulse_response(
                sample_rate,
                config.impulse_seconds,
                config.impulse_decay,
                config.impulse_reverse,
                rng,
            ),
            wet: settings.reverb_wet() as f32,
            normalize: config.normalize_impulse,
        });
        let delay = settings.has_delay().then(|| DelayBranch {
            seconds: settings.delay_seconds(),
            wet: config.delay_wet_gain as f32,
            feedback: config.delay_feedback,
        });

        debug!(
            "graph: {channels} ch @ {sample_rate} Hz, rate {playback_rate:.4}, gain {:.4}, {} -> {output_frames} frames, reverb {}, delay {}",
            settings.gain(),
            source.len(),
            reverb.as_ref().map_or(0.0, |r| r.wet),
            delay.as_ref().map_or(0.0, |d| d.seconds),
        );

        Ok(RenderGraph {
            source,
            playback_rate,
            gain: settings.gain() as f32,
            output_frames,
            reverb,
            delay,
        })
    }

    /// Build with the randomness `config` asks for: seeded when a seed is
    /// set, fresh entropy otherwise.
    pub fn from_config(
        source: SampleBuffer,
        settings: &EffectSettings,
        config: &RenderConfig,
    ) -> Result<Self, GraphError> {
        match config.seed {
            Some(seed) => Self::build(source, settings, config, &mut StdRng::seed_from_u64(seed)),
            None => Self::build(source, settings, config, &mut rand::thread_rng()),
        }
    }

    pub fn output_frames(&self) -> usize {
        self.output_frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    pub fn reverb(&self) -> Option<&ReverbBranch> {
        self.reverb.as_ref()
    }

    pub fn delay(&self) -> Option<&DelayBranch> {
        self.delay.as_ref()
    }

    /// Render the whole source. Consumes the graph; on error nothing is
    /// returned.
    pub fn render(self, ctx: &RenderContext, cancel: &CancelToken) -> Result<SampleBuffer, RenderError> {
        let sample_rate = self.source.sample_rate();
        let convolver = match &self.reverb {
            Some(branch) => Some((Convolver::new(&branch.impulse, branch.normalize, ctx)?, branch.wet)),
            None => None,
        };

        let dry: Vec<Vec<f32>> = self
            .source
            .channels()
            .map(|ch| resample(ch, self.playback_rate, self.gain))
            .collect();
        cancel.check()?;

        let mut outputs = Vec::with_capacity(OUTPUT_CHANNELS);
        for channel in 0..OUTPUT_CHANNELS {
            // Mono fans out to both sides
            let dry_ch = &dry[channel.min(dry.len() - 1)];
            let mut out = dry_ch.clone();

            if let Some((conv, wet)) = &convolver {
                let kernel = channel % conv.kernel_channels();
                conv.process_into(dry_ch, kernel, *wet, &mut out)?;
                cancel.check()?;
            }

            if let Some(branch) = &self.delay {
                let mut line = Delay::new(
                    sample_rate as f64,
                    MAX_DELAY_SECONDS,
                    branch.seconds,
                    branch.feedback,
                );
                line.process_into(dry_ch, branch.wet, &mut out);
            }

            if let Some(frame) = out.iter().position(|s| !s.is_finite()) {
                return Err(RenderError::NonFinite { channel, frame });
            }
            outputs.push(out);
        }

        debug_assert!(outputs.iter().all(|ch| ch.len() == self.output_frames));
        Ok(SampleBuffer::from_parts(outputs, sample_rate))
    }
}

/// Fold three or more channels into stereo: even-indexed channels average
/// into the left side, odd-indexed into the right. Mono and stereo pass
/// through untouched.
fn downmix_to_stereo(source: SampleBuffer) -> SampleBuffer {
    let channels = source.num_channels();
    if channels <= OUTPUT_CHANNELS {
        return source;
    }
    debug!("downmixing {channels} channels to stereo");

    let sample_rate = source.sample_rate();
    let frames = source.len();
    let mut sides = [vec![0.0_f32; frames], vec![0.0_f32; frames]];
    let mut counts = [0_usize; OUTPUT_CHANNELS];
    for (index, data) in source.into_channels().into_iter().enumerate() {
        let side = index % OUTPUT_CHANNELS;
        counts[side] += 1;
        for (acc, s) in sides[side].iter_mut().zip(data) {
            *acc += s;
        }
    }
    for (side, count) in sides.iter_mut().zip(counts) {
        let scale = 1.0 / count as f32;
        side.iter_mut().for_each(|s| *s *= scale);
    }

    let [left, right] = sides;
    SampleBuffer::from_parts(vec![left, right], sample_rate)
}

fn max_output_frames(sample_rate: u32, max_seconds: f64) -> usize {
    let by_config = (max_seconds * sample_rate as f64) as u64;
    let by_wav = MAX_DATA_BYTES as u64 / (OUTPUT_CHANNELS as u64 * 2);
    by_config.min(by_wav) as usize
}
