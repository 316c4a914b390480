//! DSP — offline voice-effects rendering.
//!
//! Decoding, the per-render effects graph (resample, gain, convolution
//! reverb, delay) and WAV encoding. Everything here is synchronous and
//! runs the same natively and under WASM.

pub mod buffer;
pub mod context;
pub mod convolver;
pub mod decoder;
pub mod delay;
pub mod encoder;
pub mod graph;
pub mod impulse;
pub mod resampler;
