//! Decoder — turns uploaded or recorded bytes into a `SampleBuffer`.
//!
//! The container is sniffed from its magic bytes. WAV is always available;
//! MP3 requires the `mp3` feature.

use std::io::Cursor;

use log::debug;

use super::buffer::SampleBuffer;
use crate::error::DecodeError;

/// Audio containers recognised by `sniff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Wav,
    Mp3,
}

/// Identify the container from the leading bytes.
pub fn sniff(bytes: &[u8]) -> Option<Container> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return Some(Container::Wav);
    }
    if bytes.len() >= 3 && &bytes[0..3] == b"ID3" {
        return Some(Container::Mp3);
    }
    // MPEG audio frame sync: 11 set bits
    if bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
        return Some(Container::Mp3);
    }
    None
}

/// Decode a complete audio file held in memory.
pub fn decode(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let buffer = match sniff(bytes) {
        Some(Container::Wav) => decode_wav(bytes)?,
        Some(Container::Mp3) => decode_mp3(bytes)?,
        None => return Err(DecodeError::UnsupportedFormat),
    };
    debug!(
        "decoded {} bytes: {} ch, {} Hz, {} frames",
        bytes.len(),
        buffer.num_channels(),
        buffer.sample_rate(),
        buffer.len()
    );
    Ok(buffer)
}

/// Decode RIFF/WAVE integer or float PCM.
pub fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(DecodeError::NoChannels);
    }

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(super::buffer::i16_to_f32))
            .collect::<Result<_, _>>()?,
        (hound::SampleFormat::Int, bits @ (8 | 24 | 32)) => {
            let negative_scale = (1_i64 << (bits - 1)) as f64;
            let positive_scale = negative_scale - 1.0;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|v| {
                        let v = v as f64;
                        (if v < 0.0 { v / negative_scale } else { v / positive_scale }) as f32
                    })
                })
                .collect::<Result<_, _>>()?
        }
        (hound::SampleFormat::Float, bits) => {
            return Err(DecodeError::UnsupportedSampleFormat { bits, kind: "float" });
        }
        (hound::SampleFormat::Int, bits) => {
            return Err(DecodeError::UnsupportedSampleFormat { bits, kind: "integer" });
        }
    };

    SampleBuffer::from_interleaved(&samples, spec.channels as usize, spec.sample_rate)
}

#[cfg(feature = "mp3")]
fn decode_mp3(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut pcm: Vec<i16> = Vec::new();
    let mut layout: Option<(usize, u32)> = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let frame_layout = (frame.channels, frame.sample_rate as u32);
                match layout {
                    None => layout = Some(frame_layout),
                    // Mid-stream format changes are not representable in one buffer
                    Some(l) if l != frame_layout => {
                        return Err(DecodeError::Mp3(format!(
                            "format changed mid-stream from {l:?} to {frame_layout:?}"
                        )));
                    }
                    Some(_) => {}
                }
                pcm.extend_from_slice(&frame.data);
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(DecodeError::Mp3(e.to_string())),
        }
    }

    let (channels, sample_rate) = layout.ok_or_else(|| DecodeError::Mp3("no audio frames".to_string()))?;
    SampleBuffer::from_i16(&pcm, channels, sample_rate)
}

#[cfg(not(feature = "mp3"))]
fn decode_mp3(_bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    Err(DecodeError::UnsupportedFormat)
}
