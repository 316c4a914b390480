//! WAV encoder — serializes a rendered buffer to 16-bit PCM RIFF/WAVE bytes.

use super::buffer::{SampleBuffer, f32_to_i16};
use crate::error::RenderError;

pub const WAV_HEADER_LEN: usize = 44;
/// Largest PCM payload a RIFF header can describe.
pub const MAX_DATA_BYTES: usize = u32::MAX as usize - 36;

/// An encoded, playable WAV file plus the shape it was encoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudioAsset {
    bytes: Vec<u8>,
    channels: u16,
    sample_rate: u32,
    frames: usize,
}

impl EncodedAudioAsset {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total size including the header.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Size of the PCM payload after the header.
    pub fn data_len(&self) -> usize {
        self.bytes.len() - WAV_HEADER_LEN
    }

    /// The PCM payload after the header.
    pub fn pcm(&self) -> &[u8] {
        &self.bytes[WAV_HEADER_LEN..]
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Encode a buffer as 16-bit PCM WAV with interleaved samples.
///
/// Samples are clamped to [-1, 1]; negative values scale by 32768 and
/// positive by 32767. An empty buffer gives a header-only file. Buffers
/// whose payload a RIFF header cannot describe are rejected.
pub fn encode_wav(buffer: &SampleBuffer) -> Result<EncodedAudioAsset, RenderError> {
    let frames = buffer.len();
    let data_size = data_size(frames, buffer.num_channels())?;
    // data_size succeeding bounds the channel count
    let channels = buffer.num_channels() as u16;
    let sample_rate = buffer.sample_rate();

    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate
        .wrapping_mul(channels as u32)
        .wrapping_mul(bits_per_sample as u32 / 8);
    let block_align = channels.wrapping_mul(bits_per_sample / 8);
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for sample in buffer.interleaved() {
        buf.extend_from_slice(&f32_to_i16(sample).to_le_bytes());
    }

    Ok(EncodedAudioAsset {
        bytes: buf,
        channels,
        sample_rate,
        frames,
    })
}

/// Size of the 16-bit PCM payload, if it fits in a data chunk.
fn data_size(frames: usize, channels: usize) -> Result<u32, RenderError> {
    u16::try_from(channels)
        .ok()
        .and_then(|ch| frames.checked_mul(ch as usize * 2))
        .filter(|&bytes| bytes <= MAX_DATA_BYTES)
        .map(|bytes| bytes as u32)
        .ok_or(RenderError::OutputTooLarge { frames, channels })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(wav: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([wav[offset], wav[offset + 1], wav[offset + 2], wav[offset + 3]])
    }

    fn u16_at(wav: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([wav[offset], wav[offset + 1]])
    }

    #[test]
    fn wav_header_valid() {
        let buf = SampleBuffer::silence(2, 100, 48000).unwrap();
        let asset = encode_wav(&buf).unwrap();
        let wav = asset.as_bytes();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        assert_eq!(u32_at(wav, 16), 16);
        assert_eq!(u16_at(wav, 20), 1);
        assert_eq!(u16_at(wav, 22), 2);
        assert_eq!(u32_at(wav, 24), 48000);
        assert_eq!(u32_at(wav, 28), 48000 * 2 * 2);
        assert_eq!(u16_at(wav, 32), 4);
        assert_eq!(u16_at(wav, 34), 16);
    }

    #[test]
    fn wav_sizes_match_payload() {
        let buf = SampleBuffer::silence(1, 1234, 22050).unwrap();
        let asset = encode_wav(&buf).unwrap();
        let wav = asset.as_bytes();

        let data_bytes = 1234 * 2;
        assert_eq!(u32_at(wav, 40) as usize, data_bytes);
        assert_eq!(u32_at(wav, 4) as usize, 36 + data_bytes);
        assert_eq!(wav.len(), WAV_HEADER_LEN + data_bytes);
        assert_eq!(asset.data_len(), data_bytes);
        assert_eq!(asset.frames(), 1234);
        assert_eq!(asset.channels(), 1);
    }

    #[test]
    fn one_second_stereo_silence_size() {
        let buf = SampleBuffer::silence(2, 44100, 44100).unwrap();
        let asset = encode_wav(&buf).unwrap();
        assert_eq!(asset.len(), 176_444);
        assert!(asset.pcm().iter().all(|&b| b == 0));
        assert!((asset.duration_seconds() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_buffer_is_header_only() {
        let buf = SampleBuffer::silence(2, 0, 44100).unwrap();
        let asset = encode_wav(&buf).unwrap();
        assert_eq!(asset.len(), WAV_HEADER_LEN);
        assert_eq!(u32_at(asset.as_bytes(), 4), 36);
        assert_eq!(u32_at(asset.as_bytes(), 40), 0);
    }

    #[test]
    fn samples_are_interleaved_and_scaled() {
        let buf = SampleBuffer::from_planar(vec![vec![1.0, -1.0], vec![0.5, 2.0]], 8000).unwrap();
        let asset = encode_wav(&buf).unwrap();
        let pcm: Vec<i16> = asset
            .pcm()
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(pcm, vec![32767, 16384, -32768, 32767]);
    }

    #[test]
    fn payload_must_fit_riff_sizes() {
        let max_frames = MAX_DATA_BYTES / 4;
        assert_eq!(data_size(max_frames, 2).unwrap() as usize, max_frames * 4);
        assert!(matches!(
            data_size(max_frames + 1, 2),
            Err(RenderError::OutputTooLarge { channels: 2, .. })
        ));
        assert!(data_size(usize::MAX / 2, 2).is_err());
        assert!(data_size(1, 70_000).is_err());
    }
}
