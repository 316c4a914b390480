//! Decoded audio held in memory as planar f32 channels.

use crate::error::DecodeError;

/// A multi-channel audio signal. All channels have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create from planar channel data.
    pub fn from_planar(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::ZeroSampleRate);
        }
        let Some(first) = channels.first() else {
            return Err(DecodeError::NoChannels);
        };
        let expected = first.len();
        if let Some((channel, ch)) = channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != expected)
        {
            return Err(DecodeError::RaggedChannels {
                channel,
                len: ch.len(),
                expected,
            });
        }
        Ok(SampleBuffer {
            channels,
            sample_rate,
        })
    }

    /// Build from channels the caller already produced with equal lengths.
    pub(crate) fn from_parts(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(!channels.is_empty() && sample_rate > 0);
        debug_assert!(channels.iter().all(|ch| ch.len() == channels[0].len()));
        SampleBuffer {
            channels,
            sample_rate,
        }
    }

    /// Create from interleaved samples (`LRLR...` for stereo).
    pub fn from_interleaved(
        samples: &[f32],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self, DecodeError> {
        if num_channels == 0 {
            return Err(DecodeError::NoChannels);
        }
        if samples.len() % num_channels != 0 {
            return Err(DecodeError::PartialFrame {
                samples: samples.len(),
                channels: num_channels,
            });
        }
        let frames = samples.len() / num_channels;
        let mut channels: Vec<Vec<f32>> =
            (0..num_channels).map(|_| Vec::with_capacity(frames)).collect();
        for frame in samples.chunks_exact(num_channels) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Self::from_planar(channels, sample_rate)
    }

    /// Create from interleaved 16-bit signed PCM data.
    pub fn from_i16(
        pcm: &[i16],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self, DecodeError> {
        let samples: Vec<f32> = pcm.iter().map(|&s| i16_to_f32(s)).collect();
        Self::from_interleaved(&samples, num_channels, sample_rate)
    }

    /// A buffer of `frames` zeros per channel.
    pub fn silence(num_channels: usize, frames: usize, sample_rate: u32) -> Result<Self, DecodeError> {
        Self::from_planar(vec![vec![0.0; frames]; num_channels], sample_rate)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_seconds(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Iterate frames as interleaved samples.
    pub fn interleaved(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.len()).flat_map(move |i| self.channels.iter().map(move |ch| ch[i]))
    }
}

/// Linear interpolation into a slice; 0 outside it.
pub fn read_interpolated(data: &[f32], position: f64) -> f32 {
    if data.is_empty() || position < 0.0 {
        return 0.0;
    }

    let idx = position as usize;
    if idx >= data.len() - 1 {
        return if idx < data.len() { data[idx] } else { 0.0 };
    }

    let frac = (position - idx as f64) as f32;
    if frac == 0.0 {
        return data[idx];
    }
    data[idx] * (1.0 - frac) + data[idx + 1] * frac
}

/// 16-bit PCM to float. Negative values scale by 32768 and positive by
/// 32767, mirroring the encoder so that 16-bit data survives a round trip.
pub fn i16_to_f32(s: i16) -> f32 {
    if s < 0 {
        s as f32 / 32768.0
    } else {
        s as f32 / 32767.0
    }
}

/// Float to 16-bit PCM, clamped to [-1, 1].
pub fn f32_to_i16(s: f32) -> i16 {
    let s = s.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_splits_into_channels() {
        let buf = SampleBuffer::from_interleaved(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3], 2, 8000).unwrap();
        assert_eq!(buf.num_channels(), 2);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(buf.channel(1), &[-0.1, -0.2, -0.3]);
        let back: Vec<f32> = buf.interleaved().collect();
        assert_eq!(back, vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);
    }

    #[test]
    fn rejects_bad_layouts() {
        assert!(matches!(
            SampleBuffer::from_planar(vec![], 44100),
            Err(DecodeError::NoChannels)
        ));
        assert!(matches!(
            SampleBuffer::from_planar(vec![vec![0.0; 4], vec![0.0; 3]], 44100),
            Err(DecodeError::RaggedChannels { channel: 1, len: 3, expected: 4 })
        ));
        assert!(matches!(
            SampleBuffer::from_interleaved(&[0.0; 5], 2, 44100),
            Err(DecodeError::PartialFrame { .. })
        ));
        assert!(matches!(
            SampleBuffer::from_planar(vec![vec![0.0]], 0),
            Err(DecodeError::ZeroSampleRate)
        ));
    }

    #[test]
    fn interpolates_between_samples() {
        let data = [0.0, 1.0, 0.0];
        assert_eq!(read_interpolated(&data, 0.5), 0.5);
        assert_eq!(read_interpolated(&data, 1.0), 1.0);
        assert_eq!(read_interpolated(&data, 1.25), 0.75);
        // Last index returns the last sample, beyond it silence
        assert_eq!(read_interpolated(&data, 2.0), 0.0);
        assert_eq!(read_interpolated(&data, 3.5), 0.0);
        assert_eq!(read_interpolated(&data, -1.0), 0.0);
    }

    #[test]
    fn pcm_conversion_is_reversible() {
        for s in [i16::MIN, -12345, -1, 0, 1, 12345, i16::MAX] {
            assert_eq!(f32_to_i16(i16_to_f32(s)), s, "sample {s}");
        }
    }

    #[test]
    fn pcm_conversion_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), i16::MIN);
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32768);
    }
}
