//! The negotiated PCM format.

use std::fmt;
use std::time::Duration;

use crate::SourceError;

/// How individual samples are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleEncoding {
    /// Integer PCM. 8-bit samples are unsigned, wider samples signed little-endian.
    #[default]
    Int,
    /// IEEE float PCM.
    Float,
}

/// Describes interleaved PCM audio: rate, channel count and sample width.
///
/// Block alignment (bytes per frame) and average byte rate are derived, so
/// they can never disagree with the base fields. A descriptor is fixed for
/// the lifetime of a [`RenderSession`](crate::RenderSession).
///
/// # Example
///
/// ```
/// use stream_playback::AudioFormat;
///
/// let cd = AudioFormat::pcm(44100, 2, 16).unwrap();
/// assert_eq!(cd.block_align(), 4);
/// assert_eq!(cd.avg_bytes_per_sec(), 176_400);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    encoding: SampleEncoding,
}

impl AudioFormat {
    /// Creates a format descriptor.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` if the sample rate, channel count or
    /// sample width is zero (block alignment must be positive).
    pub fn new(
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
        encoding: SampleEncoding,
    ) -> Result<Self, SourceError> {
        if sample_rate == 0 {
            return Err(SourceError::unsupported("sample rate is zero"));
        }
        if channels == 0 {
            return Err(SourceError::unsupported("channel count is zero"));
        }
        if bits_per_sample == 0 {
            return Err(SourceError::unsupported("bits per sample is zero"));
        }
        if encoding == SampleEncoding::Float && !matches!(bits_per_sample, 32 | 64) {
            return Err(SourceError::unsupported(format!(
                "{bits_per_sample}-bit float samples"
            )));
        }

        Ok(Self {
            sample_rate,
            channels,
            bits_per_sample,
            encoding,
        })
    }

    /// Creates an integer PCM format descriptor.
    ///
    /// # Errors
    ///
    /// See [`AudioFormat::new`].
    pub fn pcm(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Result<Self, SourceError> {
        Self::new(sample_rate, channels, bits_per_sample, SampleEncoding::Int)
    }

    /// Sample rate in Hz.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels.
    #[must_use]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Bits per sample as declared by the source.
    #[must_use]
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    /// Sample encoding.
    #[must_use]
    pub fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    /// Bytes occupied by one sample (bits rounded up to whole bytes).
    #[must_use]
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample).div_ceil(8)
    }

    /// Bytes per frame (one sample for every channel). Always > 0.
    #[must_use]
    pub fn block_align(&self) -> usize {
        usize::from(self.channels) * self.bytes_per_sample()
    }

    /// Average bytes per second of playback.
    #[must_use]
    pub fn avg_bytes_per_sec(&self) -> u64 {
        u64::from(self.sample_rate) * self.block_align() as u64
    }

    /// Number of whole frames that play for `duration`.
    #[must_use]
    pub fn frames_for_duration(&self, duration: Duration) -> u32 {
        (f64::from(self.sample_rate) * duration.as_secs_f64()) as u32
    }

    /// Byte length of `frames` frames.
    #[must_use]
    pub fn bytes_for_frames(&self, frames: u32) -> usize {
        frames as usize * self.block_align()
    }

    /// Frames needed to hold `bytes` bytes, rounding a trailing partial frame up.
    #[must_use]
    pub fn frames_for_bytes(&self, bytes: u64) -> u64 {
        bytes.div_ceil(self.block_align() as u64)
    }

    /// Playback duration of `frames` frames.
    #[must_use]
    pub fn duration_of_frames(&self, frames: u64) -> Duration {
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// The byte value that encodes silence in this format.
    ///
    /// 8-bit integer PCM is unsigned and centered on 0x80; everything else is zero.
    #[must_use]
    pub fn silence_byte(&self) -> u8 {
        if self.encoding == SampleEncoding::Int && self.bits_per_sample <= 8 {
            0x80
        } else {
            0
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoding = match self.encoding {
            SampleEncoding::Int => "int",
            SampleEncoding::Float => "float",
        };
        write!(
            f,
            "{}Hz/{}ch/{}bit {}",
            self.sample_rate, self.channels, self.bits_per_sample, encoding
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_align_stereo_16bit() {
        let format = AudioFormat::pcm(44100, 2, 16).unwrap();
        assert_eq!(format.block_align(), 4);
        assert_eq!(format.avg_bytes_per_sec(), 44100 * 4);
    }

    #[test]
    fn test_block_align_rounds_partial_bytes() {
        let format = AudioFormat::pcm(48000, 2, 20).unwrap();
        assert_eq!(format.bytes_per_sample(), 3);
        assert_eq!(format.block_align(), 6);
    }

    #[test]
    fn test_zero_fields_rejected() {
        assert!(AudioFormat::pcm(0, 2, 16).is_err());
        assert!(AudioFormat::pcm(44100, 0, 16).is_err());
        assert!(AudioFormat::pcm(44100, 2, 0).is_err());
    }

    #[test]
    fn test_float_requires_32_or_64_bits() {
        assert!(AudioFormat::new(48000, 2, 32, SampleEncoding::Float).is_ok());
        assert!(AudioFormat::new(48000, 2, 16, SampleEncoding::Float).is_err());
    }

    #[test]
    fn test_frames_for_duration() {
        let format = AudioFormat::pcm(44100, 2, 16).unwrap();
        assert_eq!(format.frames_for_duration(Duration::from_secs(2)), 88200);
        assert_eq!(format.frames_for_duration(Duration::from_millis(100)), 4410);
    }

    #[test]
    fn test_frames_for_bytes_rounds_up() {
        let format = AudioFormat::pcm(44100, 2, 16).unwrap();
        assert_eq!(format.frames_for_bytes(8), 2);
        assert_eq!(format.frames_for_bytes(9), 3);
        assert_eq!(format.frames_for_bytes(0), 0);
    }

    #[test]
    fn test_silence_byte() {
        assert_eq!(AudioFormat::pcm(8000, 1, 8).unwrap().silence_byte(), 0x80);
        assert_eq!(AudioFormat::pcm(8000, 1, 16).unwrap().silence_byte(), 0);
        let float = AudioFormat::new(8000, 1, 32, SampleEncoding::Float).unwrap();
        assert_eq!(float.silence_byte(), 0);
    }

    #[test]
    fn test_display() {
        let format = AudioFormat::pcm(44100, 2, 16).unwrap();
        assert_eq!(format.to_string(), "44100Hz/2ch/16bit int");
    }
}
