//! Synthetic PCM for testing without audio files.

use std::path::Path;
use std::time::Duration;

use crate::source::MemorySource;
use crate::{AudioFormat, SourceError};

/// Generates 16-bit PCM for tests and demos.
///
/// # Example
///
/// ```
/// use stream_playback::source::{MockSource, SourceReader};
///
/// let mut mock = MockSource::new(16000, 1);
///
/// // 100ms of silence, then 100ms of a 440Hz sine wave
/// mock.generate_silence(100);
/// mock.generate_sine(440.0, 100);
///
/// let source = mock.into_source().unwrap();
/// assert_eq!(source.total_frames(), 3200);
/// ```
#[derive(Debug, Clone)]
pub struct MockSource {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
}

impl MockSource {
    /// Creates an empty generator with the given format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            samples: Vec::new(),
        }
    }

    /// Creates a generator for CD audio (44.1kHz stereo).
    pub fn cd() -> Self {
        Self::new(44100, 2)
    }

    /// The 16-bit integer format of the generated data.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for a zero sample rate or channel count.
    pub fn format(&self) -> Result<AudioFormat, SourceError> {
        AudioFormat::pcm(self.sample_rate, self.channels, 16)
    }

    /// Generates silence for the given duration in milliseconds.
    pub fn generate_silence(&mut self, duration_ms: u64) {
        let num_samples = self.samples_for_duration(duration_ms);
        self.samples.resize(self.samples.len() + num_samples, 0);
    }

    /// Generates a sine wave at the given frequency for the given duration.
    pub fn generate_sine(&mut self, frequency: f64, duration_ms: u64) {
        let num_frames = self.samples_for_duration(duration_ms) / self.channels.max(1) as usize;
        let sample_rate = f64::from(self.sample_rate);

        for i in 0..num_frames {
            let t = i as f64 / sample_rate;
            let value = (2.0 * std::f64::consts::PI * frequency * t).sin();
            let sample = (value * 32767.0) as i16;

            for _ in 0..self.channels {
                self.samples.push(sample);
            }
        }
    }

    /// Generates deterministic white noise for the given duration.
    pub fn generate_noise(&mut self, duration_ms: u64, amplitude: f64) {
        let num_samples = self.samples_for_duration(duration_ms);
        let amplitude = (amplitude * 32767.0) as i16;

        let mut seed: u32 = 12345;
        for _ in 0..num_samples {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let random = ((seed >> 16) as i32 - 32768) as i16;
            let sample = (i32::from(random) * i32::from(amplitude) / 32767) as i16;
            self.samples.push(sample);
        }
    }

    /// Appends `frames` frames whose samples count up from the current length.
    ///
    /// Every sample is distinct (modulo 2^16), which makes skipped or
    /// duplicated bytes easy to spot.
    pub fn generate_ramp(&mut self, frames: usize) {
        let start = self.samples.len();
        let count = frames * self.channels as usize;
        self.samples
            .extend((start..start + count).map(|i| i as u16 as i16));
    }

    /// Adds raw samples directly.
    pub fn add_samples(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
    }

    /// Returns the accumulated samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Returns the duration of the accumulated samples.
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate.max(1)))
    }

    /// The samples as little-endian bytes, the layout of a WAVE data chunk.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Converts into an in-memory source.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for a zero sample rate or channel count.
    pub fn into_source(self) -> Result<MemorySource, SourceError> {
        let format = self.format()?;
        Ok(MemorySource::new(format, self.to_bytes()))
    }

    /// Writes the samples to a WAVE file.
    ///
    /// # Errors
    ///
    /// Returns `Wav` if the file cannot be written.
    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<(), SourceError> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    fn samples_for_duration(&self, duration_ms: u64) -> usize {
        let frames = (u64::from(self.sample_rate) * duration_ms / 1000) as usize;
        frames * self.channels as usize
    }
}
