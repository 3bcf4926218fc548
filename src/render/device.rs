//! CPAL output device wrapper implementing [`RenderBackend`].

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, Host, SampleFormat, SampleRate, Stream, StreamConfig, SupportedBufferSize,
};

use crate::format::SampleEncoding;
use crate::render::ring::{RenderRing, StreamShared};
use crate::render::{BufferFlags, DeviceId, RenderBackend};
use crate::{AudioFormat, PlaybackError, RenderError, DEFAULT_CHUNK_FRAMES};

/// Scoped access to the platform audio host.
///
/// Each public entry point that touches devices acquires one scope and
/// releases it on return.
pub(crate) struct HostScope {
    host: Host,
}

impl HostScope {
    pub(crate) fn acquire() -> Self {
        let host = cpal::default_host();
        tracing::trace!("audio host {:?} acquired", host.id());
        Self { host }
    }

    pub(crate) fn host(&self) -> &Host {
        &self.host
    }
}

impl Drop for HostScope {
    fn drop(&mut self) {
        tracing::trace!("audio host {:?} released", self.host.id());
    }
}

/// Finds an output device by identifier.
///
/// Duplicate names resolve to the first enumerated endpoint.
pub(crate) fn find_output_device(host: &Host, id: &DeviceId) -> Result<Device, PlaybackError> {
    let mut devices: Vec<(Device, String)> = host
        .output_devices()
        .map_err(|e| PlaybackError::Backend(e.to_string()))?
        .filter_map(|d| d.name().ok().map(|name| (d, name)))
        .collect();

    let index = id
        .first_match(devices.iter().map(|(_, name)| name.as_str()))
        .ok_or_else(|| PlaybackError::DeviceNotFound { id: id.to_string() })?;
    let duplicates = devices.iter().filter(|(_, name)| name == id.as_str()).count();
    if duplicates > 1 {
        tracing::warn!("{} output devices are named {}, using the first", duplicates, id);
    }

    Ok(devices.swap_remove(index).0)
}

/// Which output device to render to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeviceSelection {
    /// The system default render endpoint.
    #[default]
    SystemDefault,
    /// A specific endpoint.
    ById(DeviceId),
}

/// Render backend over a CPAL output stream.
///
/// The sink's buffer is a byte ring sized to the negotiated capacity. Leases
/// are staged and pushed into the ring on commit; the stream callback pops
/// from the ring and fills any shortfall with silence.
///
/// The stream period is fixed at no more than half a chunk, so a ring kept
/// at one chunk or more never runs short inside a callback. Padding counts
/// the frames in the ring plus the period the device pulled last.
#[must_use]
pub struct CpalBackend {
    device: Device,
    name: String,
    chunk_frames: u32,
    shared: Arc<StreamShared>,
    stream: Option<Stream>,
    ring: Option<RenderRing>,
}

impl CpalBackend {
    /// Opens the selected output device.
    ///
    /// # Errors
    ///
    /// Returns `NoDefaultDevice` or `DeviceNotFound` if the endpoint does not exist.
    pub fn open(selection: &DeviceSelection) -> Result<Self, PlaybackError> {
        let scope = HostScope::acquire();
        let device = match selection {
            DeviceSelection::SystemDefault => scope
                .host()
                .default_output_device()
                .ok_or(PlaybackError::NoDefaultDevice)?,
            DeviceSelection::ById(id) => find_output_device(scope.host(), id)?,
        };
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::debug!("Opened output device {}", name);

        Ok(Self {
            device,
            name,
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            shared: Arc::new(StreamShared::default()),
            stream: None,
            ring: None,
        })
    }

    /// Sets the chunk size the engine will commit, which bounds the period.
    ///
    /// Default: [`DEFAULT_CHUNK_FRAMES`]
    pub fn with_chunk_frames(mut self, frames: u32) -> Self {
        self.chunk_frames = frames;
        self
    }

    fn sample_format(format: &AudioFormat) -> Option<SampleFormat> {
        match (format.encoding(), format.bits_per_sample()) {
            (SampleEncoding::Int, 8) => Some(SampleFormat::U8),
            (SampleEncoding::Int, 16) => Some(SampleFormat::I16),
            (SampleEncoding::Int, 32) => Some(SampleFormat::I32),
            (SampleEncoding::Float, 32) => Some(SampleFormat::F32),
            (SampleEncoding::Float, 64) => Some(SampleFormat::F64),
            _ => None,
        }
    }

    /// Picks a period of at most half a chunk within the device's range.
    fn period(supported: &SupportedBufferSize, chunk_frames: u32) -> BufferSize {
        let target = (chunk_frames / 2).max(1);
        match *supported {
            SupportedBufferSize::Range { min, max } => {
                if min > target {
                    tracing::warn!(
                        min_period = min,
                        chunk_frames,
                        "device period exceeds half a chunk; playback may stutter"
                    );
                }
                BufferSize::Fixed(target.clamp(min, max.max(min)))
            }
            SupportedBufferSize::Unknown => {
                tracing::debug!("device reports no period range, using its default");
                BufferSize::Default
            }
        }
    }

    fn negotiate(&self, format: &AudioFormat) -> Result<(StreamConfig, SampleFormat), RenderError> {
        let rejected = |reason: &str| RenderError::FormatRejected {
            format: format.to_string(),
            reason: reason.to_string(),
        };

        let sample_format = Self::sample_format(format)
            .ok_or_else(|| rejected("no device sample format for this encoding"))?;

        let configs = self.device.supported_output_configs().map_err(|e| match e {
            cpal::SupportedStreamConfigsError::DeviceNotAvailable => {
                RenderError::DeviceUnavailable {
                    device: self.name.clone(),
                    reason: e.to_string(),
                }
            }
            other => RenderError::Backend(other.to_string()),
        })?;

        let rate = format.sample_rate();
        let supported = configs
            .filter(|range| {
                range.channels() == format.channels()
                    && range.sample_format() == sample_format
                    && range.min_sample_rate().0 <= rate
                    && rate <= range.max_sample_rate().0
            })
            .map(|range| range.with_sample_rate(SampleRate(rate)))
            .next()
            .ok_or_else(|| rejected("no matching output configuration"))?;

        let mut config = supported.config();
        config.buffer_size = Self::period(supported.buffer_size(), self.chunk_frames);
        Ok((config, sample_format))
    }

    fn ring(&mut self) -> Result<&mut RenderRing, RenderError> {
        if self.shared.is_lost() {
            return Err(self.shared.error());
        }
        self.ring
            .as_mut()
            .ok_or_else(|| RenderError::Backend("render buffer not allocated".to_string()))
    }
}

impl RenderBackend for CpalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(
        &mut self,
        format: &AudioFormat,
        buffer_duration: Duration,
    ) -> Result<u32, RenderError> {
        let (config, sample_format) = self.negotiate(format)?;

        let capacity = format.frames_for_duration(buffer_duration);
        let (ring, mut feeder) = RenderRing::new(capacity, format, Arc::clone(&self.shared))?;

        let shared = Arc::clone(&self.shared);
        let stream = self
            .device
            .build_output_stream_raw(
                &config,
                sample_format,
                move |data: &mut cpal::Data, _: &cpal::OutputCallbackInfo| {
                    feeder.fill(data.bytes_mut());
                },
                move |err| match err {
                    cpal::StreamError::DeviceNotAvailable => {
                        tracing::warn!("Output device lost: {}", err);
                        shared.mark_lost(err.to_string());
                    }
                    other => tracing::error!("Audio stream error: {}", other),
                },
                None,
            )
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => RenderError::DeviceUnavailable {
                    device: self.name.clone(),
                    reason: e.to_string(),
                },
                cpal::BuildStreamError::StreamConfigNotSupported => RenderError::FormatRejected {
                    format: format.to_string(),
                    reason: e.to_string(),
                },
                other => RenderError::Backend(other.to_string()),
            })?;

        tracing::debug!(
            "Output stream built: {} Hz, {} channels, {:?}, period {:?}",
            config.sample_rate.0,
            config.channels,
            sample_format,
            config.buffer_size
        );

        self.stream = Some(stream);
        self.ring = Some(ring);
        Ok(capacity)
    }

    fn start(&mut self) -> Result<(), RenderError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| RenderError::Backend("stream not built".to_string()))?;
        stream
            .play()
            .map_err(|e| RenderError::Backend(e.to_string()))
    }

    fn current_padding(&mut self) -> Result<u32, RenderError> {
        self.ring()?.padding()
    }

    fn get_buffer(&mut self, frames: u32) -> Result<(), RenderError> {
        self.ring()?.lease(frames)
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        match self.ring.as_mut() {
            Some(ring) => ring.region(),
            None => &mut [],
        }
    }

    fn release_buffer(&mut self, frames: u32, flags: BufferFlags) -> Result<(), RenderError> {
        self.ring
            .as_mut()
            .ok_or_else(|| RenderError::Backend("render buffer not allocated".to_string()))?
            .commit(frames, flags)
    }

    fn stop(&mut self) -> Result<(), RenderError> {
        if self.shared.is_lost() {
            return Err(self.shared.error());
        }
        match &self.stream {
            Some(stream) => stream
                .pause()
                .map_err(|e| RenderError::Backend(e.to_string())),
            None => Ok(()),
        }
    }

    fn release_client(&mut self) -> Result<(), RenderError> {
        // Dropping the stream closes it
        self.stream = None;
        Ok(())
    }

    fn release_render_buffer(&mut self) -> Result<(), RenderError> {
        self.ring = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_selection_default() {
        assert_eq!(DeviceSelection::default(), DeviceSelection::SystemDefault);
    }

    #[test]
    fn test_sample_format_mapping() {
        let pcm16 = AudioFormat::pcm(44100, 2, 16).unwrap();
        assert_eq!(CpalBackend::sample_format(&pcm16), Some(SampleFormat::I16));

        let pcm8 = AudioFormat::pcm(8000, 1, 8).unwrap();
        assert_eq!(CpalBackend::sample_format(&pcm8), Some(SampleFormat::U8));

        let float = AudioFormat::new(48000, 2, 32, SampleEncoding::Float).unwrap();
        assert_eq!(CpalBackend::sample_format(&float), Some(SampleFormat::F32));

        let pcm24 = AudioFormat::pcm(48000, 2, 24).unwrap();
        assert_eq!(CpalBackend::sample_format(&pcm24), None);
    }

    #[test]
    fn test_period_is_half_a_chunk() {
        let range = SupportedBufferSize::Range { min: 64, max: 8192 };
        assert_eq!(CpalBackend::period(&range, 1024), BufferSize::Fixed(512));
    }

    #[test]
    fn test_period_clamped_to_device_range() {
        let large_min = SupportedBufferSize::Range {
            min: 2048,
            max: 8192,
        };
        assert_eq!(CpalBackend::period(&large_min, 1024), BufferSize::Fixed(2048));

        let small_max = SupportedBufferSize::Range { min: 16, max: 128 };
        assert_eq!(CpalBackend::period(&small_max, 1024), BufferSize::Fixed(128));

        let range = SupportedBufferSize::Range { min: 1, max: 64 };
        assert_eq!(CpalBackend::period(&range, 1), BufferSize::Fixed(1));
    }

    #[test]
    fn test_unknown_period_range_uses_default() {
        assert_eq!(
            CpalBackend::period(&SupportedBufferSize::Unknown, 1024),
            BufferSize::Default
        );
    }

    #[test]
    fn test_unknown_device_not_found() {
        let scope = HostScope::acquire();
        let result = find_output_device(scope.host(), &DeviceId::new("no-such-device-xyz"));
        assert!(result.is_err());
    }

    // Note: Device tests require actual audio hardware and are skipped in CI
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_open_default_device_and_initialize() {
        let mut backend = CpalBackend::open(&DeviceSelection::SystemDefault).unwrap();
        let format = AudioFormat::pcm(44100, 2, 16).unwrap();
        let capacity = backend
            .initialize(&format, Duration::from_secs(1))
            .unwrap();
        assert_eq!(capacity, 44100);
        assert_eq!(backend.current_padding().unwrap(), 0);
    }
}
