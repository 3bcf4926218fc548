//! Byte ring between the engine's commits and the output stream callback.
//!
//! [`RenderRing`] is the producer half used by [`CpalBackend`]: it stages
//! leases, pushes commits and answers padding queries. [`RingFeeder`] is the
//! consumer half moved into the stream callback. Both share a
//! [`StreamShared`] block carrying the sticky device-lost flag and the frames
//! the last callback handed to the device.
//!
//! [`CpalBackend`]: crate::render::CpalBackend

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::render::BufferFlags;
use crate::{AudioFormat, RenderError};

/// State shared with the stream callbacks.
#[derive(Debug, Default)]
pub(crate) struct StreamShared {
    lost: AtomicBool,
    reason: Mutex<Option<String>>,
    in_flight: AtomicU32,
}

impl StreamShared {
    pub(crate) fn mark_lost(&self, reason: String) {
        *self.reason.lock() = Some(reason);
        self.lost.store(true, Ordering::Release);
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    pub(crate) fn error(&self) -> RenderError {
        let reason = self
            .reason
            .lock()
            .clone()
            .unwrap_or_else(|| "device not available".to_string());
        RenderError::device_lost(reason)
    }

    fn check(&self) -> Result<(), RenderError> {
        if self.is_lost() {
            Err(self.error())
        } else {
            Ok(())
        }
    }
}

/// Producer side of the render buffer.
pub(crate) struct RenderRing {
    producer: HeapProd<u8>,
    shared: Arc<StreamShared>,
    block_align: usize,
    silence: u8,
    staging: Vec<u8>,
    leased_frames: Option<u32>,
}

/// Consumer side, owned by the output stream callback.
pub(crate) struct RingFeeder {
    consumer: HeapCons<u8>,
    shared: Arc<StreamShared>,
    block_align: usize,
    silence: u8,
}

impl RenderRing {
    /// Allocates a ring of `capacity_frames` frames of `format`.
    ///
    /// Fails with `FormatRejected` when the capacity holds no whole frame.
    pub(crate) fn new(
        capacity_frames: u32,
        format: &AudioFormat,
        shared: Arc<StreamShared>,
    ) -> Result<(Self, RingFeeder), RenderError> {
        if capacity_frames == 0 {
            return Err(RenderError::FormatRejected {
                format: format.to_string(),
                reason: "requested buffer duration holds no whole frame".to_string(),
            });
        }

        let block_align = format.block_align();
        let silence = format.silence_byte();
        let ring = HeapRb::<u8>::new(capacity_frames as usize * block_align);
        let (producer, consumer) = ring.split();

        let feeder = RingFeeder {
            consumer,
            shared: Arc::clone(&shared),
            block_align,
            silence,
        };
        let ring = Self {
            producer,
            shared,
            block_align,
            silence,
            staging: Vec::new(),
            leased_frames: None,
        };
        Ok((ring, feeder))
    }

    /// Frames in the ring plus the frames the device took on its last pull.
    pub(crate) fn padding(&self) -> Result<u32, RenderError> {
        self.shared.check()?;
        let queued = self.producer.occupied_len() / self.block_align;
        let queued = u32::try_from(queued).unwrap_or(u32::MAX);
        Ok(queued.saturating_add(self.shared.in_flight.load(Ordering::Acquire)))
    }

    pub(crate) fn lease(&mut self, frames: u32) -> Result<(), RenderError> {
        self.shared.check()?;
        let vacant = self.producer.vacant_len() / self.block_align;
        let available = u32::try_from(vacant).unwrap_or(u32::MAX);
        if frames > available {
            return Err(RenderError::BufferUnavailable {
                requested: frames,
                available,
            });
        }

        self.staging.clear();
        self.staging
            .resize(frames as usize * self.block_align, self.silence);
        self.leased_frames = Some(frames);
        Ok(())
    }

    pub(crate) fn region(&mut self) -> &mut [u8] {
        &mut self.staging
    }

    /// Pushes the first `frames` frames of the staged lease.
    pub(crate) fn commit(&mut self, frames: u32, flags: BufferFlags) -> Result<(), RenderError> {
        if self.leased_frames.take().is_none() {
            return Err(RenderError::Backend(
                "buffer released without a lease".to_string(),
            ));
        }
        self.shared.check()?;

        let len = (frames as usize * self.block_align).min(self.staging.len());
        if flags.is_silent() {
            self.staging[..len].fill(self.silence);
        }
        let pushed = self.producer.push_slice(&self.staging[..len]);
        // Vacancy was checked at lease time and only the feeder frees space
        debug_assert_eq!(pushed, len);
        self.staging.clear();
        Ok(())
    }
}

impl RingFeeder {
    /// Fills one device period, padding any shortfall with silence.
    pub(crate) fn fill(&mut self, out: &mut [u8]) {
        let popped = self.consumer.pop_slice(out);
        out[popped..].fill(self.silence);
        let frames = u32::try_from(popped / self.block_align).unwrap_or(u32::MAX);
        self.shared.in_flight.store(frames, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 16-bit mono: two bytes per frame.
    fn mono16() -> AudioFormat {
        AudioFormat::pcm(8000, 1, 16).unwrap()
    }

    fn ring(capacity: u32, format: AudioFormat) -> (RenderRing, RingFeeder, Arc<StreamShared>) {
        let shared = Arc::new(StreamShared::default());
        let (ring, feeder) = RenderRing::new(capacity, &format, Arc::clone(&shared)).unwrap();
        (ring, feeder, shared)
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = RenderRing::new(0, &mono16(), Arc::new(StreamShared::default()));
        assert!(matches!(result, Err(RenderError::FormatRejected { .. })));
    }

    #[test]
    fn test_lease_larger_than_vacancy_is_unavailable() {
        let (mut ring, _feeder, _) = ring(4, mono16());
        let err = ring.lease(5).unwrap_err();
        assert!(matches!(
            err,
            RenderError::BufferUnavailable {
                requested: 5,
                available: 4
            }
        ));

        ring.lease(3).unwrap();
        ring.commit(3, BufferFlags::NONE).unwrap();
        let err = ring.lease(2).unwrap_err();
        assert!(matches!(
            err,
            RenderError::BufferUnavailable {
                requested: 2,
                available: 1
            }
        ));
    }

    #[test]
    fn test_leased_region_is_prefilled_with_silence() {
        let eight_bit = AudioFormat::pcm(8000, 1, 8).unwrap();
        let (mut ring, _feeder, _) = ring(16, eight_bit);
        ring.lease(3).unwrap();
        assert_eq!(ring.region(), &[0x80, 0x80, 0x80]);
    }

    #[test]
    fn test_padding_counts_whole_frames_in_ring() {
        let (mut ring, _feeder, _) = ring(16, mono16());
        assert_eq!(ring.padding().unwrap(), 0);

        ring.lease(4).unwrap();
        ring.region().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        ring.commit(3, BufferFlags::NONE).unwrap();
        assert_eq!(ring.padding().unwrap(), 3);
    }

    #[test]
    fn test_feeder_plays_commits_in_order() {
        let (mut ring, mut feeder, _) = ring(16, mono16());
        ring.lease(2).unwrap();
        ring.region().copy_from_slice(&[1, 2, 3, 4]);
        ring.commit(2, BufferFlags::NONE).unwrap();
        ring.lease(2).unwrap();
        ring.region().copy_from_slice(&[5, 6, 7, 8]);
        ring.commit(2, BufferFlags::NONE).unwrap();

        let mut out = [0xEE; 8];
        feeder.fill(&mut out);
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_silent_commit_pushes_silence() {
        let (mut ring, mut feeder, _) = ring(16, mono16());
        ring.lease(2).unwrap();
        ring.region().fill(0xAA);
        ring.commit(2, BufferFlags::SILENT).unwrap();

        let mut out = [0xEE; 4];
        feeder.fill(&mut out);
        assert_eq!(out, [0, 0, 0, 0]);
    }

    #[test]
    fn test_partial_commit_pushes_only_valid_frames() {
        let (mut ring, mut feeder, _) = ring(16, mono16());
        ring.lease(4).unwrap();
        ring.region().copy_from_slice(&[1, 1, 2, 2, 3, 3, 4, 4]);
        ring.commit(1, BufferFlags::NONE).unwrap();

        let mut out = [0xEE; 4];
        feeder.fill(&mut out);
        assert_eq!(out, [1, 1, 0, 0]);
    }

    #[test]
    fn test_padding_includes_last_device_pull() {
        let (mut ring, mut feeder, _) = ring(16, mono16());
        ring.lease(6).unwrap();
        ring.commit(6, BufferFlags::NONE).unwrap();

        // Device pulls a two-frame period
        let mut period = [0u8; 4];
        feeder.fill(&mut period);
        assert_eq!(ring.padding().unwrap(), 4 + 2);

        feeder.fill(&mut period);
        feeder.fill(&mut period);
        assert_eq!(ring.padding().unwrap(), 2);

        // A pull from an empty ring means the previous period has gone out
        feeder.fill(&mut period);
        assert_eq!(period, [0, 0, 0, 0]);
        assert_eq!(ring.padding().unwrap(), 0);
    }

    #[test]
    fn test_vacancy_returns_as_feeder_drains() {
        let (mut ring, mut feeder, _) = ring(4, mono16());
        ring.lease(4).unwrap();
        ring.commit(4, BufferFlags::NONE).unwrap();
        assert!(ring.lease(1).is_err());

        let mut period = [0u8; 4];
        feeder.fill(&mut period);
        ring.lease(2).unwrap();
    }

    #[test]
    fn test_commit_without_lease_is_rejected() {
        let (mut ring, _feeder, _) = ring(4, mono16());
        let err = ring.commit(1, BufferFlags::NONE).unwrap_err();
        assert!(matches!(err, RenderError::Backend(_)));
    }

    #[test]
    fn test_lost_device_fails_every_operation() {
        let (mut ring, _feeder, shared) = ring(16, mono16());
        ring.lease(2).unwrap();
        shared.mark_lost("unplugged".to_string());

        assert!(ring.commit(2, BufferFlags::NONE).unwrap_err().is_device_lost());
        assert!(ring.padding().unwrap_err().is_device_lost());
        assert!(ring.lease(2).unwrap_err().is_device_lost());
        assert_eq!(ring.padding().unwrap_err().to_string(), "device lost: unplugged");
    }

    #[test]
    fn test_shared_reports_default_reason() {
        let shared = StreamShared::default();
        assert!(!shared.is_lost());
        shared.lost.store(true, Ordering::Release);
        assert_eq!(shared.error().to_string(), "device lost: device not available");
    }
}
