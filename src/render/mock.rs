//! Mock render backend for testing without hardware.
//!
//! [`MockBackend`] simulates a fixed-capacity sink: each padding query first
//! "plays" a configurable number of queued frames, commits add frames to the
//! queue, and failures can be scripted per call. Every call is recorded in a
//! log shared with a [`MockProbe`], so tests can inspect what happened after
//! the session (and the backend inside it) has been consumed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::render::{BufferFlags, RenderBackend};
use crate::{AudioFormat, RenderError};

/// A backend operation, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    /// `initialize`
    Initialize,
    /// `start`
    Start,
    /// `current_padding`
    Padding,
    /// `get_buffer`
    GetBuffer,
    /// `release_buffer`
    ReleaseBuffer,
    /// `stop`
    Stop,
    /// `release_client`
    ReleaseClient,
    /// `release_render_buffer`
    ReleaseRenderBuffer,
}

/// One completed lease/commit cycle as seen by the sink.
#[derive(Debug, Clone)]
pub struct CommitRecord {
    /// Frames that were leased.
    pub leased_frames: u32,
    /// Frames declared valid on release.
    pub valid_frames: u32,
    /// Flags passed on release.
    pub flags: BufferFlags,
    /// The padding value most recently reported before the lease was taken.
    pub padding_before_lease: Option<u32>,
    /// Contents of the leased region at release.
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockLog {
    calls: Vec<MockCall>,
    commits: Vec<CommitRecord>,
    padding_reads: Vec<u32>,
    rendered: Vec<u8>,
}

/// Read handle onto a [`MockBackend`]'s call log.
#[derive(Debug, Clone)]
pub struct MockProbe {
    log: Arc<Mutex<MockLog>>,
}

impl MockProbe {
    /// Every backend call, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.log.lock().calls.clone()
    }

    /// Number of times `call` was made.
    pub fn count(&self, call: MockCall) -> usize {
        self.log.lock().calls.iter().filter(|&&c| c == call).count()
    }

    /// Every release, successful or not, in order.
    pub fn commits(&self) -> Vec<CommitRecord> {
        self.log.lock().commits.clone()
    }

    /// Every padding value returned, in order.
    pub fn padding_reads(&self) -> Vec<u32> {
        self.log.lock().padding_reads.clone()
    }

    /// Concatenation of the valid frames of every accepted commit.
    ///
    /// Silent commits contribute silence.
    pub fn rendered_bytes(&self) -> Vec<u8> {
        self.log.lock().rendered.clone()
    }

    /// Calls made after the first occurrence of `call`.
    pub fn calls_after(&self, call: MockCall) -> Vec<MockCall> {
        let log = self.log.lock();
        match log.calls.iter().position(|&c| c == call) {
            Some(pos) => log.calls[pos + 1..].to_vec(),
            None => Vec::new(),
        }
    }
}

/// A simulated render sink.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use stream_playback::{AudioFormat, BufferFlags, MockBackend, RenderSession};
///
/// let backend = MockBackend::new().frames_per_poll(256);
/// let probe = backend.probe();
///
/// let mut session = RenderSession::new(backend);
/// session.initialize(AudioFormat::pcm(8000, 1, 16).unwrap(), Duration::from_secs(1)).unwrap();
/// session.start().unwrap();
///
/// let lease = session.lease_buffer(1024).unwrap();
/// lease.commit(1024, BufferFlags::NONE).unwrap();
///
/// // Each padding query plays 256 frames
/// assert_eq!(session.current_padding_frames().unwrap(), 768);
/// assert_eq!(probe.commits().len(), 1);
/// ```
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    log: Arc<Mutex<MockLog>>,
    frames_per_poll: u32,
    capacity_override: Option<u32>,
    reject_format: bool,
    unavailable: bool,
    lose_on_padding: Option<usize>,
    lose_on_lease: Option<usize>,
    lose_on_commit: Option<usize>,
    busy_leases: HashSet<usize>,
    fail_stop: bool,
    fail_release_client: bool,

    format: Option<AudioFormat>,
    capacity: u32,
    queued: u32,
    device_lost: bool,
    padding_calls: usize,
    lease_calls: usize,
    commit_calls: usize,
    last_padding: Option<u32>,
    lease: Option<(u32, Option<u32>)>,
    region: Vec<u8>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Creates a sink that plays everything instantly.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            log: Arc::new(Mutex::new(MockLog::default())),
            frames_per_poll: u32::MAX,
            capacity_override: None,
            reject_format: false,
            unavailable: false,
            lose_on_padding: None,
            lose_on_lease: None,
            lose_on_commit: None,
            busy_leases: HashSet::new(),
            fail_stop: false,
            fail_release_client: false,
            format: None,
            capacity: 0,
            queued: 0,
            device_lost: false,
            padding_calls: 0,
            lease_calls: 0,
            commit_calls: 0,
            last_padding: None,
            lease: None,
            region: Vec::new(),
        }
    }

    /// Returns a probe onto this backend's call log.
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            log: Arc::clone(&self.log),
        }
    }

    /// Sets the endpoint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Frames played out of the queue at each padding query.
    #[must_use]
    pub fn frames_per_poll(mut self, frames: u32) -> Self {
        self.frames_per_poll = frames;
        self
    }

    /// Buffer capacity in frames, instead of the requested duration.
    #[must_use]
    pub fn capacity(mut self, frames: u32) -> Self {
        self.capacity_override = Some(frames);
        self
    }

    /// Fails `initialize` with `FormatRejected`.
    #[must_use]
    pub fn reject_format(mut self) -> Self {
        self.reject_format = true;
        self
    }

    /// Fails `initialize` with `DeviceUnavailable`.
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Loses the device on the `n`th padding query (1-based).
    #[must_use]
    pub fn lose_device_on_padding(mut self, n: usize) -> Self {
        self.lose_on_padding = Some(n);
        self
    }

    /// Loses the device on the `n`th `get_buffer` (1-based).
    #[must_use]
    pub fn lose_device_on_lease(mut self, n: usize) -> Self {
        self.lose_on_lease = Some(n);
        self
    }

    /// Loses the device on the `n`th `release_buffer` (1-based).
    #[must_use]
    pub fn lose_device_on_commit(mut self, n: usize) -> Self {
        self.lose_on_commit = Some(n);
        self
    }

    /// Fails the `n`th `get_buffer` (1-based) with `BufferUnavailable`.
    #[must_use]
    pub fn busy_on_lease(mut self, n: usize) -> Self {
        self.busy_leases.insert(n);
        self
    }

    /// Fails `stop`.
    #[must_use]
    pub fn fail_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Fails `release_client`.
    #[must_use]
    pub fn fail_release_client(mut self) -> Self {
        self.fail_release_client = true;
        self
    }

    fn record(&self, call: MockCall) {
        self.log.lock().calls.push(call);
    }

    fn lost(&self) -> RenderError {
        RenderError::device_lost("mock device removed")
    }

    fn block_align(&self) -> usize {
        self.format.map_or(1, |f| f.block_align())
    }

    fn silence(&self) -> u8 {
        self.format.map_or(0, |f| f.silence_byte())
    }
}

impl RenderBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(
        &mut self,
        format: &AudioFormat,
        buffer_duration: Duration,
    ) -> Result<u32, RenderError> {
        self.record(MockCall::Initialize);

        if self.unavailable {
            return Err(RenderError::DeviceUnavailable {
                device: self.name.clone(),
                reason: "mock endpoint disabled".to_string(),
            });
        }
        if self.reject_format {
            return Err(RenderError::FormatRejected {
                format: format.to_string(),
                reason: "mock sink rejects all formats".to_string(),
            });
        }

        self.format = Some(*format);
        self.capacity = self
            .capacity_override
            .unwrap_or_else(|| format.frames_for_duration(buffer_duration));
        Ok(self.capacity)
    }

    fn start(&mut self) -> Result<(), RenderError> {
        self.record(MockCall::Start);
        Ok(())
    }

    fn current_padding(&mut self) -> Result<u32, RenderError> {
        self.record(MockCall::Padding);
        self.padding_calls += 1;

        if self.lose_on_padding == Some(self.padding_calls) {
            self.device_lost = true;
        }
        if self.device_lost {
            return Err(self.lost());
        }

        self.queued = self.queued.saturating_sub(self.frames_per_poll);
        self.last_padding = Some(self.queued);
        self.log.lock().padding_reads.push(self.queued);
        Ok(self.queued)
    }

    fn get_buffer(&mut self, frames: u32) -> Result<(), RenderError> {
        self.record(MockCall::GetBuffer);
        self.lease_calls += 1;

        if self.lease.is_some() {
            return Err(RenderError::Backend(
                "get_buffer called with a lease outstanding".to_string(),
            ));
        }
        if self.lose_on_lease == Some(self.lease_calls) {
            self.device_lost = true;
        }
        if self.device_lost {
            return Err(self.lost());
        }

        let available = self.capacity.saturating_sub(self.queued);
        if self.busy_leases.contains(&self.lease_calls) || frames > available {
            return Err(RenderError::BufferUnavailable {
                requested: frames,
                available,
            });
        }

        self.region = vec![self.silence(); frames as usize * self.block_align()];
        self.lease = Some((frames, self.last_padding));
        Ok(())
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.region
    }

    fn release_buffer(&mut self, frames: u32, flags: BufferFlags) -> Result<(), RenderError> {
        self.record(MockCall::ReleaseBuffer);
        self.commit_calls += 1;

        let Some((leased_frames, padding_before_lease)) = self.lease.take() else {
            return Err(RenderError::Backend(
                "release_buffer called without a lease".to_string(),
            ));
        };
        let bytes = std::mem::take(&mut self.region);

        if self.lose_on_commit == Some(self.commit_calls) {
            self.device_lost = true;
        }
        if self.device_lost {
            return Err(self.lost());
        }

        let valid_len = frames as usize * self.block_align();
        let mut log = self.log.lock();
        if flags.is_silent() {
            let silence = self.format.map_or(0, |f| f.silence_byte());
            log.rendered
                .extend(std::iter::repeat(silence).take(valid_len));
        } else {
            log.rendered.extend_from_slice(&bytes[..valid_len]);
        }
        log.commits.push(CommitRecord {
            leased_frames,
            valid_frames: frames,
            flags,
            padding_before_lease,
            bytes,
        });
        drop(log);

        self.queued += frames;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RenderError> {
        self.record(MockCall::Stop);
        if self.device_lost {
            return Err(self.lost());
        }
        if self.fail_stop {
            return Err(RenderError::Backend("mock stop failure".to_string()));
        }
        Ok(())
    }

    fn release_client(&mut self) -> Result<(), RenderError> {
        self.record(MockCall::ReleaseClient);
        if self.device_lost {
            return Err(self.lost());
        }
        if self.fail_release_client {
            return Err(RenderError::Backend(
                "mock client release failure".to_string(),
            ));
        }
        Ok(())
    }

    fn release_render_buffer(&mut self) -> Result<(), RenderError> {
        self.record(MockCall::ReleaseRenderBuffer);
        if self.device_lost {
            return Err(self.lost());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized(backend: &mut MockBackend) {
        let format = AudioFormat::pcm(8000, 1, 16).unwrap();
        backend.initialize(&format, Duration::from_secs(1)).unwrap();
        backend.start().unwrap();
    }

    #[test]
    fn test_mock_capacity_from_duration() {
        let mut backend = MockBackend::new();
        initialized(&mut backend);
        assert_eq!(backend.capacity, 8000);
    }

    #[test]
    fn test_mock_capacity_override() {
        let mut backend = MockBackend::new().capacity(100);
        initialized(&mut backend);
        assert!(matches!(
            backend.get_buffer(101),
            Err(RenderError::BufferUnavailable {
                requested: 101,
                available: 100
            })
        ));
    }

    #[test]
    fn test_mock_padding_drains_per_poll() {
        let mut backend = MockBackend::new().frames_per_poll(100);
        initialized(&mut backend);

        backend.get_buffer(250).unwrap();
        backend.release_buffer(250, BufferFlags::NONE).unwrap();

        assert_eq!(backend.current_padding().unwrap(), 150);
        assert_eq!(backend.current_padding().unwrap(), 50);
        assert_eq!(backend.current_padding().unwrap(), 0);
        assert_eq!(backend.current_padding().unwrap(), 0);
    }

    #[test]
    fn test_mock_device_loss_is_sticky() {
        let mut backend = MockBackend::new().lose_device_on_padding(2);
        initialized(&mut backend);

        assert!(backend.current_padding().is_ok());
        assert!(backend.current_padding().unwrap_err().is_device_lost());
        assert!(backend.get_buffer(1).unwrap_err().is_device_lost());
        assert!(backend.stop().unwrap_err().is_device_lost());
    }

    #[test]
    fn test_mock_records_silent_commit_as_silence() {
        let mut backend = MockBackend::new();
        let probe = backend.probe();
        let format = AudioFormat::pcm(8000, 1, 8).unwrap();
        backend.initialize(&format, Duration::from_secs(1)).unwrap();

        backend.get_buffer(3).unwrap();
        backend.buffer_mut().fill(1);
        backend.release_buffer(3, BufferFlags::SILENT).unwrap();

        assert_eq!(probe.rendered_bytes(), vec![0x80, 0x80, 0x80]);
    }

    #[test]
    fn test_mock_busy_lease() {
        let mut backend = MockBackend::new().busy_on_lease(1);
        initialized(&mut backend);

        assert!(backend.get_buffer(10).unwrap_err().is_transient());
        assert!(backend.get_buffer(10).is_ok());
    }

    #[test]
    fn test_mock_rejects_unpaired_release() {
        let mut backend = MockBackend::new();
        initialized(&mut backend);
        assert!(matches!(
            backend.release_buffer(1, BufferFlags::NONE),
            Err(RenderError::Backend(_))
        ));
    }
}
