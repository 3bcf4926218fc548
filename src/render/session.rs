//! Render session lifecycle and buffer leases.

use std::fmt;
use std::time::Duration;

use crate::render::{BufferFlags, RenderBackend};
use crate::report::{TeardownReport, TeardownStep};
use crate::{AudioFormat, RenderError};

/// Lifecycle state of a [`RenderSession`].
///
/// Transitions are strictly one-directional. A stopped session is never
/// restarted: a fresh session is created instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Bound to an endpoint, nothing negotiated yet.
    Created,
    /// Format and buffer capacity negotiated.
    Initialized,
    /// Rendering; leases and padding queries are accepted.
    Started,
    /// Rendering stopped.
    Stopped,
    /// All backend resources released.
    Released,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Released => "released",
        };
        f.write_str(name)
    }
}

/// Exclusive connection to one render endpoint for one playback.
///
/// # Lifecycle
///
/// 1. [`new()`](Self::new) binds a backend (`Created`)
/// 2. [`initialize()`](Self::initialize) negotiates format and capacity (`Initialized`)
/// 3. [`start()`](Self::start) begins rendering (`Started`)
/// 4. [`lease_buffer()`](Self::lease_buffer) / [`RenderBufferLease::commit()`] cycles
/// 5. [`shutdown()`](Self::shutdown) stops and releases everything, suppressing errors
///
/// Dropping a session that was not shut down performs the same best-effort
/// teardown.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use stream_playback::{AudioFormat, BufferFlags, MockBackend, RenderSession};
///
/// let format = AudioFormat::pcm(44100, 2, 16).unwrap();
/// let mut session = RenderSession::new(MockBackend::new());
/// let capacity = session.initialize(format, Duration::from_secs(2)).unwrap();
/// assert_eq!(capacity, 88200);
///
/// session.start().unwrap();
/// let mut lease = session.lease_buffer(1024).unwrap();
/// lease.as_mut_bytes().fill(0);
/// lease.commit(1024, BufferFlags::NONE).unwrap();
///
/// assert!(session.shutdown().is_clean());
/// ```
pub struct RenderSession<B: RenderBackend> {
    backend: B,
    state: SessionState,
    format: Option<AudioFormat>,
    capacity_frames: u32,
}

impl<B: RenderBackend> RenderSession<B> {
    /// Binds a session to a backend.
    pub fn new(backend: B) -> Self {
        tracing::debug!("RenderSession created on {}", backend.name());
        Self {
            backend,
            state: SessionState::Created,
            format: None,
            capacity_frames: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The negotiated format, once initialized.
    pub fn format(&self) -> Option<&AudioFormat> {
        self.format.as_ref()
    }

    /// Buffer capacity in frames (0 before initialization).
    pub fn capacity_frames(&self) -> u32 {
        self.capacity_frames
    }

    /// Name of the bound endpoint.
    pub fn device_name(&self) -> &str {
        self.backend.name()
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Negotiates `format` and a buffer of `buffer_duration` with the sink.
    ///
    /// Returns the buffer capacity in frames. Must be called exactly once;
    /// after a failure the session stays `Created` and should be discarded.
    ///
    /// # Errors
    ///
    /// `FormatRejected` if the sink cannot honor the format or the buffer
    /// would hold no whole frame, `DeviceUnavailable` if the endpoint cannot
    /// be activated, `InvalidState` if not `Created`.
    pub fn initialize(
        &mut self,
        format: AudioFormat,
        buffer_duration: Duration,
    ) -> Result<u32, RenderError> {
        self.require(SessionState::Created, "initialize")?;

        let capacity = self.backend.initialize(&format, buffer_duration)?;
        if capacity == 0 {
            return Err(RenderError::FormatRejected {
                format: format.to_string(),
                reason: format!("a {buffer_duration:?} buffer holds no whole frame"),
            });
        }
        tracing::info!(
            device = self.backend.name(),
            %format,
            capacity_frames = capacity,
            "render session initialized"
        );

        self.format = Some(format);
        self.capacity_frames = capacity;
        self.state = SessionState::Initialized;
        Ok(capacity)
    }

    /// Starts rendering.
    ///
    /// # Errors
    ///
    /// `InvalidState` if not `Initialized`, or a backend error.
    pub fn start(&mut self) -> Result<(), RenderError> {
        self.require(SessionState::Initialized, "start")?;
        self.backend.start()?;
        self.state = SessionState::Started;
        tracing::debug!("render session started on {}", self.backend.name());
        Ok(())
    }

    /// Frames already queued to the sink but not yet played.
    ///
    /// This is the only backpressure signal; it never blocks.
    ///
    /// # Errors
    ///
    /// `InvalidState` if not `Started`, `DeviceLost` if the sink went away.
    pub fn current_padding_frames(&mut self) -> Result<u32, RenderError> {
        self.require(SessionState::Started, "query padding")?;
        self.backend.current_padding()
    }

    /// Leases the next `frames` frames of the buffer for writing.
    ///
    /// The lease borrows the session mutably, so no other lease can be
    /// outstanding until it is committed.
    ///
    /// # Errors
    ///
    /// `BufferUnavailable` if the sink cannot hold `frames` more frames right
    /// now, `DeviceLost` if the sink went away, `InvalidState` if not `Started`.
    pub fn lease_buffer(&mut self, frames: u32) -> Result<RenderBufferLease<'_, B>, RenderError> {
        self.require(SessionState::Started, "lease a buffer")?;
        self.backend.get_buffer(frames)?;
        Ok(RenderBufferLease {
            session: self,
            frames,
            committed: false,
        })
    }

    /// Stops rendering.
    ///
    /// No-op on an already stopped session. The session counts as stopped
    /// even if the backend reports an error.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless `Started` or `Stopped`, or the backend's error.
    pub fn stop(&mut self) -> Result<(), RenderError> {
        match self.state {
            SessionState::Stopped => Ok(()),
            SessionState::Started => {
                self.state = SessionState::Stopped;
                self.backend.stop()
            }
            state => Err(RenderError::InvalidState {
                operation: "stop",
                state,
            }),
        }
    }

    /// Releases the client and the dependent render-buffer handle.
    ///
    /// Both releases are attempted even if the first fails; the first error
    /// is returned. No-op on an already released session.
    ///
    /// # Errors
    ///
    /// `InvalidState` while still `Started`, or the first backend error.
    pub fn release(&mut self) -> Result<(), RenderError> {
        match self.state {
            SessionState::Released => Ok(()),
            SessionState::Started => Err(RenderError::InvalidState {
                operation: "release",
                state: self.state,
            }),
            _ => {
                self.state = SessionState::Released;
                let client = self.backend.release_client();
                let render_buffer = self.backend.release_render_buffer();
                client.and(render_buffer)
            }
        }
    }

    /// Stops and releases everything, continuing past individual failures.
    ///
    /// Every error is logged and recorded in the returned report; none is
    /// propagated.
    pub fn shutdown(mut self) -> TeardownReport {
        self.teardown()
    }

    fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();

        if self.state == SessionState::Started {
            self.state = SessionState::Stopped;
            if let Err(e) = self.backend.stop() {
                report.record(TeardownStep::Stop, &e);
            }
        }

        if self.state != SessionState::Released {
            self.state = SessionState::Released;
            if let Err(e) = self.backend.release_client() {
                report.record(TeardownStep::ReleaseClient, &e);
            }
            if let Err(e) = self.backend.release_render_buffer() {
                report.record(TeardownStep::ReleaseRenderBuffer, &e);
            }
            tracing::debug!(
                suppressed = report.suppressed.len(),
                "render session on {} released",
                self.backend.name()
            );
        }

        report
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<(), RenderError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RenderError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

impl<B: RenderBackend> Drop for RenderSession<B> {
    fn drop(&mut self) {
        if self.state != SessionState::Released {
            let _ = self.teardown();
        }
    }
}

/// Exclusive write access to `frames` frames of the sink's buffer.
///
/// Obtained from [`RenderSession::lease_buffer`] and released exactly once
/// by [`commit`](Self::commit). A lease dropped without commit is released
/// with zero valid frames and the silent flag.
#[must_use = "a lease must be committed to hand its frames to the sink"]
pub struct RenderBufferLease<'a, B: RenderBackend> {
    session: &'a mut RenderSession<B>,
    frames: u32,
    committed: bool,
}

impl<B: RenderBackend> RenderBufferLease<'_, B> {
    /// Number of frames held by this lease.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// The writable region, exactly `frames * block_align` bytes.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        self.session.backend.buffer_mut()
    }

    /// Releases the lease, declaring how many leading frames are valid audio.
    ///
    /// After commit the region belongs to the sink.
    ///
    /// # Errors
    ///
    /// `CommitOverrun` if `valid_frames` exceeds the lease (the region is then
    /// released as silence), `DeviceLost` if the sink went away.
    pub fn commit(mut self, valid_frames: u32, flags: BufferFlags) -> Result<(), RenderError> {
        self.committed = true;

        if valid_frames > self.frames {
            let _ = self.session.backend.release_buffer(0, BufferFlags::SILENT);
            return Err(RenderError::CommitOverrun {
                valid: valid_frames,
                leased: self.frames,
            });
        }

        self.session.backend.release_buffer(valid_frames, flags)
    }
}

impl<B: RenderBackend> Drop for RenderBufferLease<'_, B> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::warn!(
                frames = self.frames,
                "buffer lease dropped without commit, releasing as silence"
            );
            let _ = self.session.backend.release_buffer(0, BufferFlags::SILENT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{MockBackend, MockCall};

    fn cd_format() -> AudioFormat {
        AudioFormat::pcm(44100, 2, 16).unwrap()
    }

    fn started(backend: MockBackend) -> RenderSession<MockBackend> {
        let mut session = RenderSession::new(backend);
        session.initialize(cd_format(), Duration::from_secs(2)).unwrap();
        session.start().unwrap();
        session
    }

    #[test]
    fn test_session_lifecycle_in_order() {
        let mut session = RenderSession::new(MockBackend::new());
        assert_eq!(session.state(), SessionState::Created);

        let capacity = session.initialize(cd_format(), Duration::from_secs(2)).unwrap();
        assert_eq!(capacity, 88200);
        assert_eq!(session.capacity_frames(), 88200);
        assert_eq!(session.state(), SessionState::Initialized);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Started);

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);

        session.release().unwrap();
        assert_eq!(session.state(), SessionState::Released);
    }

    #[test]
    fn test_start_before_initialize_is_invalid() {
        let mut session = RenderSession::new(MockBackend::new());
        let err = session.start().unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidState {
                operation: "start",
                state: SessionState::Created
            }
        ));
    }

    #[test]
    fn test_initialize_rejects_buffer_shorter_than_a_frame() {
        let mut session = RenderSession::new(MockBackend::new());
        let err = session
            .initialize(cd_format(), Duration::from_micros(10))
            .unwrap_err();
        assert!(matches!(err, RenderError::FormatRejected { .. }));
        assert_eq!(session.state(), SessionState::Created);
        assert_eq!(session.capacity_frames(), 0);
    }

    #[test]
    fn test_initialize_twice_is_invalid() {
        let mut session = RenderSession::new(MockBackend::new());
        session.initialize(cd_format(), Duration::from_secs(2)).unwrap();
        let err = session
            .initialize(cd_format(), Duration::from_secs(2))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidState { .. }));
    }

    #[test]
    fn test_lease_requires_started() {
        let mut session = RenderSession::new(MockBackend::new());
        session.initialize(cd_format(), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            session.lease_buffer(1024),
            Err(RenderError::InvalidState { .. })
        ));
        assert!(matches!(
            session.current_padding_frames(),
            Err(RenderError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_stopped_session_cannot_restart() {
        let mut session = started(MockBackend::new());
        session.stop().unwrap();
        assert!(matches!(
            session.start(),
            Err(RenderError::InvalidState {
                state: SessionState::Stopped,
                ..
            })
        ));
    }

    #[test]
    fn test_stop_and_release_are_idempotent() {
        let mut session = started(MockBackend::new());
        session.stop().unwrap();
        session.stop().unwrap();
        session.release().unwrap();
        session.release().unwrap();
    }

    #[test]
    fn test_release_while_started_is_invalid() {
        let mut session = started(MockBackend::new());
        assert!(matches!(
            session.release(),
            Err(RenderError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_format_rejection_leaves_session_created() {
        let mut session = RenderSession::new(MockBackend::new().reject_format());
        let err = session
            .initialize(cd_format(), Duration::from_secs(2))
            .unwrap_err();
        assert!(matches!(err, RenderError::FormatRejected { .. }));
        assert_eq!(session.state(), SessionState::Created);
        assert!(session.format().is_none());
    }

    #[test]
    fn test_commit_hands_frames_to_sink() {
        let backend = MockBackend::new().frames_per_poll(0);
        let probe = backend.probe();
        let mut session = started(backend);

        let mut lease = session.lease_buffer(4).unwrap();
        assert_eq!(lease.frames(), 4);
        assert_eq!(lease.as_mut_bytes().len(), 16);
        lease.as_mut_bytes()[0] = 7;
        lease.commit(4, BufferFlags::NONE).unwrap();

        assert_eq!(session.current_padding_frames().unwrap(), 4);
        let commits = probe.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].valid_frames, 4);
        assert_eq!(commits[0].bytes[0], 7);
    }

    #[test]
    fn test_commit_overrun_releases_silence() {
        let backend = MockBackend::new();
        let probe = backend.probe();
        let mut session = started(backend);

        let lease = session.lease_buffer(4).unwrap();
        let err = lease.commit(5, BufferFlags::NONE).unwrap_err();
        assert!(matches!(err, RenderError::CommitOverrun { valid: 5, leased: 4 }));

        let commits = probe.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].valid_frames, 0);
        assert!(commits[0].flags.is_silent());
    }

    #[test]
    fn test_dropped_lease_is_released_once() {
        let backend = MockBackend::new();
        let probe = backend.probe();
        let mut session = started(backend);

        {
            let _lease = session.lease_buffer(8).unwrap();
        }

        assert_eq!(probe.count(MockCall::ReleaseBuffer), 1);
        assert!(probe.commits()[0].flags.is_silent());
        // The next lease goes through normally
        let lease = session.lease_buffer(8).unwrap();
        lease.commit(8, BufferFlags::NONE).unwrap();
        assert_eq!(probe.count(MockCall::ReleaseBuffer), 2);
    }

    #[test]
    fn test_shutdown_suppresses_every_failure() {
        let backend = MockBackend::new()
            .fail_stop()
            .fail_release_client();
        let probe = backend.probe();
        let session = started(backend);

        let report = session.shutdown();
        assert!(!report.is_clean());
        assert_eq!(report.suppressed.len(), 2);
        assert_eq!(report.suppressed[0].step, TeardownStep::Stop);
        assert_eq!(report.suppressed[1].step, TeardownStep::ReleaseClient);

        // The dependent handle is still released after the client failed
        assert_eq!(probe.count(MockCall::ReleaseRenderBuffer), 1);
    }

    #[test]
    fn test_drop_tears_down() {
        let backend = MockBackend::new();
        let probe = backend.probe();
        drop(started(backend));

        assert_eq!(probe.count(MockCall::Stop), 1);
        assert_eq!(probe.count(MockCall::ReleaseClient), 1);
        assert_eq!(probe.count(MockCall::ReleaseRenderBuffer), 1);
    }

    #[test]
    fn test_shutdown_of_unstarted_session_skips_stop() {
        let backend = MockBackend::new();
        let probe = backend.probe();
        let mut session = RenderSession::new(backend);
        session.initialize(cd_format(), Duration::from_secs(2)).unwrap();

        assert!(session.shutdown().is_clean());
        assert_eq!(probe.count(MockCall::Stop), 0);
        assert_eq!(probe.count(MockCall::ReleaseClient), 1);
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Initialized.to_string(), "initialized");
        assert_eq!(SessionState::Released.to_string(), "released");
    }
}
