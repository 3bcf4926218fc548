//! Lease/fill/commit loop with padding backpressure and drain.

use std::thread;
use std::time::Duration;

use crate::event::EventCallback;
use crate::input::{InputController, InputEvent};
use crate::pipeline::{PlaybackState, StreamProgress};
use crate::render::{BufferFlags, RenderBackend, RenderSession, SessionState};
use crate::report::{PlaybackOutcome, PlaybackReport, TeardownReport};
use crate::source::SourceReader;
use crate::{AudioFormat, PlaybackConfig, PlaybackError, PlaybackEvent, RenderError};

/// Per-run counters folded into the report.
#[derive(Debug, Default)]
struct LoopStats {
    cycles: u64,
    skipped_iterations: u64,
    buffer_retries: u64,
    pauses: u64,
}

/// Drives one playback from a source into a started render session.
///
/// Each iteration polls input, then (while playing) checks the sink's padding
/// and, if the sink holds less than one chunk, leases a chunk, fills it from
/// the source and commits it. When the source is exhausted or the user
/// quits, the engine waits for the sink to drain and tears the session down.
///
/// Device loss ends playback early but is not an error: it is reported as
/// [`PlaybackOutcome::DeviceLost`].
///
/// # Example
///
/// ```
/// use stream_playback::source::{MockSource, SourceReader};
/// use stream_playback::{
///     MockBackend, NoInput, PlaybackConfig, PlaybackOutcome, RenderSession, StreamEngine,
/// };
///
/// let mut mock = MockSource::cd();
/// mock.generate_sine(440.0, 250);
/// let mut source = mock.into_source().unwrap();
///
/// let config = PlaybackConfig::default();
/// let mut session = RenderSession::new(MockBackend::new());
/// session.initialize(source.format(), config.buffer_duration).unwrap();
/// session.start().unwrap();
///
/// let report = StreamEngine::new(config).run(session, &mut source, &mut NoInput).unwrap();
/// assert_eq!(report.outcome, PlaybackOutcome::Completed);
/// assert_eq!(report.bytes_consumed, report.total_bytes);
/// ```
pub struct StreamEngine {
    config: PlaybackConfig,
    event_callback: Option<EventCallback>,
}

impl StreamEngine {
    /// Creates an engine with the given configuration.
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            event_callback: None,
        }
    }

    /// Sets the callback that receives [`PlaybackEvent`]s.
    #[must_use]
    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Streams `source` into `session` until the source is exhausted, the
    /// user quits, or the device is lost; then drains and tears down.
    ///
    /// The session must be started and initialized with the source's format.
    /// It is always torn down before this returns.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` for an unusable configuration, a chunk larger than
    ///   the sink's capacity, or a source whose format differs from the session's
    /// - `Render` for a session that is not started, or any sink failure
    ///   other than device loss and transient buffer unavailability
    /// - `Source` if reading the source fails
    pub fn run<B, S, I>(
        &self,
        mut session: RenderSession<B>,
        source: &mut S,
        input: &mut I,
    ) -> Result<PlaybackReport, PlaybackError>
    where
        B: RenderBackend,
        S: SourceReader + ?Sized,
        I: InputController + ?Sized,
    {
        let format = match self.preflight(&session, source) {
            Ok(format) => format,
            Err(e) => {
                self.teardown(session);
                return Err(e);
            }
        };

        let mut progress = StreamProgress::new(source.total_bytes());
        let mut stats = LoopStats::default();

        tracing::info!(
            device = session.device_name(),
            %format,
            chunk_frames = self.config.chunk_frames,
            total_bytes = progress.total(),
            "playback started"
        );
        self.emit(PlaybackEvent::Started {
            device: session.device_name().to_string(),
            format,
            capacity_frames: session.capacity_frames(),
            duration: source.duration(),
        });

        let outcome = match self.stream(
            &mut session,
            &format,
            source,
            input,
            &mut progress,
            &mut stats,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("playback aborted: {}", e);
                self.teardown(session);
                return Err(e);
            }
        };

        if matches!(
            outcome,
            PlaybackOutcome::Completed | PlaybackOutcome::SourceTruncated
        ) {
            self.emit(PlaybackEvent::SourceExhausted {
                bytes_consumed: progress.consumed(),
                total_bytes: progress.total(),
            });
        }

        // A lost sink has nothing left to play
        let drained = outcome != PlaybackOutcome::DeviceLost && self.drain(&mut session);

        let teardown = self.teardown(session);

        tracing::info!(
            %outcome,
            bytes_consumed = progress.consumed(),
            cycles = stats.cycles,
            skipped = stats.skipped_iterations,
            drained,
            "playback finished"
        );

        Ok(PlaybackReport {
            outcome,
            bytes_consumed: progress.consumed(),
            total_bytes: progress.total(),
            cycles: stats.cycles,
            skipped_iterations: stats.skipped_iterations,
            buffer_retries: stats.buffer_retries,
            pauses: stats.pauses,
            drained,
            teardown,
        })
    }

    fn preflight<B, S>(
        &self,
        session: &RenderSession<B>,
        source: &S,
    ) -> Result<AudioFormat, PlaybackError>
    where
        B: RenderBackend,
        S: SourceReader + ?Sized,
    {
        self.config.validate()?;

        if session.state() != SessionState::Started {
            return Err(RenderError::InvalidState {
                operation: "run playback",
                state: session.state(),
            }
            .into());
        }

        let format = source.format();
        if session.format() != Some(&format) {
            return Err(PlaybackError::invalid_config(format!(
                "source format {} does not match session format {}",
                format,
                session
                    .format()
                    .map_or_else(|| "none".to_string(), ToString::to_string)
            )));
        }

        if self.config.chunk_frames > session.capacity_frames() {
            return Err(PlaybackError::invalid_config(format!(
                "chunk of {} frames exceeds sink capacity of {} frames",
                self.config.chunk_frames,
                session.capacity_frames()
            )));
        }

        Ok(format)
    }

    fn stream<B, S, I>(
        &self,
        session: &mut RenderSession<B>,
        format: &AudioFormat,
        source: &mut S,
        input: &mut I,
        progress: &mut StreamProgress,
        stats: &mut LoopStats,
    ) -> Result<PlaybackOutcome, PlaybackError>
    where
        B: RenderBackend,
        S: SourceReader + ?Sized,
        I: InputController + ?Sized,
    {
        let chunk = self.config.chunk_frames;
        let mut state = PlaybackState::Playing;

        loop {
            if progress.is_complete() {
                tracing::debug!("source exhausted after {} cycles", stats.cycles);
                return Ok(PlaybackOutcome::Completed);
            }

            match input.poll() {
                InputEvent::Quit => {
                    tracing::info!("quit requested");
                    self.emit(PlaybackEvent::QuitRequested {
                        position: position(format, progress),
                    });
                    return Ok(PlaybackOutcome::Quit);
                }
                InputEvent::Toggle => {
                    state = state.toggled();
                    let position = position(format, progress);
                    if state.is_paused() {
                        stats.pauses += 1;
                        tracing::info!(?position, "paused");
                        self.emit(PlaybackEvent::Paused { position });
                    } else {
                        tracing::info!(?position, "resumed");
                        self.emit(PlaybackEvent::Resumed { position });
                    }
                }
                InputEvent::NoEvent => {}
            }

            if state.is_paused() {
                thread::sleep(self.config.pause_poll_interval);
                continue;
            }

            let padding = match session.current_padding_frames() {
                Ok(padding) => padding,
                Err(e) if e.is_device_lost() => return Ok(self.device_lost(&e)),
                Err(e) => return Err(e.into()),
            };
            if padding >= chunk {
                stats.skipped_iterations += 1;
                if let Some(backoff) = self.config.busy_poll_backoff {
                    thread::sleep(backoff);
                }
                continue;
            }

            let mut lease = match session.lease_buffer(chunk) {
                Ok(lease) => lease,
                Err(e) if e.is_transient() => {
                    stats.buffer_retries += 1;
                    tracing::debug!("lease refused, retrying: {}", e);
                    continue;
                }
                Err(e) if e.is_device_lost() => return Ok(self.device_lost(&e)),
                Err(e) => return Err(e.into()),
            };

            let region = lease.as_mut_bytes();
            let want = region
                .len()
                .min(usize::try_from(progress.remaining()).unwrap_or(usize::MAX));
            let read = match source.read_into(&mut region[..want]) {
                Ok(read) => read,
                Err(e) => {
                    if let Err(release) = lease.commit(0, BufferFlags::SILENT) {
                        tracing::debug!("releasing lease after read failure: {}", release);
                    }
                    return Err(e.into());
                }
            };

            if read == 0 {
                tracing::warn!(
                    consumed = progress.consumed(),
                    total = progress.total(),
                    "source ended before its declared length"
                );
                return match lease.commit(0, BufferFlags::SILENT) {
                    Err(e) if e.is_device_lost() => Ok(self.device_lost(&e)),
                    Err(e) => Err(e.into()),
                    Ok(()) => Ok(PlaybackOutcome::SourceTruncated),
                };
            }

            // The full chunk is committed; a short final read leaves silence behind it
            match lease.commit(chunk, BufferFlags::NONE) {
                Ok(()) => {}
                Err(e) if e.is_device_lost() => return Ok(self.device_lost(&e)),
                Err(e) => return Err(e.into()),
            }

            progress.advance(read as u64);
            stats.cycles += 1;
            tracing::trace!(
                cycle = stats.cycles,
                padding,
                read,
                consumed = progress.consumed(),
                "chunk committed"
            );
        }
    }

    /// Waits until the sink has played every queued frame.
    ///
    /// Returns `false` if the padding query failed.
    fn drain<B: RenderBackend>(&self, session: &mut RenderSession<B>) -> bool {
        tracing::debug!("draining render buffer");
        loop {
            match session.current_padding_frames() {
                Ok(0) => {
                    tracing::debug!("render buffer drained");
                    self.emit(PlaybackEvent::Drained);
                    return true;
                }
                Ok(padding) => {
                    tracing::trace!(padding, "waiting for drain");
                    thread::sleep(self.config.drain_poll_interval);
                }
                Err(e) if e.is_device_lost() => {
                    self.device_lost(&e);
                    return false;
                }
                Err(e) => {
                    tracing::warn!("drain aborted: {}", e);
                    return false;
                }
            }
        }
    }

    fn teardown<B: RenderBackend>(&self, session: RenderSession<B>) -> TeardownReport {
        let report = session.shutdown();
        for failure in &report.suppressed {
            self.emit(PlaybackEvent::TeardownFailed {
                step: failure.step,
                error: failure.error.clone(),
            });
        }
        report
    }

    fn device_lost(&self, error: &RenderError) -> PlaybackOutcome {
        tracing::warn!("render device lost, ending playback: {}", error);
        let reason = match error {
            RenderError::DeviceLost { reason } => reason.clone(),
            other => other.to_string(),
        };
        self.emit(PlaybackEvent::DeviceLost { reason });
        PlaybackOutcome::DeviceLost
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}

fn position(format: &AudioFormat, progress: &StreamProgress) -> Duration {
    format.duration_of_frames(progress.consumed() / format.block_align() as u64)
}
