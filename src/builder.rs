//! Builder pattern for `Player`.

use std::path::Path;

use crate::input::InputController;
use crate::render::{CpalBackend, DeviceSelection, RenderBackend, RenderSession};
use crate::source::{SourceReader, WavSource};
use crate::{
    event_callback, EventCallback, PlaybackConfig, PlaybackError, PlaybackEvent, PlaybackReport,
    StreamEngine,
};

/// Builder for configuring a [`Player`].
///
/// Use [`Player::builder()`] to create a new builder.
///
/// # Example
///
/// ```no_run
/// use stream_playback::{DeviceSelection, Player, PlaybackConfig, TerminalInput};
///
/// let player = Player::builder()
///     .device(DeviceSelection::SystemDefault)
///     .config(PlaybackConfig::default())
///     .on_event(|e| tracing::info!(?e, "playback event"))
///     .build()?;
///
/// let mut input = TerminalInput::new()?;
/// let report = player.play_file("music.wav", &mut input)?;
/// println!("{}", report.outcome);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[must_use]
pub struct PlayerBuilder {
    device: DeviceSelection,
    config: PlaybackConfig,
    event_callback: Option<EventCallback>,
}

impl Default for PlayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            device: DeviceSelection::default(),
            config: PlaybackConfig::default(),
            event_callback: None,
        }
    }

    /// Set the output device.
    ///
    /// Default: [`DeviceSelection::SystemDefault`]
    pub fn device(mut self, device: DeviceSelection) -> Self {
        self.device = device;
        self
    }

    /// Set the playback configuration.
    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a callback to receive runtime events.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(PlaybackEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Validates the configuration and creates the player.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration cannot be used.
    pub fn build(self) -> Result<Player, PlaybackError> {
        self.config.validate()?;
        Ok(Player {
            device: self.device,
            config: self.config,
            event_callback: self.event_callback,
        })
    }
}

/// Plays waveform sources on a render endpoint.
///
/// Each call opens a fresh session: a stopped session is never reused.
pub struct Player {
    device: DeviceSelection,
    config: PlaybackConfig,
    event_callback: Option<EventCallback>,
}

impl Player {
    /// Creates a new builder for configuring playback.
    pub fn builder() -> PlayerBuilder {
        PlayerBuilder::new()
    }

    /// The selected output device.
    pub fn device(&self) -> &DeviceSelection {
        &self.device
    }

    /// The playback configuration.
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Plays a WAVE file on the selected cpal output device.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, the device cannot be
    /// found or rejects the file's format, or playback fails.
    pub fn play_file<I>(&self, path: impl AsRef<Path>, input: &mut I) -> Result<PlaybackReport, PlaybackError>
    where
        I: InputController + ?Sized,
    {
        let mut source = WavSource::open(path)?;
        let backend =
            CpalBackend::open(&self.device)?.with_chunk_frames(self.config.chunk_frames);
        self.play_on(backend, &mut source, input)
    }

    /// Plays `source` on any render backend.
    ///
    /// Initializes a session with the source's format and the configured
    /// buffer duration, starts it, and runs the engine. Initialization
    /// failures are returned unchanged after the session is released.
    ///
    /// # Errors
    ///
    /// `FormatRejected` / `DeviceUnavailable` from initialization, or any
    /// error from [`StreamEngine::run()`].
    pub fn play_on<B, S, I>(
        &self,
        backend: B,
        source: &mut S,
        input: &mut I,
    ) -> Result<PlaybackReport, PlaybackError>
    where
        B: RenderBackend,
        S: SourceReader + ?Sized,
        I: InputController + ?Sized,
    {
        let mut session = RenderSession::new(backend);

        let setup = session
            .initialize(source.format(), self.config.buffer_duration)
            .and_then(|_| session.start());
        if let Err(e) = setup {
            tracing::warn!("render session setup failed: {}", e);
            let _ = session.shutdown();
            return Err(e.into());
        }

        self.engine().run(session, source, input)
    }

    fn engine(&self) -> StreamEngine {
        let engine = StreamEngine::new(self.config.clone());
        match &self.event_callback {
            Some(callback) => engine.with_event_callback(callback.clone()),
            None => engine,
        }
    }
}
