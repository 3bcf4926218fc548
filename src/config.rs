//! Configuration types for playback.

use std::time::Duration;

use crate::PlaybackError;

/// Frames per lease/commit cycle unless configured otherwise.
pub const DEFAULT_CHUNK_FRAMES: u32 = 1024;

/// Configuration for the streaming engine and session setup.
///
/// Use [`PlaybackConfig::default()`] for the stock behavior, or customize as needed.
///
/// # Example
///
/// ```
/// use stream_playback::PlaybackConfig;
/// use std::time::Duration;
///
/// let config = PlaybackConfig {
///     chunk_frames: 512,
///     busy_poll_backoff: Some(Duration::from_millis(1)),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Frames written per lease/commit cycle.
    ///
    /// Also the backpressure threshold: a new chunk is only leased while the
    /// sink holds fewer than this many queued frames.
    /// Default: 1024
    pub chunk_frames: u32,

    /// Buffer duration requested from the sink at initialization.
    ///
    /// Default: 2 seconds
    pub buffer_duration: Duration,

    /// Sleep between iterations while paused.
    ///
    /// Default: 100ms
    pub pause_poll_interval: Duration,

    /// Sleep between padding checks while draining.
    ///
    /// Default: 100ms
    pub drain_poll_interval: Duration,

    /// Optional sleep when the sink already holds a full chunk.
    ///
    /// `None` keeps the busy-poll: the loop re-polls immediately, trading a
    /// core for the lowest resume latency.
    /// Default: `None`
    pub busy_poll_backoff: Option<Duration>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            buffer_duration: Duration::from_secs(2),
            pause_poll_interval: Duration::from_millis(100),
            drain_poll_interval: Duration::from_millis(100),
            busy_poll_backoff: None,
        }
    }
}

impl PlaybackConfig {
    /// Checks the configuration for values no session could honor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero chunk size or a zero buffer duration.
    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.chunk_frames == 0 {
            return Err(PlaybackError::invalid_config("chunk_frames must be > 0"));
        }
        if self.buffer_duration.is_zero() {
            return Err(PlaybackError::invalid_config(
                "buffer_duration must be > 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_config_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.chunk_frames, 1024);
        assert_eq!(config.buffer_duration, Duration::from_secs(2));
        assert_eq!(config.pause_poll_interval, Duration::from_millis(100));
        assert_eq!(config.drain_poll_interval, Duration::from_millis(100));
        assert_eq!(config.busy_poll_backoff, None);
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(PlaybackConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let config = PlaybackConfig {
            chunk_frames: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let config = PlaybackConfig {
            buffer_duration: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
