//! Runtime events for monitoring playback.
//!
//! Events are notifications about what the engine is doing. They never
//! change control flow; use them for status lines, logging or metrics.

use std::sync::Arc;
use std::time::Duration;

use crate::report::TeardownStep;
use crate::AudioFormat;

/// Runtime events emitted during playback.
///
/// # Example
///
/// ```
/// use stream_playback::PlaybackEvent;
///
/// fn handle_event(event: PlaybackEvent) {
///     match event {
///         PlaybackEvent::Started { device, format, .. } => {
///             eprintln!("Playing {} on {}", format, device);
///         }
///         PlaybackEvent::Paused { position } => {
///             eprintln!("Paused at {:?}", position);
///         }
///         PlaybackEvent::DeviceLost { reason } => {
///             eprintln!("Device lost: {}", reason);
///         }
///         other => eprintln!("{:?}", other),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// The session started and the first chunk is about to be leased.
    Started {
        /// Endpoint name.
        device: String,
        /// Format of the stream.
        format: AudioFormat,
        /// Sink buffer capacity in frames.
        capacity_frames: u32,
        /// Total duration of the source.
        duration: Duration,
    },

    /// Playback was paused.
    ///
    /// Already queued frames keep playing out; no new chunks are submitted.
    Paused {
        /// Position of the last committed frame.
        position: Duration,
    },

    /// Playback resumed after a pause.
    Resumed {
        /// Position of the last committed frame.
        position: Duration,
    },

    /// The user asked to quit.
    QuitRequested {
        /// Position of the last committed frame.
        position: Duration,
    },

    /// The sink went away; playback ends without draining.
    DeviceLost {
        /// Description from the backend.
        reason: String,
    },

    /// The source was fully submitted (or ran dry early).
    SourceExhausted {
        /// Sample-data bytes committed.
        bytes_consumed: u64,
        /// Declared sample-data length.
        total_bytes: u64,
    },

    /// All queued frames were played.
    Drained,

    /// A teardown step failed and was suppressed.
    TeardownFailed {
        /// The step that failed.
        step: TeardownStep,
        /// The backend's error message.
        error: String,
    },
}

/// Callback type for receiving runtime events.
///
/// Register an event callback via [`PlayerBuilder::on_event()`] or
/// [`StreamEngine::with_event_callback()`].
///
/// [`PlayerBuilder::on_event()`]: crate::PlayerBuilder::on_event
/// [`StreamEngine::with_event_callback()`]: crate::StreamEngine::with_event_callback
pub type EventCallback = Arc<dyn Fn(PlaybackEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use stream_playback::{event_callback, PlaybackEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// callback(PlaybackEvent::Drained);
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(PlaybackEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_event_debug() {
        let event = PlaybackEvent::Paused {
            position: Duration::from_millis(1500),
        };
        let debug = format!("{:?}", event);
        assert!(debug.contains("Paused"));
        assert!(debug.contains("1.5"));
    }

    #[test]
    fn test_playback_event_clone() {
        let event = PlaybackEvent::TeardownFailed {
            step: TeardownStep::ReleaseClient,
            error: "busy".to_string(),
        };
        let cloned = event.clone();
        if let PlaybackEvent::TeardownFailed { step, error } = cloned {
            assert_eq!(step, TeardownStep::ReleaseClient);
            assert_eq!(error, "busy");
        } else {
            panic!("Expected TeardownFailed variant");
        }
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(PlaybackEvent::Drained);
        assert!(called.load(Ordering::SeqCst));
    }
}
