//! Error types for stream-playback.
//!
//! Errors are split into three layers:
//! - **Render errors** ([`RenderError`]): the sink taxonomy raised by a
//!   [`RenderSession`](crate::RenderSession). Some are fatal, some are
//!   recovered inside the engine (see [`RenderError::is_device_lost`] and
//!   [`RenderError::is_transient`]).
//! - **Source errors** ([`SourceError`]): opening or reading the waveform container.
//! - **Playback errors** ([`PlaybackError`]): what callers of the engine and
//!   [`Player`](crate::Player) see. Device loss never reaches this layer.

use std::path::PathBuf;

use crate::render::SessionState;

/// Errors raised by a render session or its backend.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The sink cannot honor the requested PCM format.
    #[error("format rejected: {format} - {reason}")]
    FormatRejected {
        /// Human-readable description of the format that was requested.
        format: String,
        /// Why the sink refused it.
        reason: String,
    },

    /// The endpoint could not be activated.
    #[error("device unavailable: {device} - {reason}")]
    DeviceUnavailable {
        /// Name of the endpoint.
        device: String,
        /// Reason the endpoint could not be activated.
        reason: String,
    },

    /// An operation was called out of lifecycle order.
    ///
    /// This is a contract violation and indicates a bug in the caller.
    #[error("invalid state: cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// Lifecycle state the session was in.
        state: SessionState,
    },

    /// The sink cannot currently hand out the requested number of frames.
    #[error("buffer unavailable: requested {requested} frames, {available} writable")]
    BufferUnavailable {
        /// Frames requested by the caller.
        requested: u32,
        /// Frames the sink could have provided.
        available: u32,
    },

    /// The sink became unusable mid-session (e.g. the device was unplugged).
    #[error("device lost: {reason}")]
    DeviceLost {
        /// Description from the backend.
        reason: String,
    },

    /// A commit declared more valid frames than were leased.
    #[error("commit of {valid} valid frames exceeds lease of {leased} frames")]
    CommitOverrun {
        /// Valid frames declared on commit.
        valid: u32,
        /// Frames held by the lease.
        leased: u32,
    },

    /// An error from the underlying audio library (cpal).
    #[error("audio backend error: {0}")]
    Backend(String),
}

impl RenderError {
    /// Creates a device-lost error with the given reason.
    pub fn device_lost(reason: impl Into<String>) -> Self {
        Self::DeviceLost {
            reason: reason.into(),
        }
    }

    /// Returns `true` for the one fatal-but-expected error the engine recovers from.
    #[must_use]
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Self::DeviceLost { .. })
    }

    /// Returns `true` if retrying on the next iteration is the right response.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BufferUnavailable { .. })
    }
}

/// Errors raised while opening or reading a waveform source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source file could not be opened.
    #[error("file error: {path}: {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The container header could not be parsed.
    #[error("invalid wave file: {0}")]
    Wav(#[from] hound::Error),

    /// The container describes a format this crate cannot stream.
    #[error("unsupported source format: {reason}")]
    UnsupportedFormat {
        /// Why the format is unsupported.
        reason: String,
    },

    /// Reading sample data failed mid-stream.
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
}

impl SourceError {
    /// Creates a file error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an unsupported-format error with the given reason.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            reason: reason.into(),
        }
    }
}

/// Fatal errors that prevent or abort playback.
///
/// Returned from [`StreamEngine::run()`](crate::StreamEngine::run) and the
/// [`Player`](crate::Player) entry points. A lost device is not an error at
/// this level: playback ends early and the outcome is reported in
/// [`PlaybackReport`](crate::PlaybackReport).
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// The render sink failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The waveform source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The requested output device was not found.
    #[error("device not found: {id}")]
    DeviceNotFound {
        /// Identifier that wasn't found.
        id: String,
    },

    /// No default output device is configured on this system.
    #[error("no default output device configured")]
    NoDefaultDevice,

    /// The playback configuration cannot be used.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },

    /// An error from the audio host while enumerating devices.
    #[error("audio backend error: {0}")]
    Backend(String),
}

impl PlaybackError {
    /// Creates an invalid-configuration error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
