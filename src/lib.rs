//! # stream-playback
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Streams PCM waveform files to an audio output device under keyboard control.
//!
//! `stream-playback` drives a fixed-capacity render buffer from one
//! synchronous loop: lease a chunk of the buffer, fill it from the source,
//! commit it. The number of frames still queued in the sink (the *padding*)
//! is the only backpressure signal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stream_playback::{Player, TerminalInput};
//!
//! let player = Player::builder()
//!     .on_event(|e| tracing::debug!(?e, "playback event"))
//!     .build()?;
//!
//! // Space pauses/resumes, q quits
//! let mut input = TerminalInput::new()?;
//! let report = player.play_file("music.wav", &mut input)?;
//! println!("{} after {} chunks", report.outcome, report.cycles);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **RenderSession**: lifecycle state machine over a [`RenderBackend`]
//!   (cpal in production, [`MockBackend`] in tests); hands out one
//!   [`RenderBufferLease`] at a time
//! - **SourceReader**: sequential PCM bytes from a WAVE file or memory
//! - **InputController**: non-blocking keyboard polling
//! - **StreamEngine**: the loop tying them together, with drain and
//!   best-effort teardown
//!
//! Losing the output device mid-stream ends playback early; it is reported
//! in the [`PlaybackReport`], not raised as an error.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between frame and byte counts
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod config;
mod error;
mod event;
pub mod format;
pub mod input;
mod pipeline;
pub mod render;
mod report;
pub mod source;

pub use builder::{Player, PlayerBuilder};
pub use config::{PlaybackConfig, DEFAULT_CHUNK_FRAMES};
pub use error::{PlaybackError, RenderError, SourceError};
pub use event::{event_callback, EventCallback, PlaybackEvent};
pub use format::{AudioFormat, SampleEncoding};
pub use input::{InputController, InputEvent, NoInput, ScriptedInput, TerminalInput};
pub use pipeline::{PlaybackState, StreamEngine, StreamProgress};
pub use render::{
    default_output_device_id, device_name, list_output_devices, open_output_device,
    BufferFlags, CpalBackend, DeviceId, DeviceSelection, MockBackend, OutputDevice,
    RenderBackend, RenderBufferLease, RenderSession, SessionState,
};
pub use report::{
    PlaybackOutcome, PlaybackReport, TeardownFailure, TeardownReport, TeardownStep,
};
pub use source::{MemorySource, MockSource, SourceReader, WavSource};
