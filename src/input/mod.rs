//! Non-blocking keyboard control.
//!
//! The engine polls an [`InputController`] once per loop iteration. A poll
//! must never block: if no key is pending it returns [`InputEvent::NoEvent`].
//!
//! [`read_path`] is the blocking file prompt used before playback starts.

mod path_prompt;
mod scripted;
mod terminal;

pub use path_prompt::{complete_path, read_path};
pub use scripted::ScriptedInput;
pub use terminal::TerminalInput;

/// Result of one input poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputEvent {
    /// No key pressed since the last poll.
    #[default]
    NoEvent,
    /// Flip between playing and paused.
    Toggle,
    /// Stop submitting audio and drain.
    Quit,
}

/// Source of playback control events.
pub trait InputController {
    /// Returns the next pending event without blocking.
    fn poll(&mut self) -> InputEvent;
}

impl<I: InputController + ?Sized> InputController for &mut I {
    fn poll(&mut self) -> InputEvent {
        (**self).poll()
    }
}

/// Input that never produces an event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl InputController for NoInput {
    fn poll(&mut self) -> InputEvent {
        InputEvent::NoEvent
    }
}
