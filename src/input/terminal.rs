//! Raw-mode terminal keyboard input.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::input::{InputController, InputEvent};

/// Keyboard control from the controlling terminal.
///
/// Raw mode is enabled for the lifetime of the value so keys arrive without
/// Enter, and restored on drop. Space toggles pause, `q` quits. Raw mode
/// swallows SIGINT, so Ctrl-C is mapped to quit as well.
#[derive(Debug)]
pub struct TerminalInput {
    _raw_mode: (),
}

impl TerminalInput {
    /// Switches the terminal into raw mode.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if stdin is not a terminal.
    pub fn new() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        tracing::debug!("terminal raw mode enabled");
        Ok(Self { _raw_mode: () })
    }
}

impl InputController for TerminalInput {
    fn poll(&mut self) -> InputEvent {
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => {
                        let mapped = map_key(key);
                        if mapped != InputEvent::NoEvent {
                            return mapped;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("terminal read failed: {}", e);
                        return InputEvent::NoEvent;
                    }
                },
                Ok(false) => return InputEvent::NoEvent,
                Err(e) => {
                    tracing::warn!("terminal poll failed: {}", e);
                    return InputEvent::NoEvent;
                }
            }
        }
    }
}

impl Drop for TerminalInput {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("failed to restore terminal mode: {}", e);
        }
    }
}

/// Maps one key event to a control event.
///
/// Only presses count; repeats and releases are ignored.
pub(crate) fn map_key(key: KeyEvent) -> InputEvent {
    if key.kind != KeyEventKind::Press {
        return InputEvent::NoEvent;
    }
    match key.code {
        KeyCode::Char(' ') => InputEvent::Toggle,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => InputEvent::Quit,
        KeyCode::Char('q' | 'Q') => InputEvent::Quit,
        _ => InputEvent::NoEvent,
    }
}
