//! Pre-arranged input for tests.

use std::collections::BTreeMap;

use crate::input::{InputController, InputEvent};

/// Returns scripted events on given poll indices and `NoEvent` otherwise.
///
/// Poll indices are 0-based and count every call to [`poll`](InputController::poll).
///
/// # Example
///
/// ```
/// use stream_playback::{InputController, InputEvent, ScriptedInput};
///
/// let mut input = ScriptedInput::new()
///     .at(1, InputEvent::Toggle)
///     .at(3, InputEvent::Quit);
///
/// assert_eq!(input.poll(), InputEvent::NoEvent);
/// assert_eq!(input.poll(), InputEvent::Toggle);
/// assert_eq!(input.poll(), InputEvent::NoEvent);
/// assert_eq!(input.poll(), InputEvent::Quit);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    script: BTreeMap<u64, InputEvent>,
    polls: u64,
}

impl ScriptedInput {
    /// Creates an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `event` for poll number `poll`.
    #[must_use]
    pub fn at(mut self, poll: u64, event: InputEvent) -> Self {
        self.script.insert(poll, event);
        self
    }

    /// Number of polls made so far.
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Returns `true` once every scripted event has been delivered.
    pub fn is_exhausted(&self) -> bool {
        self.script.keys().all(|&poll| poll < self.polls)
    }
}

impl InputController for ScriptedInput {
    fn poll(&mut self) -> InputEvent {
        let event = self
            .script
            .get(&self.polls)
            .copied()
            .unwrap_or(InputEvent::NoEvent);
        self.polls += 1;
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_input_exhaustion() {
        let mut input = ScriptedInput::new().at(2, InputEvent::Quit);
        assert!(!input.is_exhausted());
        input.poll();
        input.poll();
        assert!(!input.is_exhausted());
        assert_eq!(input.poll(), InputEvent::Quit);
        assert!(input.is_exhausted());
        assert_eq!(input.poll(), InputEvent::NoEvent);
    }
}
