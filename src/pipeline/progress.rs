//! Playback state and source progress.

/// Whether the engine submits audio.
///
/// Mutated only by input events, read once per loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    /// Chunks are leased and filled.
    #[default]
    Playing,
    /// Nothing is read or leased; queued frames keep playing out.
    Paused,
}

impl PlaybackState {
    /// The other state.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Playing => Self::Paused,
            Self::Paused => Self::Playing,
        }
    }

    /// Returns `true` if paused.
    #[must_use]
    pub fn is_paused(self) -> bool {
        self == Self::Paused
    }
}

/// Bytes consumed from a source of known length.
///
/// The count only grows and never exceeds the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamProgress {
    consumed: u64,
    total: u64,
}

impl StreamProgress {
    /// Starts at zero of `total` bytes.
    pub fn new(total: u64) -> Self {
        Self { consumed: 0, total }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Total bytes.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Bytes still to consume.
    pub fn remaining(&self) -> u64 {
        self.total - self.consumed
    }

    /// Returns `true` once every byte has been consumed.
    pub fn is_complete(&self) -> bool {
        self.consumed >= self.total
    }

    /// Records `bytes` more bytes consumed, clamped to the total.
    pub fn advance(&mut self, bytes: u64) {
        self.consumed = (self.consumed + bytes).min(self.total);
    }
}
