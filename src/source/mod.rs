//! Waveform sources.
//!
//! A [`SourceReader`] supplies the engine with sequential PCM bytes and the
//! total length of the sample data. No seeking is needed.

mod memory;
mod mock;
mod wav;

pub use memory::MemorySource;
pub use mock::MockSource;
pub use wav::WavSource;

use std::time::Duration;

use crate::{AudioFormat, SourceError};

/// Sequential reader over a finite PCM stream of fixed format.
pub trait SourceReader {
    /// Format of the sample data.
    fn format(&self) -> AudioFormat;

    /// Declared length of the sample data in bytes.
    fn total_bytes(&self) -> u64;

    /// Reads the next bytes into `buf`, returning how many were written.
    ///
    /// Fills `buf` completely unless the end of the data is reached; a
    /// return of 0 means nothing is left.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, SourceError>;

    /// Declared length in frames.
    fn total_frames(&self) -> u64 {
        self.format().frames_for_bytes(self.total_bytes())
    }

    /// Playback duration of the whole source.
    fn duration(&self) -> Duration {
        self.format().duration_of_frames(self.total_frames())
    }

    /// Reads up to `count` frames into a new vector.
    ///
    /// The result is shorter than `count * block_align` bytes only at the end
    /// of the data.
    fn read_frames(&mut self, count: u32) -> Result<Vec<u8>, SourceError> {
        let mut buf = vec![0u8; self.format().bytes_for_frames(count)];
        let n = self.read_into(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

impl<S: SourceReader + ?Sized> SourceReader for &mut S {
    fn format(&self) -> AudioFormat {
        (**self).format()
    }

    fn total_bytes(&self) -> u64 {
        (**self).total_bytes()
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        (**self).read_into(buf)
    }
}

impl<S: SourceReader + ?Sized> SourceReader for Box<S> {
    fn format(&self) -> AudioFormat {
        (**self).format()
    }

    fn total_bytes(&self) -> u64 {
        (**self).total_bytes()
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        (**self).read_into(buf)
    }
}
