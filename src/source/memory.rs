//! In-memory PCM source.

use crate::source::SourceReader;
use crate::{AudioFormat, SourceError};

/// Serves PCM bytes from a vector.
#[derive(Debug, Clone)]
pub struct MemorySource {
    format: AudioFormat,
    data: Vec<u8>,
    position: usize,
}

impl MemorySource {
    /// Creates a source over `data` in `format`.
    pub fn new(format: AudioFormat, data: Vec<u8>) -> Self {
        Self {
            format,
            data,
            position: 0,
        }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// The full byte stream.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl SourceReader for MemorySource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn total_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_reads_in_order() {
        let format = AudioFormat::pcm(8000, 1, 8).unwrap();
        let mut source = MemorySource::new(format, (0..5u8).collect());

        let mut buf = [0u8; 3];
        assert_eq!(source.read_into(&mut buf).unwrap(), 3);
        assert_eq!(buf, [0, 1, 2]);
        assert_eq!(source.remaining(), 2);

        assert_eq!(source.read_into(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[3, 4]);
        assert_eq!(source.read_into(&mut buf).unwrap(), 0);
    }
}
