//! RIFF/WAVE file source.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::format::SampleEncoding;
use crate::source::SourceReader;
use crate::{AudioFormat, SourceError};

/// Streams the raw data chunk of a WAVE file.
///
/// The header is parsed with `hound`; after that the data chunk is read as
/// bytes, unmodified, in the file's own format.
///
/// # Example
///
/// ```no_run
/// use stream_playback::source::{SourceReader, WavSource};
///
/// let source = WavSource::open("music.wav")?;
/// println!("{} ({:?})", source.format(), source.duration());
/// # Ok::<(), stream_playback::SourceError>(())
/// ```
#[derive(Debug)]
pub struct WavSource<R: Read = BufReader<File>> {
    reader: R,
    format: AudioFormat,
    total_bytes: u64,
    consumed: u64,
}

impl WavSource {
    /// Opens a WAVE file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be opened, `Wav` if the header is
    /// malformed, `UnsupportedFormat` if the format is degenerate.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SourceError::io(path, e))?;
        let source = Self::from_reader(BufReader::new(file))?;
        tracing::debug!(
            path = %path.display(),
            format = %source.format,
            total_bytes = source.total_bytes,
            "opened wave file"
        );
        Ok(source)
    }
}

impl<R: Read + Seek> WavSource<R> {
    /// Parses a WAVE header from `reader`, leaving it at the start of the data.
    ///
    /// # Errors
    ///
    /// Returns `Wav` if the header is malformed, `UnsupportedFormat` if the
    /// format is degenerate or samples are stored in wider containers than
    /// their valid bits need (24 bits in 4 bytes, for instance).
    pub fn from_reader(reader: R) -> Result<Self, SourceError> {
        let wav = hound::WavReader::new(reader)?;
        let spec = wav.spec();
        let encoding = match spec.sample_format {
            hound::SampleFormat::Int => SampleEncoding::Int,
            hound::SampleFormat::Float => SampleEncoding::Float,
        };
        let format = AudioFormat::new(
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            encoding,
        )?;
        let samples = wav.len();
        let total_bytes = u64::from(wav.duration()) * format.block_align() as u64;

        let mut reader = wav.into_inner();
        let data_len = data_chunk_len(&mut reader)?;
        if samples > 0 {
            let container = u64::from(data_len) / u64::from(samples);
            let packed = (format.block_align() / usize::from(format.channels())) as u64;
            if container != packed {
                return Err(SourceError::unsupported(format!(
                    "{}-bit samples stored in {}-byte containers",
                    spec.bits_per_sample, container
                )));
            }
        }

        Ok(Self {
            reader,
            format,
            total_bytes,
            consumed: 0,
        })
    }
}

impl<R: Read> WavSource<R> {
    /// Bytes read so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

/// Reads the length field just before the data, where hound leaves `reader`.
fn data_chunk_len<R: Read + Seek>(reader: &mut R) -> Result<u32, SourceError> {
    let mut len = [0u8; 4];
    reader
        .seek(SeekFrom::Current(-4))
        .and_then(|_| reader.read_exact(&mut len))
        .map_err(SourceError::Read)?;
    Ok(u32::from_le_bytes(len))
}

impl<R: Read> SourceReader for WavSource<R> {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        let remaining = self.total_bytes - self.consumed;
        let limit = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));

        let mut filled = 0;
        while filled < limit {
            match self.reader.read(&mut buf[filled..limit]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(SourceError::Read(e)),
            }
        }

        self.consumed += filled as u64;
        Ok(filled)
    }
}
