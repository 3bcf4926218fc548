//! PCM format description.
//!
//! The render path never converts or resamples: the format read from the
//! source is negotiated with the sink unchanged, and bytes are copied
//! frame-for-frame.

mod descriptor;

pub use descriptor::{AudioFormat, SampleEncoding};
