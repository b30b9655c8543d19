use std::io;

use thiserror::Error;

/// Failure modes of record decoding and analysis.
///
/// `Format` and `Decode` are fatal to the one source that produced them and
/// are surfaced through the observer channel; they never affect other queued
/// or running analyses.
#[derive(Debug, Error)]
pub enum QcError {
    /// Malformed record framing: missing sentinel characters, truncated
    /// multi-line records, unexpected end of stream mid-record.
    #[error("malformed record: {0}")]
    Format(String),

    /// A record framed correctly but its content could not be decoded,
    /// e.g. an invalid colorspace transition symbol.
    #[error("decode failure: {0}")]
    Decode(String),

    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    #[error("alignment container failure: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error("compressed stream failure: {0}")]
    Compression(#[from] niffler::Error),

    /// A file name did not carry the lane/read structure needed to derive
    /// a shared group stem.
    #[error("file name '{0}' has no recognisable read-group structure")]
    Name(String),
}

pub type Result<T> = std::result::Result<T, QcError>;
