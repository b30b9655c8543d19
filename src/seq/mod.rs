pub mod bam;
pub mod fastq;
pub mod group;
pub mod record;

use std::path::Path;

use crate::config::{QcConfig, SourceFormat};
use crate::error::Result;

pub use bam::BamSource;
pub use fastq::FastqSource;
pub use group::{casava_basename, SourceGroup};
pub use record::SeqRecord;

/// A stateful cursor over the records of one or more underlying files.
///
/// `percent_complete` is computed from the raw byte offset against the file
/// size known upfront, never from record counts; it is monotonically
/// non-decreasing within one file but may exceed 100 when a size estimate
/// was wrong, and callers must tolerate that.
pub trait SequenceSource: Send {
    fn name(&self) -> &str;

    fn path(&self) -> &Path;

    fn has_next(&mut self) -> bool;

    /// Take the next record. Fails with `QcError::Format` or
    /// `QcError::Decode` on structurally invalid input.
    fn next_record(&mut self) -> Result<SeqRecord>;

    fn percent_complete(&self) -> f64;

    fn is_colorspace(&self) -> bool {
        false
    }
}

/// Open a single file with the decoder its extension (or the configured
/// override) calls for.
pub fn open_source(path: &Path, config: &QcConfig) -> Result<Box<dyn SequenceSource>> {
    let format = config.format.unwrap_or_else(|| infer_format(path));

    match format {
        SourceFormat::Bam => Ok(Box::new(BamSource::open(path, config.mapped_only)?)),
        SourceFormat::Fastq => Ok(Box::new(FastqSource::open(path, config.casava)?)),
    }
}

fn infer_format(path: &Path) -> SourceFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("bam") | Some("sam") | Some("cram") => SourceFormat::Bam,
        _ => SourceFormat::Fastq,
    }
}
