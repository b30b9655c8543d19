use std::path::{Path, PathBuf};
use std::sync::Arc;

use bio::alphabets::dna;
use rust_htslib::bam::{self, Read};

use super::record::SeqRecord;
use super::SequenceSource;
use crate::error::Result;

/// Aligned-read container source (BAM/SAM, CRAM with an external
/// reference). Reads flagged as aligned to the reverse strand are restored
/// to their original orientation by reverse-complementing the sequence and
/// reversing the qualities.
pub struct BamSource {
    path: PathBuf,
    name: Arc<str>,
    reader: bam::Reader,
    mapped_only: bool,
    file_size: u64,
    /// Estimated on-disk bytes per record, taken from the first record.
    /// The estimate is rough, so percent_complete can overshoot 100.
    record_size: u64,
    binary: bool,
    raw_count: u64,
    pending: Option<SeqRecord>,
}

impl BamSource {
    pub fn open(path: &Path, mapped_only: bool) -> Result<BamSource> {
        let file_size = std::fs::metadata(path)?.len();
        let reader = bam::Reader::from_path(path)?;
        let name: Arc<str> = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
            .into();
        let binary = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("bam"));

        let mut source = BamSource {
            path: path.to_path_buf(),
            name,
            reader,
            mapped_only,
            file_size,
            record_size: 0,
            binary,
            raw_count: 0,
            pending: None,
        };
        source.read_ahead()?;
        Ok(source)
    }

    fn read_ahead(&mut self) -> Result<()> {
        let mut record = bam::Record::new();

        loop {
            match self.reader.read(&mut record) {
                None => {
                    self.pending = None;
                    return Ok(());
                }
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(())) => {
                    self.raw_count += 1;
                    if self.mapped_only && record.is_unmapped() {
                        continue;
                    }
                    break;
                }
            }
        }

        let mut sequence = record.seq().as_bytes();
        // Container qualities are raw Phred values; re-encode them to the
        // Sanger characters the quality modules expect.
        let mut quality: Vec<u8> = record.qual().iter().map(|q| q + 33).collect();

        if self.record_size == 0 {
            self.record_size = (sequence.len() as u64) * 2 + 150;
            if self.binary {
                self.record_size /= 4;
            }
        }

        // Containers store the sequence relative to the top strand of the
        // reference; undo the flip for reverse-strand alignments.
        if record.is_reverse() {
            sequence = dna::revcomp(&sequence);
            quality.reverse();
        }

        let id = String::from_utf8_lossy(record.qname()).into_owned();
        self.pending = Some(SeqRecord::new(
            Arc::clone(&self.name),
            id,
            sequence,
            quality,
        ));
        Ok(())
    }
}

impl SequenceSource for BamSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn has_next(&mut self) -> bool {
        self.pending.is_some()
    }

    fn next_record(&mut self) -> Result<SeqRecord> {
        let record = self.pending.take().ok_or_else(|| {
            crate::error::QcError::Format("read past the end of the stream".to_string())
        })?;
        self.read_ahead()?;
        Ok(record)
    }

    fn percent_complete(&self) -> f64 {
        if self.file_size == 0 {
            return 100.0;
        }
        (self.raw_count * self.record_size) as f64 / self.file_size as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "@HD\tVN:1.6\tSO:unsorted\n@SQ\tSN:chr1\tLN:1000\n";

    fn write_sam(records: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".sam").tempfile().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(records.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn drain(source: &mut BamSource) -> Vec<SeqRecord> {
        let mut records = Vec::new();
        while source.has_next() {
            records.push(source.next_record().unwrap());
        }
        records
    }

    #[test]
    fn forward_read_passes_through() {
        let file = write_sam("r1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tII?I\n");
        let mut source = BamSource::open(file.path(), false).unwrap();
        let records = drain(&mut source);
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0].sequence[..], b"ACGT");
        assert_eq!(&records[0].quality[..], b"II?I");
        assert_eq!(records[0].id, "r1");
    }

    #[test]
    fn reverse_read_is_restored_to_original_orientation() {
        // Flag 16: reverse strand.
        let file = write_sam("r1\t16\tchr1\t1\t60\t4M\t*\t0\t0\tAACG\tIIJK\n");
        let mut source = BamSource::open(file.path(), false).unwrap();
        let records = drain(&mut source);
        assert_eq!(&records[0].sequence[..], b"CGTT");
        assert_eq!(&records[0].quality[..], b"KJII");
    }

    #[test]
    fn mapped_only_skips_unmapped_records() {
        // Flag 4: unmapped.
        let file = write_sam(
            "r1\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII\nr2\t0\tchr1\t1\t60\t4M\t*\t0\t0\tGGGG\tIIII\n",
        );
        let mut source = BamSource::open(file.path(), true).unwrap();
        let records = drain(&mut source);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "r2");
    }

    #[test]
    fn percent_complete_is_an_estimate_from_record_size() {
        let file = write_sam("r1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n");
        let mut source = BamSource::open(file.path(), false).unwrap();
        drain(&mut source);
        // One record estimated at 2*4+150 bytes against a small file; the
        // estimate may legitimately exceed 100.
        assert!(source.percent_complete() > 0.0);
    }
}
