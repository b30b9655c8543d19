use std::sync::Mutex;

use super::{lock, QcModule};
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;
use crate::stats::PhredEncoding;

/// Headline numbers for the whole file: read counts, length range, overall
/// GC and the detected quality encoding. Never warns or fails, and unlike
/// the analytic modules it sees filtered reads so it can count them.
pub struct BasicStats {
    total: u64,
    filtered: u64,
    min_length: usize,
    max_length: usize,
    gc_count: u64,
    at_count: u64,
    lowest_quality_char: u8,
    file_name: Option<String>,
    results: Mutex<Option<Summary>>,
}

#[derive(Clone)]
struct Summary {
    encoding: PhredEncoding,
    gc_percent: f64,
}

impl BasicStats {
    pub fn new() -> BasicStats {
        BasicStats {
            total: 0,
            filtered: 0,
            min_length: 0,
            max_length: 0,
            gc_count: 0,
            at_count: 0,
            lowest_quality_char: 126,
            file_name: None,
            results: Mutex::new(None),
        }
    }

    fn summary(&self) -> Summary {
        let mut guard = lock(&self.results);
        if guard.is_none() {
            let total_bases = self.gc_count + self.at_count;
            let gc_percent = if total_bases > 0 {
                self.gc_count as f64 / total_bases as f64 * 100.0
            } else {
                0.0
            };
            *guard = Some(Summary {
                encoding: PhredEncoding::from_lowest_char(self.lowest_quality_char),
                gc_percent,
            });
        }
        guard.clone().expect("memo just filled")
    }

    fn length_label(&self) -> String {
        if self.min_length == self.max_length {
            format!("{}", self.max_length)
        } else {
            format!("{}-{}", self.min_length, self.max_length)
        }
    }
}

impl Default for BasicStats {
    fn default() -> Self {
        BasicStats::new()
    }
}

impl QcModule for BasicStats {
    fn name(&self) -> &'static str {
        "Basic Statistics"
    }

    fn description(&self) -> &'static str {
        "Calculates some basic statistics about the file"
    }

    fn ignores_filtered(&self) -> bool {
        false
    }

    fn process_sequence(&mut self, record: &SeqRecord) {
        *lock(&self.results) = None;

        if self.file_name.is_none() {
            self.file_name = Some(record.source.to_string());
        }

        self.total += 1;
        if record.filtered {
            self.filtered += 1;
            return;
        }

        let len = record.len();
        if self.total - self.filtered == 1 {
            self.min_length = len;
            self.max_length = len;
        } else {
            self.min_length = self.min_length.min(len);
            self.max_length = self.max_length.max(len);
        }

        for &base in record.sequence.iter() {
            match base {
                b'G' | b'C' => self.gc_count += 1,
                b'A' | b'T' | b'U' => self.at_count += 1,
                _ => {}
            }
        }

        for &q in record.quality.iter() {
            if q < self.lowest_quality_char {
                self.lowest_quality_char = q;
            }
        }
    }

    fn reset(&mut self) {
        *self = BasicStats::new();
    }

    fn raises_error(&self) -> bool {
        false
    }

    fn raises_warning(&self) -> bool {
        false
    }

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        let summary = self.summary();

        let data = sink.data();
        data.push_str("#Measure\tValue\n");
        data.push_str(&format!(
            "Filename\t{}\n",
            self.file_name.as_deref().unwrap_or("")
        ));
        data.push_str(&format!("Encoding\t{}\n", summary.encoding));
        data.push_str(&format!("Total Sequences\t{}\n", self.total));
        data.push_str(&format!("Filtered Sequences\t{}\n", self.filtered));
        data.push_str(&format!("Sequence length\t{}\n", self.length_label()));
        data.push_str(&format!("%GC\t{:.0}\n", summary.gc_percent));

        sink.html().push_str(&format!(
            "<p>{} sequences, length {}</p>\n",
            self.total,
            self.length_label()
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testutil::record;
    use crate::report::BufferSink;

    #[test]
    fn tracks_counts_and_lengths() {
        let mut stats = BasicStats::new();
        stats.process_sequence(&record(b"ACGT", b"IIII"));
        stats.process_sequence(&record(b"GGGGGG", b"IIIIII"));
        assert_eq!(stats.total, 2);
        assert_eq!(stats.min_length, 4);
        assert_eq!(stats.max_length, 6);
        assert!(!stats.raises_warning());
        assert!(!stats.raises_error());
    }

    #[test]
    fn counts_filtered_reads_separately() {
        let mut stats = BasicStats::new();
        let mut filtered = record(b"ACGT", b"IIII");
        filtered.filtered = true;
        stats.process_sequence(&filtered);
        stats.process_sequence(&record(b"AT", b"II"));
        assert_eq!(stats.total, 2);
        assert_eq!(stats.filtered, 1);
        // Filtered reads contribute nothing to the length range.
        assert_eq!(stats.max_length, 2);
    }

    #[test]
    fn report_carries_encoding_and_gc() {
        let mut stats = BasicStats::new();
        stats.process_sequence(&record(b"GGCC", b"IIII"));
        let mut sink = BufferSink::new();
        stats.write_report(&mut sink).unwrap();
        assert!(sink.data_document().contains("Sanger / Illumina 1.9"));
        assert!(sink.data_document().contains("%GC\t100"));
    }

    #[test]
    fn empty_module_reports_deterministically() {
        let stats = BasicStats::new();
        let mut sink = BufferSink::new();
        stats.write_report(&mut sink).unwrap();
        assert!(sink.data_document().contains("Total Sequences\t0"));
    }
}
