use std::sync::{Arc, Mutex};

use super::overrepresented::SeqTracker;
use super::{lock, QcModule};
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;

struct DuplicationStats {
    /// Distinct-sequence counts at duplication levels 1 through 10+,
    /// relative to the level-1 count (level 1 = 100).
    relative_counts: [f64; 10],
    duplicate_percent: f64,
}

/// Estimates how much of the library is duplicated reads. Shares the
/// sequence census built by the over-representation module and does no
/// counting of its own.
pub struct DuplicationLevel {
    tracker: Arc<Mutex<SeqTracker>>,
    results: Mutex<Option<DuplicationStats>>,
}

impl DuplicationLevel {
    pub(crate) fn new(tracker: Arc<Mutex<SeqTracker>>) -> DuplicationLevel {
        DuplicationLevel {
            tracker,
            results: Mutex::new(None),
        }
    }

    fn compute(&self) -> DuplicationStats {
        let tracker = lock(&self.tracker);

        let mut level_counts = [0u64; 10];
        for &count in tracker.sequences.values() {
            let level = (count.min(10) - 1) as usize;
            level_counts[level] += 1;
        }

        // The level-1 bucket anchors the relative scale, so a library with
        // no singletons still gets a usable denominator.
        let anchor = level_counts[0].max(1) as f64;
        let mut relative_counts = [0.0; 10];
        for (slot, &count) in relative_counts.iter_mut().zip(&level_counts) {
            *slot = count as f64 / anchor * 100.0;
        }

        let duplicate_percent = if tracker.count == 0 {
            0.0
        } else {
            // When the census froze at the unique-sequence cap, scale the
            // singleton count up by how much the library kept growing after.
            let cap = tracker.count_at_unique_limit.min(tracker.count).max(1);
            let scale = if tracker.count_at_unique_limit == 0 {
                1.0
            } else {
                tracker.count as f64 / cap as f64
            };
            // Only reads seen exactly once count as unique; every extra
            // copy of a duplicated sequence is duplication.
            let estimated_unique = level_counts[0].max(1) as f64 * scale;
            let percent = (tracker.count as f64 - estimated_unique) / tracker.count as f64 * 100.0;
            percent.clamp(0.0, 100.0)
        };

        DuplicationStats {
            relative_counts,
            duplicate_percent,
        }
    }

    fn with_stats<T>(&self, f: impl FnOnce(&DuplicationStats) -> T) -> T {
        let mut guard = lock(&self.results);
        if guard.is_none() {
            *guard = Some(self.compute());
        }
        f(guard.as_ref().expect("memo just filled"))
    }

    fn level_label(level: usize) -> String {
        if level == 9 {
            "10+".to_string()
        } else {
            format!("{}", level + 1)
        }
    }
}

impl QcModule for DuplicationLevel {
    fn name(&self) -> &'static str {
        "Sequence Duplication Levels"
    }

    fn description(&self) -> &'static str {
        "Shows the rate of duplication of sequences in the set"
    }

    fn process_sequence(&mut self, _record: &SeqRecord) {
        // The over-representation module feeds the shared census; only the
        // memo needs invalidating here.
        *lock(&self.results) = None;
    }

    fn reset(&mut self) {
        *lock(&self.results) = None;
    }

    fn raises_error(&self) -> bool {
        self.with_stats(|s| s.duplicate_percent > 50.0)
    }

    fn raises_warning(&self) -> bool {
        self.with_stats(|s| s.duplicate_percent > 20.0)
    }

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        self.with_stats(|s| {
            sink.html().push_str(&format!(
                "<p><img class=\"indented\" src=\"Images/duplication_levels.png\" \
                 alt=\"Duplication level graph ({:.2}% total duplication)\"></p>\n",
                s.duplicate_percent
            ));

            let mut plot = String::new();
            let data = sink.data();
            data.push_str(&format!(
                "#Total Duplicate Percentage\t{}\n",
                s.duplicate_percent
            ));
            data.push_str("#Duplication Level\tRelative count\n");
            for (level, &relative) in s.relative_counts.iter().enumerate() {
                let row = format!("{}\t{}\n", Self::level_label(level), relative);
                data.push_str(&row);
                plot.push_str(&row);
            }

            sink.named_entry("Images/duplication_levels.png")
                .extend_from_slice(plot.as_bytes());
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testutil::record_seq;
    use crate::modules::OverRepresentedSeqs;
    use crate::report::BufferSink;

    fn feed(overrep: &mut OverRepresentedSeqs, seq: &[u8], times: usize) {
        for _ in 0..times {
            overrep.process_sequence(&record_seq(seq));
        }
    }

    #[test]
    fn unique_library_has_no_duplication() {
        let mut overrep = OverRepresentedSeqs::new();
        let duplication = overrep.duplication_module();
        for i in 0u32..100 {
            feed(&mut overrep, format!("ACGT{:04}", i).as_bytes(), 1);
        }
        duplication.with_stats(|s| {
            assert!((s.duplicate_percent - 0.0).abs() < 1e-9);
            assert!((s.relative_counts[0] - 100.0).abs() < 1e-9);
        });
        assert!(!duplication.raises_warning());
    }

    #[test]
    fn duplicate_share_counts_extra_copies_only() {
        let mut overrep = OverRepresentedSeqs::new();
        let duplication = overrep.duplication_module();
        // 4 copies of one read plus 6 singletons: 6 unique of 10 total,
        // so all 4 copies of the duplicated read count as duplication.
        feed(&mut overrep, b"AAAA", 4);
        for i in 0u32..6 {
            feed(&mut overrep, format!("CG{:02}", i).as_bytes(), 1);
        }
        duplication.with_stats(|s| {
            assert!((s.duplicate_percent - 40.0).abs() < 1e-9);
            assert!((s.relative_counts[3] - 100.0 / 6.0).abs() < 1e-9);
        });
        assert!(duplication.raises_warning());
        assert!(!duplication.raises_error());

        let mut sink = BufferSink::new();
        duplication.write_report(&mut sink).unwrap();
        assert!(sink
            .data_document()
            .contains("#Total Duplicate Percentage\t40\n"));
    }

    #[test]
    fn heavily_duplicated_library_fails() {
        let mut overrep = OverRepresentedSeqs::new();
        let duplication = overrep.duplication_module();
        feed(&mut overrep, b"TTTT", 9);
        feed(&mut overrep, b"ACGT", 1);
        // No singletons, so the unique estimate floors at 1: 90% duplication.
        assert!(duplication.raises_error());
    }

    #[test]
    fn deep_duplicates_land_in_the_top_bucket() {
        let mut overrep = OverRepresentedSeqs::new();
        let duplication = overrep.duplication_module();
        feed(&mut overrep, b"GGGG", 25);
        feed(&mut overrep, b"ACGT", 1);
        duplication.with_stats(|s| {
            assert!((s.relative_counts[9] - 100.0).abs() < 1e-9);
        });
    }

    #[test]
    fn report_carries_total_percentage_line() {
        let mut overrep = OverRepresentedSeqs::new();
        let duplication = overrep.duplication_module();
        feed(&mut overrep, b"ACGT", 2);
        let mut sink = BufferSink::new();
        duplication.write_report(&mut sink).unwrap();
        assert!(sink
            .data_document()
            .contains("#Total Duplicate Percentage\t50\n"));
        assert!(sink.data_document().contains("\n10+\t"));
        assert!(!sink.data_document().contains("10++"));
    }
}
