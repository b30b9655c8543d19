use std::sync::Mutex;

use super::{lock, QcModule};
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;
use crate::stats::BaseGroup;

struct GcStats {
    labels: Vec<String>,
    gc_percent: Vec<f64>,
    max_deviation: f64,
}

/// GC fraction per read position. Should be flat across the read; the
/// thresholds measure drift from the average over all groups.
pub struct PerBaseGc {
    gc_counts: Vec<u64>,
    at_counts: Vec<u64>,
    no_group: bool,
    results: Mutex<Option<GcStats>>,
}

impl PerBaseGc {
    pub fn new(no_group: bool) -> PerBaseGc {
        PerBaseGc {
            gc_counts: Vec::new(),
            at_counts: Vec::new(),
            no_group,
            results: Mutex::new(None),
        }
    }

    fn compute(&self) -> GcStats {
        let groups = BaseGroup::make_base_groups(self.gc_counts.len(), self.no_group);

        let mut labels = Vec::with_capacity(groups.len());
        let mut gc_percent = Vec::with_capacity(groups.len());

        for group in &groups {
            let range = group.lower() - 1..group.upper();
            let gc: u64 = self.gc_counts[range.clone()].iter().sum();
            let at: u64 = self.at_counts[range].iter().sum();
            let total = gc + at;

            labels.push(group.label());
            gc_percent.push(if total == 0 {
                0.0
            } else {
                gc as f64 / total as f64 * 100.0
            });
        }

        let max_deviation = if gc_percent.is_empty() {
            0.0
        } else {
            let mean = gc_percent.iter().sum::<f64>() / gc_percent.len() as f64;
            gc_percent
                .iter()
                .map(|&p| (p - mean).abs())
                .fold(0.0, f64::max)
        };

        GcStats {
            labels,
            gc_percent,
            max_deviation,
        }
    }

    fn with_stats<T>(&self, f: impl FnOnce(&GcStats) -> T) -> T {
        let mut guard = lock(&self.results);
        if guard.is_none() {
            *guard = Some(self.compute());
        }
        f(guard.as_ref().expect("memo just filled"))
    }
}

impl QcModule for PerBaseGc {
    fn name(&self) -> &'static str {
        "Per base GC content"
    }

    fn description(&self) -> &'static str {
        "Shows the GC content of all bases at a given position in a sequencing run"
    }

    fn process_sequence(&mut self, record: &SeqRecord) {
        *lock(&self.results) = None;

        let len = record.sequence.len();
        if self.gc_counts.len() < len {
            self.gc_counts.resize(len, 0);
            self.at_counts.resize(len, 0);
        }

        for (i, &base) in record.sequence.iter().enumerate() {
            match base {
                b'G' | b'C' => self.gc_counts[i] += 1,
                b'A' | b'T' | b'U' => self.at_counts[i] += 1,
                _ => {}
            }
        }
    }

    fn reset(&mut self) {
        self.gc_counts.clear();
        self.at_counts.clear();
        *lock(&self.results) = None;
    }

    fn raises_error(&self) -> bool {
        self.with_stats(|s| s.max_deviation > 10.0)
    }

    fn raises_warning(&self) -> bool {
        self.with_stats(|s| s.max_deviation > 5.0)
    }

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        self.with_stats(|s| {
            sink.html().push_str(
                "<p><img class=\"indented\" src=\"Images/per_base_gc_content.png\" \
                 alt=\"Per base GC content graph\"></p>\n",
            );

            let mut plot = String::new();
            let data = sink.data();
            data.push_str("#Base\t%GC\n");
            for (label, percent) in s.labels.iter().zip(&s.gc_percent) {
                let row = format!("{}\t{}\n", label, percent);
                data.push_str(&row);
                plot.push_str(&row);
            }

            sink.named_entry("Images/per_base_gc_content.png")
                .extend_from_slice(plot.as_bytes());
        });
        Ok(())
    }
}
