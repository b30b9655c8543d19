use std::sync::Mutex;

use super::{lock, QcModule};
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;
use crate::stats::BaseGroup;

struct NContentStats {
    labels: Vec<String>,
    n_percent: Vec<f64>,
}

/// Percentage of uncalled (N) bases at each read position.
pub struct NContent {
    n_counts: Vec<u64>,
    not_n_counts: Vec<u64>,
    no_group: bool,
    results: Mutex<Option<NContentStats>>,
}

impl NContent {
    pub fn new(no_group: bool) -> NContent {
        NContent {
            n_counts: Vec::new(),
            not_n_counts: Vec::new(),
            no_group,
            results: Mutex::new(None),
        }
    }

    fn compute(&self) -> NContentStats {
        let groups = BaseGroup::make_base_groups(self.n_counts.len(), self.no_group);

        let mut labels = Vec::with_capacity(groups.len());
        let mut n_percent = Vec::with_capacity(groups.len());

        for group in &groups {
            let range = group.lower() - 1..group.upper();
            let n: u64 = self.n_counts[range.clone()].iter().sum();
            let not_n: u64 = self.not_n_counts[range].iter().sum();
            let total = n + not_n;

            labels.push(group.label());
            n_percent.push(if total == 0 {
                0.0
            } else {
                n as f64 / total as f64 * 100.0
            });
        }

        NContentStats { labels, n_percent }
    }

    fn with_stats<T>(&self, f: impl FnOnce(&NContentStats) -> T) -> T {
        let mut guard = lock(&self.results);
        if guard.is_none() {
            *guard = Some(self.compute());
        }
        f(guard.as_ref().expect("memo just filled"))
    }
}

impl QcModule for NContent {
    fn name(&self) -> &'static str {
        "Per base N content"
    }

    fn description(&self) -> &'static str {
        "Shows the percentage of bases at each position which are not being called"
    }

    fn process_sequence(&mut self, record: &SeqRecord) {
        *lock(&self.results) = None;

        let len = record.sequence.len();
        if self.n_counts.len() < len {
            self.n_counts.resize(len, 0);
            self.not_n_counts.resize(len, 0);
        }

        for (i, &base) in record.sequence.iter().enumerate() {
            if base == b'N' {
                self.n_counts[i] += 1;
            } else {
                self.not_n_counts[i] += 1;
            }
        }
    }

    fn reset(&mut self) {
        self.n_counts.clear();
        self.not_n_counts.clear();
        *lock(&self.results) = None;
    }

    fn raises_error(&self) -> bool {
        self.with_stats(|s| s.n_percent.iter().any(|&p| p > 20.0))
    }

    fn raises_warning(&self) -> bool {
        self.with_stats(|s| s.n_percent.iter().any(|&p| p > 5.0))
    }

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        self.with_stats(|s| {
            sink.html().push_str(
                "<p><img class=\"indented\" src=\"Images/per_base_n_content.png\" \
                 alt=\"N content graph\"></p>\n",
            );

            let mut plot = String::new();
            let data = sink.data();
            data.push_str("#Base\tN-Count\n");
            for (label, percent) in s.labels.iter().zip(&s.n_percent) {
                let row = format!("{}\t{}\n", label, percent);
                data.push_str(&row);
                plot.push_str(&row);
            }

            sink.named_entry("Images/per_base_n_content.png")
                .extend_from_slice(plot.as_bytes());
        });
        Ok(())
    }
}
