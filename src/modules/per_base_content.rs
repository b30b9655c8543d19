use std::sync::Mutex;

use super::{lock, QcModule};
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;
use crate::stats::BaseGroup;

struct ContentStats {
    labels: Vec<String>,
    g_percent: Vec<f64>,
    a_percent: Vec<f64>,
    t_percent: Vec<f64>,
    c_percent: Vec<f64>,
}

impl ContentStats {
    fn max_imbalance(&self) -> f64 {
        let mut max = 0.0f64;
        for i in 0..self.labels.len() {
            max = max.max((self.g_percent[i] - self.c_percent[i]).abs());
            max = max.max((self.a_percent[i] - self.t_percent[i]).abs());
        }
        max
    }
}

/// Proportion of each base call at each read position. A library with no
/// positional bias shows near-parallel lines; G/C or A/T splits flag
/// primer or adapter contamination.
pub struct PerBaseContent {
    g_counts: Vec<u64>,
    a_counts: Vec<u64>,
    t_counts: Vec<u64>,
    c_counts: Vec<u64>,
    no_group: bool,
    results: Mutex<Option<ContentStats>>,
}

impl PerBaseContent {
    pub fn new(no_group: bool) -> PerBaseContent {
        PerBaseContent {
            g_counts: Vec::new(),
            a_counts: Vec::new(),
            t_counts: Vec::new(),
            c_counts: Vec::new(),
            no_group,
            results: Mutex::new(None),
        }
    }

    fn compute(&self) -> ContentStats {
        let groups = BaseGroup::make_base_groups(self.g_counts.len(), self.no_group);

        let mut stats = ContentStats {
            labels: Vec::with_capacity(groups.len()),
            g_percent: Vec::with_capacity(groups.len()),
            a_percent: Vec::with_capacity(groups.len()),
            t_percent: Vec::with_capacity(groups.len()),
            c_percent: Vec::with_capacity(groups.len()),
        };

        for group in &groups {
            let range = group.lower() - 1..group.upper();
            let g: u64 = self.g_counts[range.clone()].iter().sum();
            let a: u64 = self.a_counts[range.clone()].iter().sum();
            let t: u64 = self.t_counts[range.clone()].iter().sum();
            let c: u64 = self.c_counts[range].iter().sum();
            let total = (g + a + t + c) as f64;

            stats.labels.push(group.label());
            if total == 0.0 {
                stats.g_percent.push(0.0);
                stats.a_percent.push(0.0);
                stats.t_percent.push(0.0);
                stats.c_percent.push(0.0);
            } else {
                stats.g_percent.push(g as f64 / total * 100.0);
                stats.a_percent.push(a as f64 / total * 100.0);
                stats.t_percent.push(t as f64 / total * 100.0);
                stats.c_percent.push(c as f64 / total * 100.0);
            }
        }

        stats
    }

    fn with_stats<T>(&self, f: impl FnOnce(&ContentStats) -> T) -> T {
        let mut guard = lock(&self.results);
        if guard.is_none() {
            *guard = Some(self.compute());
        }
        f(guard.as_ref().expect("memo just filled"))
    }
}

impl QcModule for PerBaseContent {
    fn name(&self) -> &'static str {
        "Per base sequence content"
    }

    fn description(&self) -> &'static str {
        "Shows the proportion of each base appearing at each position in a sequencing run"
    }

    fn process_sequence(&mut self, record: &SeqRecord) {
        *lock(&self.results) = None;

        let len = record.sequence.len();
        if self.g_counts.len() < len {
            self.g_counts.resize(len, 0);
            self.a_counts.resize(len, 0);
            self.t_counts.resize(len, 0);
            self.c_counts.resize(len, 0);
        }

        for (i, &base) in record.sequence.iter().enumerate() {
            match base {
                b'G' => self.g_counts[i] += 1,
                b'A' => self.a_counts[i] += 1,
                b'T' | b'U' => self.t_counts[i] += 1,
                b'C' => self.c_counts[i] += 1,
                _ => {}
            }
        }
    }

    fn reset(&mut self) {
        self.g_counts.clear();
        self.a_counts.clear();
        self.t_counts.clear();
        self.c_counts.clear();
        *lock(&self.results) = None;
    }

    fn raises_error(&self) -> bool {
        self.with_stats(|s| s.max_imbalance() > 20.0)
    }

    fn raises_warning(&self) -> bool {
        self.with_stats(|s| s.max_imbalance() > 10.0)
    }

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        self.with_stats(|s| {
            sink.html().push_str(
                "<p><img class=\"indented\" src=\"Images/per_base_sequence_content.png\" \
                 alt=\"Per base sequence content\"></p>\n",
            );

            let mut plot = String::new();
            let data = sink.data();
            data.push_str("#Base\tG\tA\tT\tC\n");
            for i in 0..s.labels.len() {
                let row = format!(
                    "{}\t{}\t{}\t{}\t{}\n",
                    s.labels[i], s.g_percent[i], s.a_percent[i], s.t_percent[i], s.c_percent[i]
                );
                data.push_str(&row);
                plot.push_str(&row);
            }

            sink.named_entry("Images/per_base_sequence_content.png")
                .extend_from_slice(plot.as_bytes());
        });
        Ok(())
    }
}
