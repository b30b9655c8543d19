use std::sync::Mutex;

use super::{lock, QcModule};
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;
use crate::stats::size_distribution;

struct LengthStats {
    labels: Vec<String>,
    counts: Vec<u64>,
    distinct_lengths: usize,
    has_zero_length: bool,
}

/// Histogram of read lengths, binned so the graph never exceeds fifty
/// categories, with one padding bin either side of the observed range.
pub struct LengthDistribution {
    length_counts: Vec<u64>,
    results: Mutex<Option<LengthStats>>,
}

impl LengthDistribution {
    pub fn new() -> LengthDistribution {
        LengthDistribution {
            length_counts: Vec::new(),
            results: Mutex::new(None),
        }
    }

    fn compute(&self) -> LengthStats {
        let observed: Vec<usize> = self
            .length_counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(i, _)| i)
            .collect();

        let Some((&min, &max)) = observed.first().zip(observed.last()) else {
            return LengthStats {
                labels: Vec::new(),
                counts: Vec::new(),
                distinct_lengths: 0,
                has_zero_length: false,
            };
        };

        // Pad one bin below the observed minimum, but never below zero.
        let low = if min > 0 { min as i64 - 1 } else { 0 };
        let (start, interval) = size_distribution(low, max as i64 + 1);

        let mut labels = Vec::new();
        let mut counts = Vec::new();
        let mut current = start;
        while current <= max as i64 + 1 {
            if interval == 1 {
                labels.push(format!("{}", current));
            } else {
                labels.push(format!("{}-{}", current, current + interval - 1));
            }

            let mut count = 0u64;
            for length in current..current + interval {
                if length >= 0 && (length as usize) < self.length_counts.len() {
                    count += self.length_counts[length as usize];
                }
            }
            counts.push(count);
            current += interval;
        }

        LengthStats {
            labels,
            counts,
            distinct_lengths: observed.len(),
            has_zero_length: self.length_counts.first().map_or(false, |&c| c > 0),
        }
    }

    fn with_stats<T>(&self, f: impl FnOnce(&LengthStats) -> T) -> T {
        let mut guard = lock(&self.results);
        if guard.is_none() {
            *guard = Some(self.compute());
        }
        f(guard.as_ref().expect("memo just filled"))
    }
}

impl Default for LengthDistribution {
    fn default() -> Self {
        LengthDistribution::new()
    }
}

impl QcModule for LengthDistribution {
    fn name(&self) -> &'static str {
        "Sequence Length Distribution"
    }

    fn description(&self) -> &'static str {
        "Shows the distribution of sequence lengths over all sequences"
    }

    fn process_sequence(&mut self, record: &SeqRecord) {
        *lock(&self.results) = None;

        let len = record.sequence.len();
        if self.length_counts.len() < len + 2 {
            self.length_counts.resize(len + 2, 0);
        }
        self.length_counts[len] += 1;
    }

    fn reset(&mut self) {
        self.length_counts.clear();
        *lock(&self.results) = None;
    }

    fn raises_error(&self) -> bool {
        self.with_stats(|s| s.has_zero_length)
    }

    fn raises_warning(&self) -> bool {
        self.with_stats(|s| s.distinct_lengths > 1)
    }

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        self.with_stats(|s| {
            sink.html().push_str(
                "<p><img class=\"indented\" src=\"Images/sequence_length_distribution.png\" \
                 alt=\"Sequence length distribution\"></p>\n",
            );

            let mut plot = String::new();
            let data = sink.data();
            data.push_str("#Length\tCount\n");
            for (label, count) in s.labels.iter().zip(&s.counts) {
                let row = format!("{}\t{}\n", label, count);
                data.push_str(&row);
                plot.push_str(&row);
            }

            sink.named_entry("Images/sequence_length_distribution.png")
                .extend_from_slice(plot.as_bytes());
        });
        Ok(())
    }
}
