use std::collections::HashMap;
use std::sync::Mutex;

use super::{lock, QcModule};
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;
use crate::stats::PhredEncoding;

struct SequenceQualityStats {
    /// Phred score per histogram slot, offset already removed.
    scores: Vec<i32>,
    counts: Vec<u64>,
    most_frequent_score: i32,
}

/// Histogram of whole-read mean quality scores. Flags runs where the most
/// common read-level quality is low even if individual positions look fine.
pub struct PerSequenceQuality {
    average_score_counts: HashMap<u32, u64>,
    lowest_char: u8,
    results: Mutex<Option<SequenceQualityStats>>,
}

impl PerSequenceQuality {
    pub fn new() -> PerSequenceQuality {
        PerSequenceQuality {
            average_score_counts: HashMap::new(),
            lowest_char: 126,
            results: Mutex::new(None),
        }
    }

    fn compute(&self) -> SequenceQualityStats {
        if self.average_score_counts.is_empty() {
            return SequenceQualityStats {
                scores: Vec::new(),
                counts: Vec::new(),
                most_frequent_score: 0,
            };
        }

        let offset = PhredEncoding::from_lowest_char(self.lowest_char).offset() as i32;
        let min = *self
            .average_score_counts
            .keys()
            .min()
            .expect("non-empty map");
        let max = *self
            .average_score_counts
            .keys()
            .max()
            .expect("non-empty map");

        let mut scores = Vec::with_capacity((max - min + 1) as usize);
        let mut counts = Vec::with_capacity((max - min + 1) as usize);
        let mut most_frequent_score = 0i32;
        let mut most_frequent_count = 0u64;

        for raw in min..=max {
            let count = self.average_score_counts.get(&raw).copied().unwrap_or(0);
            let score = raw as i32 - offset;
            scores.push(score);
            counts.push(count);
            // First strict maximum wins ties.
            if count > most_frequent_count {
                most_frequent_count = count;
                most_frequent_score = score;
            }
        }

        SequenceQualityStats {
            scores,
            counts,
            most_frequent_score,
        }
    }

    fn with_stats<T>(&self, f: impl FnOnce(&SequenceQualityStats) -> T) -> T {
        let mut guard = lock(&self.results);
        if guard.is_none() {
            *guard = Some(self.compute());
        }
        f(guard.as_ref().expect("memo just filled"))
    }
}

impl Default for PerSequenceQuality {
    fn default() -> Self {
        PerSequenceQuality::new()
    }
}

impl QcModule for PerSequenceQuality {
    fn name(&self) -> &'static str {
        "Per sequence quality scores"
    }

    fn description(&self) -> &'static str {
        "Shows the distribution of average quality scores for whole sequences"
    }

    fn process_sequence(&mut self, record: &SeqRecord) {
        if record.quality.is_empty() {
            return;
        }
        *lock(&self.results) = None;

        let mut total = 0u64;
        for &q in record.quality.iter() {
            if q < self.lowest_char {
                self.lowest_char = q;
            }
            total += q as u64;
        }
        // Integer mean of the raw characters; the offset comes off later.
        let average = (total / record.quality.len() as u64) as u32;
        *self.average_score_counts.entry(average).or_insert(0) += 1;
    }

    fn reset(&mut self) {
        self.average_score_counts.clear();
        self.lowest_char = 126;
        *lock(&self.results) = None;
    }

    fn raises_error(&self) -> bool {
        self.with_stats(|s| s.most_frequent_score <= 20)
    }

    fn raises_warning(&self) -> bool {
        self.with_stats(|s| s.most_frequent_score <= 27)
    }

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        self.with_stats(|s| {
            sink.html().push_str(
                "<p><img class=\"indented\" src=\"Images/per_sequence_quality.png\" \
                 alt=\"Per sequence quality graph\"></p>\n",
            );

            let mut plot = String::new();
            let data = sink.data();
            data.push_str("#Quality\tCount\n");
            for (score, count) in s.scores.iter().zip(&s.counts) {
                let row = format!("{}\t{}\n", score, count);
                data.push_str(&row);
                plot.push_str(&row);
            }

            sink.named_entry("Images/per_sequence_quality.png")
                .extend_from_slice(plot.as_bytes());
        });
        Ok(())
    }
}
