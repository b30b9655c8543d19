use std::sync::Mutex;

use super::{lock, QcModule};
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;
use crate::stats::{plateau_mode, GcModelCache, NormalDistribution};

struct GcDistributionStats {
    theoretical: Vec<f64>,
    deviation_percent: f64,
}

/// Distribution of whole-read GC percentages against a theoretical normal
/// curve fitted to the observed mode. Read lengths are bucketed into a
/// shared model so one read contributes fractional weight to the
/// percentage bins its count straddles.
pub struct PerSequenceGc {
    gc_distribution: Vec<f64>,
    models: GcModelCache,
    results: Mutex<Option<GcDistributionStats>>,
}

impl PerSequenceGc {
    pub fn new() -> PerSequenceGc {
        PerSequenceGc {
            gc_distribution: vec![0.0; 101],
            models: GcModelCache::new(),
            results: Mutex::new(None),
        }
    }

    fn compute(&self) -> GcDistributionStats {
        let total: f64 = self.gc_distribution.iter().sum();
        if total <= 0.0 {
            return GcDistributionStats {
                theoretical: vec![0.0; 101],
                deviation_percent: 0.0,
            };
        }

        let mode = plateau_mode(&self.gc_distribution);

        let variance_denominator = if total > 1.0 { total - 1.0 } else { 1.0 };
        let stdev = (self
            .gc_distribution
            .iter()
            .enumerate()
            .map(|(i, &count)| (i as f64 - mode).powi(2) * count)
            .sum::<f64>()
            / variance_denominator)
            .sqrt();

        let normal = NormalDistribution::new(mode, stdev);
        let mut theoretical = Vec::with_capacity(101);
        let mut deviation = 0.0;
        for (i, &observed) in self.gc_distribution.iter().enumerate() {
            let expected = normal.density(i as f64) * total;
            deviation += (expected - observed).abs();
            theoretical.push(expected);
        }

        GcDistributionStats {
            theoretical,
            deviation_percent: deviation / total * 100.0,
        }
    }

    fn with_stats<T>(&self, f: impl FnOnce(&GcDistributionStats) -> T) -> T {
        let mut guard = lock(&self.results);
        if guard.is_none() {
            *guard = Some(self.compute());
        }
        f(guard.as_ref().expect("memo just filled"))
    }
}

impl Default for PerSequenceGc {
    fn default() -> Self {
        PerSequenceGc::new()
    }
}

impl QcModule for PerSequenceGc {
    fn name(&self) -> &'static str {
        "Per sequence GC content"
    }

    fn description(&self) -> &'static str {
        "Shows the distribution of GC content over whole sequences"
    }

    fn process_sequence(&mut self, record: &SeqRecord) {
        // Long reads are truncated to a round length so the model cache
        // stays small; tiny remainders would otherwise each get their own
        // bucket-weight table.
        let len = record.sequence.len();
        let used = if len > 1000 {
            len / 1000 * 1000
        } else if len > 100 {
            len / 100 * 100
        } else {
            len
        };
        if used == 0 {
            return;
        }
        *lock(&self.results) = None;

        let gc_count = record.sequence[..used]
            .iter()
            .filter(|&&b| b == b'G' || b == b'C')
            .count();

        let model = self.models.model_for_length(used);
        for value in model.values_for_count(gc_count) {
            self.gc_distribution[value.percentage] += value.increment;
        }
    }

    fn reset(&mut self) {
        self.gc_distribution = vec![0.0; 101];
        *lock(&self.results) = None;
    }

    fn raises_error(&self) -> bool {
        self.with_stats(|s| s.deviation_percent > 30.0)
    }

    fn raises_warning(&self) -> bool {
        self.with_stats(|s| s.deviation_percent > 15.0)
    }

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        self.with_stats(|s| {
            sink.html().push_str(
                "<p><img class=\"indented\" src=\"Images/per_sequence_gc_content.png\" \
                 alt=\"Per sequence GC content graph\"></p>\n",
            );

            let mut plot = String::new();
            let data = sink.data();
            data.push_str("#GC Content\tCount\n");
            for (i, &count) in self.gc_distribution.iter().enumerate() {
                let row = format!("{}\t{}\n", i, count);
                data.push_str(&row);
                plot.push_str(&format!("{}\t{}\t{}\n", i, count, s.theoretical[i]));
            }

            sink.named_entry("Images/per_sequence_gc_content.png")
                .extend_from_slice(plot.as_bytes());
        });
        Ok(())
    }
}
