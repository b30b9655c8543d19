use std::sync::Mutex;

use super::{lock, QcModule};
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;
use crate::stats::{BaseGroup, PhredEncoding};

/// Frequency table of the quality characters seen at one read position.
#[derive(Clone)]
struct QualityCount {
    counts: [u64; 128],
    total: u64,
}

impl QualityCount {
    fn new() -> QualityCount {
        QualityCount {
            counts: [0; 128],
            total: 0,
        }
    }

    fn add_value(&mut self, ch: u8) {
        self.counts[ch as usize & 0x7f] += 1;
        self.total += 1;
    }

    fn min_char(&self) -> u8 {
        self.counts
            .iter()
            .position(|&c| c > 0)
            .map(|i| i as u8)
            .unwrap_or(126)
    }

    fn max_char(&self) -> u8 {
        self.counts
            .iter()
            .rposition(|&c| c > 0)
            .map(|i| i as u8)
            .unwrap_or(0)
    }

    fn mean(&self, offset: u8) -> f64 {
        let mut total = 0i64;
        let mut count = 0i64;
        for (ch, &n) in self.counts.iter().enumerate() {
            if n > 0 {
                total += (ch as i64 - offset as i64) * n as i64;
                count += n as i64;
            }
        }
        total as f64 / count as f64
    }

    /// Cumulative-frequency threshold crossing over the sorted observed
    /// characters, with the same integer arithmetic the thresholds were
    /// calibrated against.
    fn percentile(&self, offset: u8, percentile: u64) -> f64 {
        let threshold = self.total * percentile / 100;
        let mut count = 0u64;
        for (ch, &n) in self.counts.iter().enumerate() {
            if n == 0 {
                continue;
            }
            count += n;
            if count >= threshold {
                return ch as f64 - offset as f64;
            }
        }
        -1.0
    }
}

struct QualityStats {
    labels: Vec<String>,
    means: Vec<f64>,
    medians: Vec<f64>,
    lower_quartile: Vec<f64>,
    upper_quartile: Vec<f64>,
    percentile_10: Vec<f64>,
    percentile_90: Vec<f64>,
    encoding: PhredEncoding,
}

/// Per-position quality distributions, summarized per base group at
/// finalize time with the auto-detected Phred encoding.
pub struct PerBaseQuality {
    quality_counts: Vec<QualityCount>,
    no_group: bool,
    results: Mutex<Option<QualityStats>>,
}

/// Positions below this observation count are left out of percentile
/// averages; sparsely covered tails would otherwise swing the quartiles.
const PERCENTILE_MIN_OBSERVATIONS: u64 = 100;

impl PerBaseQuality {
    pub fn new(no_group: bool) -> PerBaseQuality {
        PerBaseQuality {
            quality_counts: Vec::new(),
            no_group,
            results: Mutex::new(None),
        }
    }

    fn group_percentile(&self, group: &BaseGroup, offset: u8, percentile: u64) -> f64 {
        let positions = &self.quality_counts[group.lower() - 1..group.upper()];

        let qualified: Vec<&QualityCount> = positions
            .iter()
            .filter(|qc| qc.total > PERCENTILE_MIN_OBSERVATIONS)
            .collect();
        // When nothing in the group reaches the observation floor (small
        // inputs), fall back to every position that saw data at all so the
        // metric still reports.
        let included: Vec<&QualityCount> = if qualified.is_empty() {
            positions.iter().filter(|qc| qc.total > 0).collect()
        } else {
            qualified
        };

        if included.is_empty() {
            return 0.0;
        }
        included
            .iter()
            .map(|qc| qc.percentile(offset, percentile))
            .sum::<f64>()
            / included.len() as f64
    }

    fn group_mean(&self, group: &BaseGroup, offset: u8) -> f64 {
        let included: Vec<&QualityCount> = self.quality_counts
            [group.lower() - 1..group.upper()]
            .iter()
            .filter(|qc| qc.total > 0)
            .collect();
        if included.is_empty() {
            return 0.0;
        }
        included.iter().map(|qc| qc.mean(offset)).sum::<f64>() / included.len() as f64
    }

    fn compute(&self) -> QualityStats {
        let mut min_char = 126u8;
        let mut max_char = 0u8;
        for qc in &self.quality_counts {
            if qc.total == 0 {
                continue;
            }
            min_char = min_char.min(qc.min_char());
            max_char = max_char.max(qc.max_char());
        }

        let encoding = PhredEncoding::from_lowest_char(min_char);
        let offset = encoding.offset();

        let groups = BaseGroup::make_base_groups(self.quality_counts.len(), self.no_group);

        let mut stats = QualityStats {
            labels: Vec::with_capacity(groups.len()),
            means: Vec::with_capacity(groups.len()),
            medians: Vec::with_capacity(groups.len()),
            lower_quartile: Vec::with_capacity(groups.len()),
            upper_quartile: Vec::with_capacity(groups.len()),
            percentile_10: Vec::with_capacity(groups.len()),
            percentile_90: Vec::with_capacity(groups.len()),
            encoding,
        };

        for group in &groups {
            stats.labels.push(group.label());
            stats.means.push(self.group_mean(group, offset));
            stats.medians.push(self.group_percentile(group, offset, 50));
            stats
                .lower_quartile
                .push(self.group_percentile(group, offset, 25));
            stats
                .upper_quartile
                .push(self.group_percentile(group, offset, 75));
            stats
                .percentile_10
                .push(self.group_percentile(group, offset, 10));
            stats
                .percentile_90
                .push(self.group_percentile(group, offset, 90));
        }

        stats
    }

    fn with_stats<T>(&self, f: impl FnOnce(&QualityStats) -> T) -> T {
        let mut guard = lock(&self.results);
        if guard.is_none() {
            *guard = Some(self.compute());
        }
        f(guard.as_ref().expect("memo just filled"))
    }
}

impl QcModule for PerBaseQuality {
    fn name(&self) -> &'static str {
        "Per base sequence quality"
    }

    fn description(&self) -> &'static str {
        "Shows the quality scores of all bases at a given position in a sequencing run"
    }

    fn process_sequence(&mut self, record: &SeqRecord) {
        *lock(&self.results) = None;

        if self.quality_counts.len() < record.quality.len() {
            self.quality_counts
                .resize_with(record.quality.len(), QualityCount::new);
        }

        for (i, &q) in record.quality.iter().enumerate() {
            self.quality_counts[i].add_value(q);
        }
    }

    fn reset(&mut self) {
        self.quality_counts.clear();
        *lock(&self.results) = None;
    }

    fn raises_error(&self) -> bool {
        self.with_stats(|s| {
            s.lower_quartile
                .iter()
                .zip(&s.medians)
                .any(|(&lq, &median)| lq < 5.0 || median < 20.0)
        })
    }

    fn raises_warning(&self) -> bool {
        self.with_stats(|s| {
            s.lower_quartile
                .iter()
                .zip(&s.medians)
                .any(|(&lq, &median)| lq < 10.0 || median < 25.0)
        })
    }

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        self.with_stats(|s| {
            sink.html().push_str(&format!(
                "<p><img class=\"indented\" src=\"Images/per_base_quality.png\" \
                 alt=\"Per base quality graph ({} encoding)\"></p>\n",
                s.encoding
            ));

            let mut plot = String::new();
            let data = sink.data();
            data.push_str(
                "#Base\tMean\tMedian\tLower Quartile\tUpper Quartile\t\
                 10th Percentile\t90th Percentile\n",
            );
            for i in 0..s.labels.len() {
                let row = format!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                    s.labels[i],
                    s.means[i],
                    s.medians[i],
                    s.lower_quartile[i],
                    s.upper_quartile[i],
                    s.percentile_10[i],
                    s.percentile_90[i]
                );
                data.push_str(&row);
                plot.push_str(&row);
            }

            sink.named_entry("Images/per_base_quality.png")
                .extend_from_slice(plot.as_bytes());
        });
        Ok(())
    }
}
