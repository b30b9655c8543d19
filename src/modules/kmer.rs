use std::collections::HashMap;
use std::sync::Mutex;

use super::{lock, QcModule};
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;
use crate::stats::BaseGroup;

const KMER_SIZE: usize = 5;

/// Only every fifth read is analysed; k-mer counting is by far the most
/// expensive module and sampling changes the enrichment ratios not at all.
const SAMPLE_INTERVAL: u64 = 5;

struct KmerRecord {
    count: u64,
    positions: Vec<u64>,
}

struct EnrichedKmer {
    sequence: String,
    count: u64,
    obs_exp: f32,
    obs_exp_positions: Vec<f32>,
}

impl EnrichedKmer {
    fn max_obs_exp(&self) -> f32 {
        self.obs_exp_positions
            .iter()
            .fold(0.0, |max, &v| if v > max { v } else { max })
    }

    /// 1-based group index of the positional maximum; defaults to the
    /// first group when no position rises above zero.
    fn max_position(&self) -> usize {
        let mut max = 0.0f32;
        let mut position = 0;
        for (i, &v) in self.obs_exp_positions.iter().enumerate() {
            if v > max {
                max = v;
                position = i + 1;
            }
        }
        position.max(1)
    }
}

struct KmerStats {
    enriched: Vec<EnrichedKmer>,
    group_labels: Vec<String>,
    /// Positional profiles of the top hits, each normalized to its own
    /// maximum as 100.
    profiles: Vec<Vec<f64>>,
}

/// Finds short sequences whose observed frequency is far above what the
/// overall base composition predicts, overall or at specific positions.
pub struct KmerContent {
    kmers: HashMap<String, KmerRecord>,
    g_count: u64,
    a_count: u64,
    t_count: u64,
    c_count: u64,
    longest_sequence: usize,
    /// Valid k-mer observations per start position, regardless of which
    /// k-mer was seen.
    total_kmer_counts: Vec<u64>,
    skip_count: u64,
    no_group: bool,
    results: Mutex<Option<KmerStats>>,
}

impl KmerContent {
    pub fn new(no_group: bool) -> KmerContent {
        KmerContent {
            kmers: HashMap::new(),
            g_count: 0,
            a_count: 0,
            t_count: 0,
            c_count: 0,
            longest_sequence: 0,
            total_kmer_counts: Vec::new(),
            skip_count: 0,
            no_group,
            results: Mutex::new(None),
        }
    }

    fn add_kmer_count(&mut self, position: usize, kmer: &[u8]) {
        if position >= self.total_kmer_counts.len() {
            // Grow even for k-mers we then refuse to count, so libraries
            // whose tails are all Ns still size the array to the read.
            self.total_kmer_counts.resize(position + 1, 0);
        }
        if kmer.contains(&b'N') {
            return;
        }
        self.total_kmer_counts[position] += 1;
    }

    fn base_probability(&self, kmer: &[u8]) -> Option<f32> {
        let total_bases = (self.g_count + self.a_count + self.t_count + self.c_count) as f32;
        let mut prob = 1.0f32;
        for &base in kmer {
            let count = match base {
                b'G' => self.g_count,
                b'A' => self.a_count,
                b'T' => self.t_count,
                b'C' => self.c_count,
                _ => return None,
            };
            prob *= count as f32 / total_bases;
        }
        Some(prob)
    }

    fn compute(&self) -> KmerStats {
        let group_span = (self.longest_sequence + 1).saturating_sub(KMER_SIZE);
        let groups = BaseGroup::make_base_groups(group_span, self.no_group);
        let total_kmer_count: u64 = self.total_kmer_counts.iter().sum();

        let mut enriched = Vec::new();
        for (sequence, record) in &self.kmers {
            let Some(prob) = self.base_probability(sequence.as_bytes()) else {
                continue;
            };

            let predicted = prob * total_kmer_count as f32;
            let obs_exp = record.count as f32 / predicted;

            let mut obs_exp_positions = Vec::with_capacity(groups.len());
            for group in &groups {
                let mut group_count = 0u64;
                let mut group_hits = 0u64;
                for p in group.lower() - 1..group.upper().min(record.positions.len()) {
                    group_count += self.total_kmer_counts[p];
                    group_hits += record.positions[p];
                }
                obs_exp_positions.push(group_hits as f32 / (prob * group_count as f32));
            }

            let kmer = EnrichedKmer {
                sequence: sequence.clone(),
                count: record.count,
                obs_exp,
                obs_exp_positions,
            };
            if kmer.obs_exp > 3.0 || kmer.max_obs_exp() > 5.0 {
                enriched.push(kmer);
            }
        }

        enriched.sort_by(|a, b| {
            b.obs_exp
                .partial_cmp(&a.obs_exp)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let profiles = enriched
            .iter()
            .take(6)
            .map(|kmer| {
                let max = kmer.max_obs_exp();
                kmer.obs_exp_positions
                    .iter()
                    .map(|&v| (v / max) as f64 * 100.0)
                    .collect()
            })
            .collect();

        KmerStats {
            enriched,
            group_labels: groups.iter().map(BaseGroup::label).collect(),
            profiles,
        }
    }

    fn with_stats<T>(&self, f: impl FnOnce(&KmerStats) -> T) -> T {
        let mut guard = lock(&self.results);
        if guard.is_none() {
            *guard = Some(self.compute());
        }
        f(guard.as_ref().expect("memo just filled"))
    }
}

impl QcModule for KmerContent {
    fn name(&self) -> &'static str {
        "Kmer Content"
    }

    fn description(&self) -> &'static str {
        "Identifies short sequences which are overrepresented"
    }

    fn process_sequence(&mut self, record: &SeqRecord) {
        *lock(&self.results) = None;

        self.skip_count += 1;
        if self.skip_count % SAMPLE_INTERVAL != 0 {
            return;
        }

        let seq = &record.sequence;
        if seq.len() > self.longest_sequence {
            self.longest_sequence = seq.len();
        }

        for &base in seq.iter() {
            match base {
                b'G' => self.g_count += 1,
                b'A' => self.a_count += 1,
                b'T' => self.t_count += 1,
                b'C' => self.c_count += 1,
                _ => {}
            }
        }

        if seq.len() < KMER_SIZE {
            return;
        }
        let position_span = seq.len() - KMER_SIZE + 1;
        for i in 0..position_span {
            let kmer = &seq[i..i + KMER_SIZE];
            self.add_kmer_count(i, kmer);
            if kmer.contains(&b'N') {
                continue;
            }

            let key = String::from_utf8_lossy(kmer).into_owned();
            if let Some(existing) = self.kmers.get_mut(&key) {
                if i >= existing.positions.len() {
                    existing.positions.resize(i + 1, 0);
                }
                existing.count += 1;
                existing.positions[i] += 1;
            } else {
                let mut positions = vec![0u64; position_span];
                positions[i] = 1;
                self.kmers.insert(
                    key,
                    KmerRecord {
                        count: 1,
                        positions,
                    },
                );
            }
        }
    }

    fn reset(&mut self) {
        let no_group = self.no_group;
        *self = KmerContent::new(no_group);
    }

    fn raises_error(&self) -> bool {
        self.with_stats(|s| {
            s.enriched
                .first()
                .map_or(false, |top| top.max_obs_exp() > 10.0)
        })
    }

    fn raises_warning(&self) -> bool {
        self.with_stats(|s| !s.enriched.is_empty())
    }

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        self.with_stats(|s| {
            if !s.enriched.is_empty() {
                let mut plot = String::new();
                plot.push_str(&format!("#Position\t{}\n", s.group_labels.join("\t")));
                for profile in &s.profiles {
                    let cells: Vec<String> = profile.iter().map(|v| format!("{}", v)).collect();
                    plot.push_str(&cells.join("\t"));
                    plot.push('\n');
                }
                sink.named_entry("Images/kmer_profiles.png")
                    .extend_from_slice(plot.as_bytes());

                sink.html().push_str(
                    "<p><img class=\"indented\" src=\"Images/kmer_profiles.png\" \
                     alt=\"Kmer graph\"></p>\n",
                );
            } else {
                sink.html().push_str("<p>No overrepresented Kmers</p>\n");
            }

            let data = sink.data();
            data.push_str("#Sequence\tCount\tObs/Exp Overall\tObs/Exp Max\tMax Obs/Exp Position\n");
            for kmer in &s.enriched {
                // Reported counts are scaled back up for the sampling rate.
                data.push_str(&format!(
                    "{}\t{}\t{}\t{}\t{}\n",
                    kmer.sequence,
                    kmer.count * SAMPLE_INTERVAL,
                    kmer.obs_exp,
                    kmer.max_obs_exp(),
                    s.group_labels[kmer.max_position() - 1]
                ));
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::testutil::record_seq;
    use crate::report::BufferSink;

    fn feed(module: &mut KmerContent, seq: &[u8], times: usize) {
        for _ in 0..times {
            module.process_sequence(&record_seq(seq));
        }
    }

    #[test]
    fn only_every_fifth_read_is_sampled() {
        let mut module = KmerContent::new(false);
        feed(&mut module, b"ACGTACGTAC", 4);
        assert!(module.kmers.is_empty());
        feed(&mut module, b"ACGTACGTAC", 1);
        assert!(!module.kmers.is_empty());
    }

    #[test]
    fn homopolymer_reads_are_their_own_expectation() {
        let mut module = KmerContent::new(false);
        feed(&mut module, b"AAAAA", 5);
        // All-A composition predicts the single observed k-mer exactly.
        assert!(!module.raises_warning());
        assert!(!module.raises_error());
    }

    #[test]
    fn positionally_pinned_kmers_are_enriched() {
        let mut module = KmerContent::new(false);
        // One sampled read with a 50/50 composition: each 5-mer occurs 32
        // times more often than composition alone predicts.
        feed(&mut module, b"AAAAACCCCC", 5);
        assert!(module.raises_warning());
        assert!(module.raises_error());
        module.with_stats(|s| {
            assert!(!s.enriched.is_empty());
            assert!(s.enriched[0].obs_exp > 3.0);
        });
    }

    #[test]
    fn kmers_with_n_are_not_tracked() {
        let mut module = KmerContent::new(false);
        feed(&mut module, b"AANAA", 5);
        assert!(module.kmers.is_empty());
        // The position row still exists so later reads index safely.
        assert_eq!(module.total_kmer_counts.len(), 1);
        assert_eq!(module.total_kmer_counts[0], 0);
    }

    #[test]
    fn short_reads_contribute_composition_only() {
        let mut module = KmerContent::new(false);
        feed(&mut module, b"ACG", 5);
        assert!(module.kmers.is_empty());
        assert_eq!(module.a_count, 1);
    }

    #[test]
    fn report_scales_counts_for_sampling() {
        let mut module = KmerContent::new(false);
        feed(&mut module, b"AAAAACCCCC", 5);
        let mut sink = BufferSink::new();
        module.write_report(&mut sink).unwrap();
        assert!(sink.data_document().contains("#Sequence\tCount\t"));
        // Each enriched k-mer was seen once in the sampled read.
        assert!(sink.data_document().contains("\t5\t"));
    }

    #[test]
    fn reset_clears_sampling_state() {
        let mut module = KmerContent::new(false);
        feed(&mut module, b"AAAAACCCCC", 5);
        module.reset();
        assert!(module.kmers.is_empty());
        assert_eq!(module.skip_count, 0);
    }
}
