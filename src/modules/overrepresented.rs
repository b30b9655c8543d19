use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::duplication::DuplicationLevel;
use super::{lock, QcModule};
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;

/// Once this many distinct sequences have been seen, stop tracking new
/// ones. Existing entries keep counting, and the total at the moment of
/// freezing lets later estimates be scaled back up.
pub(crate) const UNIQUE_SEQUENCE_LIMIT: usize = 100_000;

/// Sequences longer than this are keyed by their prefix so small
/// sequencing errors at the ends of long reads do not hide duplication.
const TRACK_FULL_LENGTH_BELOW: usize = 75;
const TRACKED_PREFIX: usize = 50;

/// Shared sequence census behind both the over-representation and the
/// duplication-level modules.
pub(crate) struct SeqTracker {
    pub(crate) sequences: HashMap<String, u64>,
    pub(crate) count: u64,
    pub(crate) count_at_unique_limit: u64,
    frozen: bool,
}

impl SeqTracker {
    fn new() -> SeqTracker {
        SeqTracker {
            sequences: HashMap::new(),
            count: 0,
            count_at_unique_limit: 0,
            frozen: false,
        }
    }

    fn add(&mut self, sequence: &[u8]) {
        self.count += 1;

        let key = if sequence.len() > TRACK_FULL_LENGTH_BELOW {
            &sequence[..TRACKED_PREFIX]
        } else {
            sequence
        };
        let key = String::from_utf8_lossy(key).into_owned();

        if let Some(existing) = self.sequences.get_mut(&key) {
            *existing += 1;
        } else if !self.frozen {
            self.sequences.insert(key, 1);
            if self.sequences.len() == UNIQUE_SEQUENCE_LIMIT {
                self.frozen = true;
                self.count_at_unique_limit = self.count;
            }
        }
    }

    fn clear(&mut self) {
        *self = SeqTracker::new();
    }
}

struct OverRepStats {
    /// Sequence, count and percentage of all reads, sorted by percentage
    /// descending, limited to entries above the reporting threshold.
    entries: Vec<(String, u64, f64)>,
}

/// Lists individual sequences making up a disproportionate share of the
/// library, which usually means adapter dimers or heavy PCR bias.
pub struct OverRepresentedSeqs {
    tracker: Arc<Mutex<SeqTracker>>,
    results: Mutex<Option<OverRepStats>>,
}

impl OverRepresentedSeqs {
    pub fn new() -> OverRepresentedSeqs {
        OverRepresentedSeqs {
            tracker: Arc::new(Mutex::new(SeqTracker::new())),
            results: Mutex::new(None),
        }
    }

    /// The duplication-level module fed by this module's census. Build it
    /// before analysis starts and run both in the same battery.
    pub fn duplication_module(&self) -> DuplicationLevel {
        DuplicationLevel::new(Arc::clone(&self.tracker))
    }

    fn compute(&self) -> OverRepStats {
        let tracker = lock(&self.tracker);
        if tracker.count == 0 {
            return OverRepStats {
                entries: Vec::new(),
            };
        }

        let mut entries: Vec<(String, u64, f64)> = tracker
            .sequences
            .iter()
            .map(|(seq, &count)| {
                (
                    seq.clone(),
                    count,
                    count as f64 / tracker.count as f64 * 100.0,
                )
            })
            .filter(|&(_, _, percent)| percent > 0.1)
            .collect();
        entries.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        OverRepStats { entries }
    }

    fn with_stats<T>(&self, f: impl FnOnce(&OverRepStats) -> T) -> T {
        let mut guard = lock(&self.results);
        if guard.is_none() {
            *guard = Some(self.compute());
        }
        f(guard.as_ref().expect("memo just filled"))
    }
}

impl Default for OverRepresentedSeqs {
    fn default() -> Self {
        OverRepresentedSeqs::new()
    }
}

impl QcModule for OverRepresentedSeqs {
    fn name(&self) -> &'static str {
        "Overrepresented sequences"
    }

    fn description(&self) -> &'static str {
        "Identifies sequences which are overrepresented in the set"
    }

    fn process_sequence(&mut self, record: &SeqRecord) {
        *lock(&self.results) = None;
        lock(&self.tracker).add(&record.sequence);
    }

    fn reset(&mut self) {
        lock(&self.tracker).clear();
        *lock(&self.results) = None;
    }

    fn raises_error(&self) -> bool {
        self.with_stats(|s| s.entries.iter().any(|&(_, _, p)| p > 1.0))
    }

    fn raises_warning(&self) -> bool {
        self.with_stats(|s| !s.entries.is_empty())
    }

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()> {
        self.with_stats(|s| {
            let data = sink.data();
            data.push_str("#Sequence\tCount\tPercentage\tPossible Source\n");
            for (seq, count, percent) in &s.entries {
                data.push_str(&format!("{}\t{}\t{}\tNo Hit\n", seq, count, percent));
            }

            if s.entries.is_empty() {
                sink.html()
                    .push_str("<p>No overrepresented sequences</p>\n");
            } else {
                let html = sink.html();
                html.push_str(
                    "<table>\n<tr><th>Sequence</th><th>Count</th>\
                     <th>Percentage</th><th>Possible Source</th></tr>\n",
                );
                for (seq, count, percent) in &s.entries {
                    html.push_str(&format!(
                        "<tr><td>{}</td><td>{}</td><td>{}</td><td>No Hit</td></tr>\n",
                        seq, count, percent
                    ));
                }
                html.push_str("</table>\n");
            }
        });
        Ok(())
    }
}
