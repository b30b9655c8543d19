pub mod basic_stats;
pub mod duplication;
pub mod kmer;
pub mod length_distribution;
pub mod n_content;
pub mod overrepresented;
pub mod per_base_content;
pub mod per_base_gc;
pub mod per_base_quality;
pub mod per_sequence_gc;
pub mod per_sequence_quality;

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::config::QcConfig;
use crate::error::Result;
use crate::report::ReportSink;
use crate::seq::SeqRecord;

pub use basic_stats::BasicStats;
pub use duplication::DuplicationLevel;
pub use kmer::KmerContent;
pub use length_distribution::LengthDistribution;
pub use n_content::NContent;
pub use overrepresented::OverRepresentedSeqs;
pub use per_base_content::PerBaseContent;
pub use per_base_gc::PerBaseGc;
pub use per_base_quality::PerBaseQuality;
pub use per_sequence_gc::PerSequenceGc;
pub use per_sequence_quality::PerSequenceQuality;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModuleStatus::Pass => "pass",
            ModuleStatus::Warn => "warn",
            ModuleStatus::Fail => "fail",
        })
    }
}

/// One metric in the battery.
///
/// `process_sequence` is pure accumulation: it never fails, never blocks,
/// and grows internal state to fit reads longer than any seen before.
/// Derived statistics are computed lazily on the first status or report
/// query and memoized until the next ingestion or `reset`; the memo guard
/// is a mutex so concurrent observers of a finalized module can query it
/// without recomputation divergence.
pub trait QcModule: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Whether the caller should withhold reads carrying the "filtered"
    /// flag from this module. Enforced by the analysis runner, not here.
    fn ignores_filtered(&self) -> bool {
        true
    }

    fn process_sequence(&mut self, record: &SeqRecord);

    /// Clear all accumulated and derived state.
    fn reset(&mut self);

    fn raises_error(&self) -> bool;

    fn raises_warning(&self) -> bool;

    fn write_report(&self, sink: &mut dyn ReportSink) -> Result<()>;

    fn status(&self) -> ModuleStatus {
        if self.raises_error() {
            ModuleStatus::Fail
        } else if self.raises_warning() {
            ModuleStatus::Warn
        } else {
            ModuleStatus::Pass
        }
    }
}

/// Lock a memo mutex, recovering from poisoning; finalize computations
/// hold the guard only while writing the memo.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The full module battery for one analysis task. The duplication-level
/// module shares the over-representation tracker, so the two are built
/// together.
pub fn battery(config: &QcConfig) -> Vec<Box<dyn QcModule>> {
    let overrepresented = OverRepresentedSeqs::new();
    let duplication = overrepresented.duplication_module();

    vec![
        Box::new(BasicStats::new()),
        Box::new(PerBaseQuality::new(config.no_group)),
        Box::new(PerSequenceQuality::new()),
        Box::new(PerBaseContent::new(config.no_group)),
        Box::new(PerBaseGc::new(config.no_group)),
        Box::new(PerSequenceGc::new()),
        Box::new(NContent::new(config.no_group)),
        Box::new(LengthDistribution::new()),
        Box::new(duplication),
        Box::new(overrepresented),
        Box::new(KmerContent::new(config.no_group)),
    ]
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use crate::seq::SeqRecord;

    /// Build a record with matching sequence/quality lengths for module
    /// tests.
    pub fn record(sequence: &[u8], quality: &[u8]) -> SeqRecord {
        SeqRecord::new(
            Arc::from("test.fastq"),
            "@test".to_string(),
            sequence.to_vec(),
            quality.to_vec(),
        )
    }

    pub fn record_seq(sequence: &[u8]) -> SeqRecord {
        record(sequence, &vec![b'I'; sequence.len()])
    }
}
