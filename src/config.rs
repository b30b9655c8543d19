use serde::Deserialize;

/// On-disk read formats the source factory can be forced into; when absent
/// the format is inferred from the file extension.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[value(name = "fastq")]
    Fastq,
    #[value(name = "bam")]
    Bam,
}

/// Settings the core consumes. Populated by the driver from CLI flags; the
/// core itself never parses anything.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QcConfig {
    /// Concurrent analysis slots.
    pub threads: usize,
    /// Disable position grouping: one group per base position.
    pub no_group: bool,
    /// Casava mode: group split files by shared stem and honour the
    /// "filtered" marker on id lines.
    pub casava: bool,
    /// Only analyse mapped reads from alignment containers.
    pub mapped_only: bool,
    /// Format override; inferred from the extension when unset.
    pub format: Option<SourceFormat>,
    pub quiet: bool,
}

impl Default for QcConfig {
    fn default() -> Self {
        QcConfig {
            threads: 1,
            no_group: false,
            casava: false,
            mapped_only: false,
            format: None,
            quiet: false,
        }
    }
}

impl QcConfig {
    /// Slot count with the lower bound enforced.
    pub fn slots(&self) -> usize {
        self.threads.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_one_slot() {
        assert_eq!(QcConfig::default().slots(), 1);
    }

    #[test]
    fn zero_threads_is_clamped() {
        let config = QcConfig {
            threads: 0,
            ..QcConfig::default()
        };
        assert_eq!(config.slots(), 1);
    }
}
