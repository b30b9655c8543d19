use std::path::PathBuf;

use clap::Parser;

use crate::config::{QcConfig, SourceFormat};

#[derive(Parser)]
#[command(author, version, about = "Quality control checks for high throughput sequence data", long_about = None)]
pub struct Args {
    /// Sequence files to analyse (FASTQ, optionally gzip/bzip2 compressed, or BAM/SAM)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Number of files to analyse in parallel
    #[arg(short = 't', long, default_value = "1")]
    pub threads: usize,

    /// Disable position grouping: report every base position individually
    #[arg(long = "nogroup")]
    pub no_group: bool,

    /// Treat input as Casava output: merge split files into one sample and
    /// honour the filtered flag on read ids
    #[arg(long)]
    pub casava: bool,

    /// Only analyse mapped reads from BAM/SAM input
    #[arg(long = "mapped-only")]
    pub mapped_only: bool,

    /// Force the input format instead of inferring it from the extension
    #[arg(long, value_enum)]
    pub format: Option<SourceFormat>,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn to_config(&self) -> QcConfig {
        QcConfig {
            threads: self.threads,
            no_group: self.no_group,
            casava: self.casava,
            mapped_only: self.mapped_only,
            format: self.format,
            quiet: self.quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_core_config() {
        let args = Args::parse_from(["readqc", "sample.fastq"]);
        let config = args.to_config();
        assert_eq!(config.threads, 1);
        assert!(!config.no_group);
        assert!(!config.casava);
        assert!(config.format.is_none());
    }

    #[test]
    fn flags_carry_through() {
        let args = Args::parse_from([
            "readqc",
            "-t",
            "4",
            "--nogroup",
            "--casava",
            "--format",
            "bam",
            "a.fastq",
            "b.fastq",
        ]);
        let config = args.to_config();
        assert_eq!(config.threads, 4);
        assert!(config.no_group);
        assert!(config.casava);
        assert_eq!(config.format, Some(SourceFormat::Bam));
        assert_eq!(args.files.len(), 2);
    }
}
