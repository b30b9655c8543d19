use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use super::record::SeqRecord;
use super::SequenceSource;
use crate::error::{QcError, Result};

/// Derive the shared stem of a Casava-style split file name, e.g.
/// `sample_L001_R1_001.fastq.gz` -> `sample_L001_R1`. Files from the same
/// lane and read that differ only in their chunk number share a stem and
/// logically form one sample.
pub fn casava_basename(name: &str) -> Result<String> {
    let pattern =
        Regex::new(r"^(.+_R\d+)_\d{3}\.fastq(?:\.txt)?(?:\.gz|\.bz2)?$").expect("static pattern");
    pattern
        .captures(name)
        .map(|c| c[1].to_string())
        .ok_or_else(|| QcError::Name(name.to_string()))
}

/// Composes several sources representing split files into one logical
/// stream, advancing to the next member when the current one is exhausted.
pub struct SourceGroup {
    members: Vec<Box<dyn SequenceSource>>,
    current: usize,
    name: Arc<str>,
    path: PathBuf,
}

impl SourceGroup {
    /// `members` must be non-empty and ordered; the combined name is the
    /// members' shared Casava stem, falling back to the first member's own
    /// name when the stem cannot be derived.
    pub fn new(members: Vec<Box<dyn SequenceSource>>) -> SourceGroup {
        assert!(!members.is_empty(), "a source group needs members");

        let first = &members[0];
        let name: Arc<str> = match casava_basename(first.name()) {
            Ok(stem) => stem.into(),
            Err(_) => first.name().into(),
        };
        let path = match first.path().parent() {
            Some(parent) => parent.join(name.as_ref()),
            None => PathBuf::from(name.as_ref()),
        };

        SourceGroup {
            members,
            current: 0,
            name,
            path,
        }
    }
}

impl SequenceSource for SourceGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn has_next(&mut self) -> bool {
        if self.members[self.current].has_next() {
            return true;
        }
        if self.current < self.members.len() - 1 {
            self.current += 1;
        }
        self.members[self.current].has_next()
    }

    fn next_record(&mut self) -> Result<SeqRecord> {
        self.members[self.current].next_record()
    }

    fn percent_complete(&self) -> f64 {
        let inner = self.members[self.current].percent_complete();
        (100.0 * self.current as f64 + inner) / self.members.len() as f64
    }

    fn is_colorspace(&self) -> bool {
        self.members[self.current].is_colorspace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource {
        name: String,
        path: PathBuf,
        remaining: usize,
        total: usize,
    }

    impl FakeSource {
        fn new(name: &str, records: usize) -> FakeSource {
            FakeSource {
                name: name.to_string(),
                path: PathBuf::from(name),
                remaining: records,
                total: records,
            }
        }
    }

    impl SequenceSource for FakeSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn path(&self) -> &Path {
            &self.path
        }

        fn has_next(&mut self) -> bool {
            self.remaining > 0
        }

        fn next_record(&mut self) -> Result<SeqRecord> {
            self.remaining -= 1;
            Ok(SeqRecord::new(
                self.name.clone().into(),
                "r".to_string(),
                b"ACGT".to_vec(),
                b"IIII".to_vec(),
            ))
        }

        fn percent_complete(&self) -> f64 {
            ((self.total - self.remaining) as f64 / self.total as f64) * 100.0
        }
    }

    #[test]
    fn stem_derivation() {
        assert_eq!(
            casava_basename("sample_L001_R1_001.fastq.gz").unwrap(),
            "sample_L001_R1"
        );
        assert_eq!(
            casava_basename("sample_L001_R2_003.fastq").unwrap(),
            "sample_L001_R2"
        );
        assert!(casava_basename("sample.fastq").is_err());
    }

    #[test]
    fn advances_across_members() {
        let group_members: Vec<Box<dyn SequenceSource>> = vec![
            Box::new(FakeSource::new("s_L001_R1_001.fastq", 2)),
            Box::new(FakeSource::new("s_L001_R1_002.fastq", 3)),
        ];
        let mut group = SourceGroup::new(group_members);
        assert_eq!(group.name(), "s_L001_R1");

        let mut seen = 0;
        while group.has_next() {
            group.next_record().unwrap();
            seen += 1;
        }
        assert_eq!(seen, 5);
    }

    #[test]
    fn combined_percent_averages_over_members() {
        // First member (10 records) exhausted, second (20 records) half way:
        // (100*1 + 50) / 2.
        let group_members: Vec<Box<dyn SequenceSource>> = vec![
            Box::new(FakeSource::new("s_L001_R1_001.fastq", 10)),
            Box::new(FakeSource::new("s_L001_R1_002.fastq", 20)),
        ];
        let mut group = SourceGroup::new(group_members);
        for _ in 0..20 {
            assert!(group.has_next());
            group.next_record().unwrap();
        }
        assert!((group.percent_complete() - 75.0).abs() < 1e-9);
    }
}
