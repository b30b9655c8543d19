use std::sync::Arc;

/// One decoded read: uppercase symbol sequence, the raw encoded quality
/// string, an identifier, and the name of the source it came from. Created
/// once per decoded record and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct SeqRecord {
    pub sequence: Box<[u8]>,
    pub quality: Box<[u8]>,
    pub id: String,
    /// Back-reference to the producing source, for naming only.
    pub source: Arc<str>,
    /// The raw colorspace calls, when the source was colorspace data.
    pub colorspace: Option<Box<[u8]>>,
    /// Set by format-specific heuristics, e.g. the Casava "filtered"
    /// marker on the id line.
    pub filtered: bool,
}

impl SeqRecord {
    pub fn new(source: Arc<str>, id: String, sequence: Vec<u8>, quality: Vec<u8>) -> SeqRecord {
        SeqRecord {
            sequence: sequence.into_boxed_slice(),
            quality: quality.into_boxed_slice(),
            id,
            source,
            colorspace: None,
            filtered: false,
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}
