use log::warn;

/// Known Phred quality scales, selected from the lowest quality character
/// observed in a file. Once detected the encoding is fixed for the life of
/// one module's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhredEncoding {
    /// Sanger / Illumina 1.9+, offset 33.
    Sanger,
    /// Illumina 1.3, offset 64.
    Illumina13,
    /// Illumina 1.5, offset 64.
    Illumina15,
}

impl PhredEncoding {
    /// Pick the most likely encoding for a file from its lowest recorded
    /// quality character. Characters below 33 belong to no known scale; we
    /// fall back to Sanger rather than refusing the file.
    pub fn from_lowest_char(lowest: u8) -> PhredEncoding {
        if lowest < 33 {
            warn!(
                "quality character {} is below any known encoding, assuming Sanger",
                lowest
            );
            PhredEncoding::Sanger
        } else if lowest < 64 {
            PhredEncoding::Sanger
        } else if lowest < 66 {
            PhredEncoding::Illumina13
        } else {
            PhredEncoding::Illumina15
        }
    }

    pub fn offset(&self) -> u8 {
        match self {
            PhredEncoding::Sanger => 33,
            PhredEncoding::Illumina13 | PhredEncoding::Illumina15 => 64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PhredEncoding::Sanger => "Sanger / Illumina 1.9",
            PhredEncoding::Illumina13 => "Illumina 1.3",
            PhredEncoding::Illumina15 => "Illumina 1.5",
        }
    }
}

impl std::fmt::Display for PhredEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
