use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use regex::Regex;

use super::record::SeqRecord;
use super::SequenceSource;
use crate::error::{QcError, Result};

/// Wraps the raw file handle and counts bytes as they are consumed, so the
/// position can be read for progress reporting even when a decompressor
/// sits on top.
struct CountingReader<R> {
    inner: R,
    pos: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Four-line delimited text format: id line (`@`), sequence, separator
/// (`+`), quality. Gzip and bzip2 input is decompressed transparently.
///
/// If the first record's sequence matches the colorspace pattern the whole
/// source is flagged colorspace and every read is translated into
/// nucleotide space.
pub struct FastqSource {
    path: PathBuf,
    name: Arc<str>,
    reader: BufReader<Box<dyn Read + Send>>,
    raw_pos: Arc<AtomicU64>,
    file_size: u64,
    casava: bool,
    colorspace: bool,
    records_read: u64,
    pending: Option<SeqRecord>,
}

impl FastqSource {
    pub fn open(path: &Path, casava: bool) -> Result<FastqSource> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let raw_pos = Arc::new(AtomicU64::new(0));
        let counting = CountingReader {
            inner: file,
            pos: Arc::clone(&raw_pos),
        };
        let (inner, _compression) = niffler::send::get_reader(Box::new(counting))?;
        let name: Arc<str> = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
            .into();

        let mut source = FastqSource {
            path: path.to_path_buf(),
            name,
            reader: BufReader::with_capacity(1 << 20, inner),
            raw_pos,
            file_size,
            casava,
            colorspace: false,
            records_read: 0,
            pending: None,
        };
        source.read_ahead()?;
        Ok(source)
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn read_ahead(&mut self) -> Result<()> {
        // Blank lines may appear between records or at the end.
        let id = loop {
            match self.read_line()? {
                None => {
                    self.pending = None;
                    return Ok(());
                }
                Some(line) if line.is_empty() => continue,
                Some(line) => break line,
            }
        };

        if !id.starts_with('@') {
            return Err(QcError::Format(format!(
                "id line '{}' didn't start with '@'",
                id
            )));
        }

        let seq = self
            .read_line()?
            .ok_or_else(|| QcError::Format(format!("record '{}' truncated after id line", id)))?;
        let midline = self.read_line()?.ok_or_else(|| {
            QcError::Format(format!("record '{}' truncated before separator line", id))
        })?;
        if !midline.starts_with('+') {
            return Err(QcError::Format(format!(
                "separator line '{}' didn't start with '+'",
                midline
            )));
        }
        let quality = self.read_line()?.ok_or_else(|| {
            QcError::Format(format!("record '{}' truncated before quality line", id))
        })?;

        if self.records_read == 0 {
            self.colorspace = looks_like_colorspace(&seq);
        }
        self.records_read += 1;

        let upper = seq.to_ascii_uppercase().into_bytes();
        let mut record = if self.colorspace {
            let bases = colorspace_to_bases(&upper)?;
            let mut rec = SeqRecord::new(Arc::clone(&self.name), id.clone(), bases, quality.into_bytes());
            rec.colorspace = Some(upper.into_boxed_slice());
            rec
        } else {
            SeqRecord::new(Arc::clone(&self.name), id.clone(), upper, quality.into_bytes())
        };

        // The marker Illumina suggest for filtered reads in Casava output.
        if self.casava {
            record.filtered = id.find(":Y:").map_or(false, |i| i > 0);
        }

        self.pending = Some(record);
        Ok(())
    }
}

impl SequenceSource for FastqSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn has_next(&mut self) -> bool {
        self.pending.is_some()
    }

    fn next_record(&mut self) -> Result<SeqRecord> {
        let record = self
            .pending
            .take()
            .ok_or_else(|| QcError::Format("read past the end of the stream".to_string()))?;
        self.read_ahead()?;
        Ok(record)
    }

    fn percent_complete(&self) -> f64 {
        if self.file_size == 0 {
            return 100.0;
        }
        (self.raw_pos.load(Ordering::Relaxed) as f64 / self.file_size as f64) * 100.0
    }

    fn is_colorspace(&self) -> bool {
        self.colorspace
    }
}

/// Basecalled files can be all dots, which must not be mistaken for
/// colorspace data, so the pattern requires a leading base call.
fn looks_like_colorspace(seq: &str) -> bool {
    // A literal pattern, compiled per file open rather than per record.
    let pattern = Regex::new(r"^[GATCNgatcn][.0-6]+$").expect("static pattern");
    pattern.is_match(seq)
}

fn transition(ref_base: u8, call: u8) -> Option<u8> {
    let idx = match ref_base {
        b'G' => 0,
        b'A' => 1,
        b'T' => 2,
        b'C' => 3,
        _ => return None,
    };
    let table: &[u8; 4] = match call {
        b'0' => b"GATC",
        b'1' => b"TCGA",
        b'2' => b"AGCT",
        b'3' => b"CTAG",
        _ => return None,
    };
    Some(table[idx])
}

/// Translate a colorspace read (leading base call plus transition digits)
/// into nucleotide space. `.`, `4`, `5` and `6` carry no base information
/// and poison every later position in the read to `N`.
fn colorspace_to_bases(calls: &[u8]) -> Result<Vec<u8>> {
    // A zero length colorspace entry is invalid but has been seen in the
    // wild; produce an empty read rather than failing the file.
    if calls.is_empty() {
        return Ok(Vec::new());
    }

    let mut bases = vec![0u8; calls.len() - 1];
    let mut ref_base = calls[0];

    for i in 1..calls.len() {
        match calls[i] {
            b'.' | b'4' | b'5' | b'6' => {
                for slot in bases.iter_mut().skip(i - 1) {
                    *slot = b'N';
                }
                return Ok(bases);
            }
            call @ (b'0' | b'1' | b'2' | b'3') => {
                let base = transition(ref_base, call).ok_or_else(|| {
                    QcError::Decode(format!(
                        "reference base '{}' at position {} has no colorspace transition",
                        ref_base as char, i
                    ))
                })?;
                bases[i - 1] = base;
                ref_base = base;
            }
            other => {
                return Err(QcError::Decode(format!(
                    "unexpected colorspace character '{}'",
                    other as char
                )))
            }
        }
    }

    Ok(bases)
}
