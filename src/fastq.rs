use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::{Error, Result};

/// First two bytes of every gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Opens `path` for line reading, transparently decompressing gzip.
///
/// Compression is detected from the leading magic bytes, not the extension.
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| Error::io(e, path))?;
    let mut reader = BufReader::new(f);

    let is_gz = reader
        .fill_buf()
        .map_err(|e| Error::io(e, path))?
        .starts_with(&GZIP_MAGIC);

    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    pub id: String,
    pub sequence: String,
    pub quality: String,
}

/// Lazy FASTQ parser. Yields one record per four-line block and fails on the
/// first block whose structure does not match.
pub struct FastqReader<R> {
    inner: R,
    path: PathBuf,
    line: String,
    line_no: usize,
}

impl FastqReader<Box<dyn BufRead + Send>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self::new(open_reader(path)?, path))
    }
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(inner: R, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            line: String::new(),
            line_no: 0,
        }
    }

    /// Reads the next line into `self.line`, returning false on EOF.
    fn next_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self
            .inner
            .read_line(&mut self.line)
            .map_err(|e| Error::io(e, &self.path))?;
        if n == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        let trimmed = self.line.trim_end_matches(['\n', '\r']).len();
        self.line.truncate(trimmed);
        Ok(true)
    }

    fn malformed(&self, what: &str) -> Error {
        Error::InputFormat(format!(
            "{}:{}: {}",
            self.path.display(),
            self.line_no,
            what
        ))
    }

    fn read_record(&mut self) -> Result<Option<FastqRecord>> {
        // 1) header, skipping blank lines between records
        loop {
            if !self.next_line()? {
                return Ok(None);
            }
            if !self.line.is_empty() {
                break;
            }
        }
        let header = match self.line.strip_prefix('@') {
            Some(h) => h,
            None => return Err(self.malformed("record header does not start with '@'")),
        };
        let id = header.split_whitespace().next().unwrap_or_default().to_string();

        // 2) sequence
        if !self.next_line()? {
            return Err(self.malformed("truncated record, missing sequence"));
        }
        let sequence = self.line.clone();
        if sequence.is_empty() {
            return Err(self.malformed("empty sequence"));
        }

        // 3) plus line
        if !self.next_line()? {
            return Err(self.malformed("truncated record, missing '+' line"));
        }
        if !self.line.starts_with('+') {
            return Err(self.malformed("separator line does not start with '+'"));
        }

        // 4) quality
        if !self.next_line()? {
            return Err(self.malformed("truncated record, missing quality"));
        }
        if self.line.len() != sequence.len() {
            return Err(self.malformed("quality length differs from sequence length"));
        }
        let quality = self.line.clone();

        Ok(Some(FastqRecord {
            id,
            sequence,
            quality,
        }))
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    const FASTQ: &str = "@r1 extra\nACGT\n+\nIIII\n@r2\nTTGA\n+r2\nIIII\n";

    #[test]
    fn parses_plain_records() {
        let reader = FastqReader::new(Cursor::new(FASTQ), "mem");
        let records: Vec<_> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "r1");
        assert_eq!(records[1].sequence, "TTGA");
    }

    #[test]
    fn rejects_mismatched_quality() {
        let reader = FastqReader::new(Cursor::new("@r1\nACGT\n+\nII\n"), "mem");
        let err = reader.collect::<Result<Vec<_>>>().unwrap_err();
        assert!(matches!(err, Error::InputFormat(_)));
    }

    #[test]
    fn rejects_truncated_record() {
        let reader = FastqReader::new(Cursor::new("@r1\nACGT\n"), "mem");
        assert!(reader.collect::<Result<Vec<_>>>().is_err());
    }

    #[test]
    fn rejects_fasta_input() {
        let reader = FastqReader::new(Cursor::new(">r1\nACGT\n"), "mem");
        assert!(reader.collect::<Result<Vec<_>>>().is_err());
    }

    #[test]
    fn sniffs_gzip_regardless_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fastq");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(FASTQ.as_bytes()).unwrap();
        enc.finish().unwrap();

        let records: Vec<_> = FastqReader::from_path(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn reads_plain_file_with_gz_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fastq.gz");
        std::fs::write(&path, FASTQ).unwrap();

        let records: Vec<_> = FastqReader::from_path(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records[0].quality, "IIII");
    }
}
