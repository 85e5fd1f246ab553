use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};
use crate::fastq::FastqReader;
use crate::types::CollapsedRead;

/// Separates the sequential id from the multiplicity in collapsed read names,
/// e.g. `read17_x240`.
pub const MULTIPLICITY_DELIMITER: &str = "_x";

/// Name written for the `id`-th unique sequence seen `multiplicity` times.
pub fn collapsed_read_name(id: usize, multiplicity: u32) -> String {
    format!("read{id}{MULTIPLICITY_DELIMITER}{multiplicity}")
}

/// Recovers the multiplicity encoded in a collapsed read name.
///
/// Names without the delimiter come from uncollapsed input and count once.
pub fn multiplicity_from_name(name: &str) -> Result<u32> {
    match name.rsplit_once(MULTIPLICITY_DELIMITER) {
        None => Ok(1),
        Some((_, count)) => match count.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(Error::InputFormat(format!(
                "read name '{name}' carries an invalid multiplicity suffix"
            ))),
        },
    }
}

/// Deduplicates reads by exact, case-sensitive sequence.
///
/// Unique sequences are kept in first-seen order so that the synthetic ids
/// are stable for a given input.
#[derive(Debug, Default)]
pub struct ReadCollapser {
    index: AHashMap<String, usize>,
    reads: Vec<CollapsedRead>,
    total: u64,
}

impl ReadCollapser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sequence: &str) {
        self.total += 1;
        match self.index.get(sequence) {
            Some(&i) => self.reads[i].multiplicity += 1,
            None => {
                self.index.insert(sequence.to_string(), self.reads.len());
                self.reads.push(CollapsedRead {
                    sequence: sequence.to_string(),
                    multiplicity: 1,
                });
            }
        }
    }

    /// Number of raw reads seen so far.
    pub fn total_reads(&self) -> u64 {
        self.total
    }

    pub fn unique_reads(&self) -> usize {
        self.reads.len()
    }

    pub fn into_reads(self) -> impl Iterator<Item = CollapsedRead> {
        self.reads.into_iter()
    }
}

/// Collapses a fallible stream of raw read sequences.
pub fn collapse_reads<I, S>(reads: I) -> Result<Vec<CollapsedRead>>
where
    I: IntoIterator<Item = Result<S>>,
    S: AsRef<str>,
{
    let mut collapser = ReadCollapser::new();
    for read in reads {
        collapser.add(read?.as_ref());
    }
    Ok(collapser.into_reads().collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollapseSummary {
    pub total_reads: u64,
    pub unique_reads: usize,
}

fn write_fasta_records<W: Write>(reads: &[CollapsedRead], out: &mut W) -> std::io::Result<()> {
    for (i, read) in reads.iter().enumerate() {
        writeln!(out, ">{}", collapsed_read_name(i + 1, read.multiplicity))?;
        writeln!(out, "{}", read.sequence)?;
    }
    Ok(())
}

/// Writes collapsed reads as FASTA with multiplicity-bearing names. The
/// output is gzip-compressed when `fasta_path` ends in `.gz`.
pub fn write_collapsed_fasta<P: AsRef<Path>>(reads: &[CollapsedRead], fasta_path: P) -> Result<()> {
    let path = fasta_path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(e, path))?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let written = if is_gz {
        let mut enc = GzEncoder::new(BufWriter::new(file), Compression::default());
        write_fasta_records(reads, &mut enc).and_then(|_| enc.finish()?.flush())
    } else {
        let mut out = BufWriter::new(file);
        write_fasta_records(reads, &mut out).and_then(|_| out.flush())
    };
    written.map_err(|e| Error::io(e, path))
}

/// Collapses a FASTQ file (plain or gzip) into a FASTA of unique reads.
pub fn collapse_fastq<P: AsRef<Path>, Q: AsRef<Path>>(
    fastq_path: P,
    fasta_path: Q,
) -> Result<CollapseSummary> {
    let mut collapser = ReadCollapser::new();
    for record in FastqReader::from_path(&fastq_path)? {
        collapser.add(&record?.sequence);
    }

    let summary = CollapseSummary {
        total_reads: collapser.total_reads(),
        unique_reads: collapser.unique_reads(),
    };
    log::info!(
        "Collapsed {} reads into {} unique sequences",
        summary.total_reads,
        summary.unique_reads
    );

    let reads: Vec<CollapsedRead> = collapser.into_reads().collect();
    write_collapsed_fasta(&reads, fasta_path)?;
    Ok(summary)
}
