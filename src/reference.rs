//src/reference.rs

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::fastq::open_reader;

/// Name and length of one reference (or assembled) sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigInfo {
    pub name: String,
    pub length: usize,
}

/// Reads contig names and lengths from a FASTA file in the format:
/// ```text
/// >name optional description
/// ACGT...
/// ```
/// The name is the header up to the first whitespace. Records come back in
/// file order.
pub fn read_contigs<P: AsRef<Path>>(fasta_path: P) -> Result<Vec<ContigInfo>> {
    let path = fasta_path.as_ref();
    let reader = open_reader(path)?;
    let mut contigs: Vec<ContigInfo> = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::io(e, path))?;
        let line = line.trim_end();
        if let Some(header) = line.strip_prefix('>') {
            let name = header.split_whitespace().next().unwrap_or_default();
            if name.is_empty() {
                return Err(Error::InputFormat(format!(
                    "{}:{}: FASTA header without a name",
                    path.display(),
                    line_no + 1
                )));
            }
            contigs.push(ContigInfo {
                name: name.to_string(),
                length: 0,
            });
        } else if !line.is_empty() {
            match contigs.last_mut() {
                Some(contig) => contig.length += line.len(),
                None => {
                    return Err(Error::InputFormat(format!(
                        "{}:{}: sequence data before the first FASTA header",
                        path.display(),
                        line_no + 1
                    )))
                }
            }
        }
    }
    Ok(contigs)
}

/// Writes a `name<TAB>length` chrom.sizes file.
pub fn write_chrom_sizes<P: AsRef<Path>>(contigs: &[ContigInfo], out_path: P) -> Result<()> {
    let path = out_path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(e, path))?;
    let mut out = BufWriter::new(file);
    for contig in contigs {
        writeln!(out, "{}\t{}", contig.name, contig.length).map_err(|e| Error::io(e, path))?;
    }
    out.flush().map_err(|e| Error::io(e, path))
}
