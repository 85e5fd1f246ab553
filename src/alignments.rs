//src/alignments.rs

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use noodles::core::Region;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::{bam, bgzf, sam};

use crate::collapse::multiplicity_from_name;
use crate::error::{Error, Result};
use crate::reference::ContigInfo;
use crate::types::{AlignedRead, Strand};

/// Suffix appended to an alignment path to locate its index.
pub const INDEX_SUFFIX: &str = ".bai";

pub fn index_path<P: AsRef<Path>>(bam_path: P) -> PathBuf {
    let mut index = OsString::from(bam_path.as_ref());
    index.push(INDEX_SUFFIX);
    PathBuf::from(index)
}

/// Check if a `<bam>.bai` file exists next to the alignments.
pub fn is_indexed<P: AsRef<Path>>(bam_path: P) -> bool {
    index_path(bam_path).exists()
}

/// Reference positions of the aligned bases plus the query alignment length
/// for an alignment starting at 0-based `start`.
///
/// Matches advance both sequences and are reported; insertions count toward
/// the query length only; deletions and skips advance the reference only;
/// clips and padding are ignored.
pub fn positions_from_cigar<I>(start: usize, ops: I) -> (Vec<usize>, usize)
where
    I: IntoIterator<Item = (Kind, usize)>,
{
    let mut positions = Vec::new();
    let mut ref_pos = start;
    let mut query_len = 0;

    for (kind, len) in ops {
        match kind {
            Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => {
                positions.extend(ref_pos..ref_pos + len);
                ref_pos += len;
                query_len += len;
            }
            Kind::Insertion => query_len += len,
            Kind::Deletion | Kind::Skip => ref_pos += len,
            Kind::SoftClip | Kind::HardClip | Kind::Pad => {}
        }
    }
    (positions, query_len)
}

/// Converts one BAM record into a footprint. Unmapped records yield `None`.
fn footprint_from_record(record: &bam::Record, contig: &Arc<str>) -> Result<Option<AlignedRead>> {
    let flags = record.flags();
    if flags.is_unmapped() {
        return Ok(None);
    }

    let name = record
        .name()
        .map(|n| String::from_utf8_lossy(n.as_ref()).to_string())
        .unwrap_or_default();
    let multiplicity = multiplicity_from_name(&name)?;

    let start = match record.alignment_start() {
        Some(Ok(pos)) => usize::from(pos) - 1,
        Some(Err(e)) => return Err(Error::InputFormat(format!("read '{name}': {e}"))),
        None => return Ok(None),
    };

    let mut ops = Vec::new();
    for op in record.cigar().iter() {
        let op = op.map_err(|e| Error::InputFormat(format!("read '{name}': bad CIGAR: {e}")))?;
        ops.push((op.kind(), op.len()));
    }
    let (positions, length) = positions_from_cigar(start, ops);

    let strand = if flags.is_reverse_complemented() {
        Strand::Reverse
    } else {
        Strand::Forward
    };

    Ok(Some(AlignedRead {
        contig: Arc::clone(contig),
        start,
        length,
        strand,
        multiplicity,
        positions,
    }))
}

/// A coordinate-sorted, indexed BAM file opened for per-contig fetches.
pub struct AlignmentFile {
    path: PathBuf,
    reader: bam::io::IndexedReader<bgzf::Reader<File>>,
    header: sam::Header,
}

impl AlignmentFile {
    /// Opens `bam_path` together with its `.bai` sibling.
    pub fn open<P: AsRef<Path>>(bam_path: P) -> Result<Self> {
        let path = bam_path.as_ref().to_path_buf();
        let bai = index_path(&path);

        let index = bam::bai::read(&bai).map_err(|e| Error::io(e, &bai))?;
        let file = File::open(&path).map_err(|e| Error::io(e, &path))?;
        let mut reader = bam::io::IndexedReader::new(file, index);
        let header = reader
            .read_header()
            .map_err(|e| Error::InputFormat(format!("{}: bad BAM header: {e}", path.display())))?;

        Ok(Self {
            path,
            reader,
            header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reference sequences declared in the header, in header order.
    pub fn references(&self) -> Vec<ContigInfo> {
        self.header
            .reference_sequences()
            .iter()
            .map(|(name, map)| ContigInfo {
                name: String::from_utf8_lossy(name).to_string(),
                length: usize::from(map.length()),
            })
            .collect()
    }

    /// All mapped footprints on `contig`, or `None` if the header does not
    /// declare it.
    pub fn fetch(&mut self, contig: &str) -> Result<Option<Vec<AlignedRead>>> {
        if self
            .header
            .reference_sequences()
            .get_index_of(&contig.as_bytes()[..])
            .is_none()
        {
            return Ok(None);
        }

        let region = Region::new(contig, ..);
        let contig_name: Arc<str> = Arc::from(contig);
        let query = self
            .reader
            .query(&self.header, &region)
            .map_err(|e| Error::io(e, &self.path))?;

        let mut reads = Vec::new();
        for result in query {
            let record = result.map_err(|e| Error::io(e, &self.path))?;
            if let Some(read) = footprint_from_record(&record, &contig_name)? {
                reads.push(read);
            }
        }
        Ok(Some(reads))
    }
}

/// Small indexed BAM files for tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use noodles::core::Position;
    use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
    use noodles::csi::binning_index::index::reference_sequence::index::LinearIndex;
    use noodles::csi::binning_index::Indexer;
    use noodles::sam::alignment::io::Write as _;
    use noodles::sam::alignment::record::cigar::Op;
    use noodles::sam::alignment::record::Flags;
    use noodles::sam::alignment::record_buf::{Cigar, Sequence};
    use noodles::sam::alignment::{Record as _, RecordBuf};
    use noodles::sam::header::record::value::{map::ReferenceSequence, Map};
    use std::num::NonZeroUsize;

    /// Mapped record at 0-based `start` on reference `reference_id`.
    pub fn record(
        reference_id: usize,
        start: usize,
        name: &str,
        reverse: bool,
        ops: &[(Kind, usize)],
    ) -> RecordBuf {
        let query_len: usize = ops
            .iter()
            .filter(|(k, _)| {
                matches!(
                    k,
                    Kind::Match
                        | Kind::SequenceMatch
                        | Kind::SequenceMismatch
                        | Kind::Insertion
                        | Kind::SoftClip
                )
            })
            .map(|(_, len)| len)
            .sum();
        let flags = if reverse {
            Flags::REVERSE_COMPLEMENTED
        } else {
            Flags::empty()
        };
        let cigar = Cigar::from(ops.iter().map(|&(k, len)| Op::new(k, len)).collect::<Vec<_>>());

        RecordBuf::builder()
            .set_name(name)
            .set_flags(flags)
            .set_reference_sequence_id(reference_id)
            .set_alignment_start(Position::try_from(start + 1).unwrap())
            .set_cigar(cigar)
            .set_sequence(Sequence::from(vec![b'A'; query_len]))
            .build()
    }

    /// Writes `records` (already coordinate-sorted) to `path` and a `.bai`
    /// index next to it.
    pub fn write_indexed_bam(path: &Path, contigs: &[(&str, usize)], records: &[RecordBuf]) {
        let mut builder = sam::Header::builder();
        for &(name, len) in contigs {
            let len = NonZeroUsize::try_from(len).unwrap();
            builder = builder.add_reference_sequence(name, Map::<ReferenceSequence>::new(len));
        }
        let header = builder.build();

        let mut writer = bam::io::Writer::new(File::create(path).unwrap());
        writer.write_header(&header).unwrap();
        for record in records {
            writer.write_alignment_record(&header, record).unwrap();
        }
        writer.try_finish().unwrap();
        drop(writer);

        let mut reader = bam::io::Reader::new(File::open(path).unwrap());
        reader.read_header().unwrap();
        let mut indexer = Indexer::<LinearIndex>::new(14, 5);
        let mut record = bam::Record::default();
        loop {
            let start_vpos = reader.get_ref().virtual_position();
            if reader.read_record(&mut record).unwrap() == 0 {
                break;
            }
            let chunk = Chunk::new(start_vpos, reader.get_ref().virtual_position());

            let reference_id = record.reference_sequence_id().and_then(|r| r.ok());
            let start = record.alignment_start().and_then(|r| r.ok());
            let end = record.alignment_end().and_then(|r| r.ok());
            match (reference_id, start) {
                (Some(id), Some(s)) => indexer
                    .add_record(Some((id, s, end.unwrap_or(s), !record.flags().is_unmapped())), chunk)
                    .unwrap(),
                _ => indexer.add_record(None, chunk).unwrap(),
            }
        }
        let index = indexer.build(header.reference_sequences().len());
        bam::bai::write(index_path(path), &index).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{record, write_indexed_bam};
    use super::*;

    #[test]
    fn gapless_match() {
        let (positions, len) = positions_from_cigar(100, [(Kind::Match, 5)]);
        assert_eq!(positions, vec![100, 101, 102, 103, 104]);
        assert_eq!(len, 5);
    }

    #[test]
    fn clips_insertions_and_deletions() {
        // 2S3M1I2M2D3M
        let ops = [
            (Kind::SoftClip, 2),
            (Kind::Match, 3),
            (Kind::Insertion, 1),
            (Kind::Match, 2),
            (Kind::Deletion, 2),
            (Kind::Match, 3),
        ];
        let (positions, len) = positions_from_cigar(10, ops);
        assert_eq!(positions, vec![10, 11, 12, 13, 14, 17, 18, 19]);
        assert_eq!(len, 9);
    }

    #[test]
    fn index_sits_next_to_alignments() {
        assert_eq!(index_path("/tmp/x/contigs.bam"), PathBuf::from("/tmp/x/contigs.bam.bai"));

        let dir = tempfile::tempdir().unwrap();
        let bam = dir.path().join("a.bam");
        assert!(!is_indexed(&bam));
        std::fs::write(index_path(&bam), b"").unwrap();
        assert!(is_indexed(&bam));
    }

    #[test]
    fn fetch_reads_footprints_per_contig() {
        let dir = tempfile::tempdir().unwrap();
        let bam_path = dir.path().join("sorted.bam");
        let records = vec![
            record(0, 10, "read1_x4", false, &[(Kind::Match, 30)]),
            record(0, 40, "read2_x1", true, &[(Kind::SoftClip, 2), (Kind::Match, 28)]),
            record(1, 5, "plain_name", false, &[(Kind::Match, 26)]),
        ];
        write_indexed_bam(&bam_path, &[("tx1", 200), ("tx2", 100)], &records);
        assert!(is_indexed(&bam_path));

        let mut bam = AlignmentFile::open(&bam_path).unwrap();
        let names: Vec<String> = bam.references().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["tx1", "tx2"]);

        let reads = bam.fetch("tx1").unwrap().unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].start, 10);
        assert_eq!(reads[0].multiplicity, 4);
        assert_eq!(reads[0].strand, Strand::Forward);
        assert_eq!(reads[0].positions.len(), 30);
        assert_eq!(reads[1].strand, Strand::Reverse);
        assert_eq!(reads[1].length, 28);
        assert_eq!(reads[1].positions.last(), Some(&67));

        let reads = bam.fetch("tx2").unwrap().unwrap();
        assert_eq!(reads[0].multiplicity, 1);

        assert!(bam.fetch("tx3").unwrap().is_none());
    }

    #[test]
    fn bad_multiplicity_suffix_is_input_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let bam_path = dir.path().join("sorted.bam");
        write_indexed_bam(
            &bam_path,
            &[("tx1", 100)],
            &[record(0, 0, "read1_xten", false, &[(Kind::Match, 30)])],
        );
        let mut bam = AlignmentFile::open(&bam_path).unwrap();
        assert!(matches!(bam.fetch("tx1"), Err(Error::InputFormat(_))));
    }
}
