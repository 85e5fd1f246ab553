//src/types.rs

use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// One unique read sequence and the number of raw reads that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedRead {
    pub sequence: String,
    pub multiplicity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

/// A footprint as reported by the aligner.
///
/// `positions` holds the reference coordinates (0-based) of the aligned
/// bases in ascending order; `length` is the query alignment length, i.e.
/// aligned plus inserted bases, soft clips excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRead {
    pub contig: Arc<str>,
    pub start: usize,
    pub length: usize,
    pub strand: Strand,
    pub multiplicity: u32,
    pub positions: Vec<usize>,
}

impl AlignedRead {
    /// A gapless alignment covering `start..start + length`.
    pub fn contiguous(
        contig: Arc<str>,
        start: usize,
        length: usize,
        strand: Strand,
        multiplicity: u32,
    ) -> Self {
        Self {
            contig,
            start,
            length,
            strand,
            multiplicity,
            positions: (start..start + length).collect(),
        }
    }
}

/// Codon register of a position. Always exactly one of three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Frame {
    Zero,
    One,
    Two,
}

impl Frame {
    pub const ALL: [Frame; 3] = [Frame::Zero, Frame::One, Frame::Two];

    /// Frame of `position` after shifting it by `offset` nucleotides.
    pub fn of(position: usize, offset: usize) -> Self {
        match (position + offset) % 3 {
            0 => Frame::Zero,
            1 => Frame::One,
            _ => Frame::Two,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Frame::Zero => 0,
            Frame::One => 1,
            Frame::Two => 2,
        }
    }
}

/// Weight accumulated in each of the three frames of one contig.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameCounts([f64; 3]);

impl FrameCounts {
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn max(&self) -> f64 {
        self.0.iter().copied().fold(0.0, f64::max)
    }
}

impl Index<Frame> for FrameCounts {
    type Output = f64;

    fn index(&self, frame: Frame) -> &f64 {
        &self.0[frame.index()]
    }
}

impl IndexMut<Frame> for FrameCounts {
    fn index_mut(&mut self, frame: Frame) -> &mut f64 {
        &mut self.0[frame.index()]
    }
}

/// One row of the frame periodicity report.
/// `periodicity` is `None` when the contig carried no weight.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReportRow {
    pub contig: String,
    pub counts: FrameCounts,
    pub periodicity: Option<f64>,
}

/// One row of the spectral report (top-N transcripts only).
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralReportRow {
    pub contig: String,
    pub total: f64,
    pub peak_frequency: Option<f64>,
    pub periodicity: f64,
}
