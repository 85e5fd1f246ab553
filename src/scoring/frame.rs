// src/scoring/frame.rs

use crate::error::{Error, Result};
use crate::profile::ContigProfile;
use crate::types::{Frame, FrameCounts, FrameReportRow};

/// Modular-frame bias of a contig profile.
///
/// `offset` shifts every position before taking it modulo 3 and therefore
/// decides which positions count as frame 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameScorer {
    offset: usize,
}

impl FrameScorer {
    pub fn new(offset: usize) -> Self {
        Self { offset }
    }

    pub fn count(&self, profile: &ContigProfile) -> FrameCounts {
        let mut counts = FrameCounts::default();
        for (&pos, &weight) in &profile.sites {
            counts[Frame::of(pos, self.offset)] += weight;
        }
        counts
    }

    /// Weight of the dominant frame over the total weight.
    pub fn periodicity(counts: &FrameCounts) -> Result<f64> {
        let total = counts.total();
        if total <= 0.0 {
            return Err(Error::DegenerateSignal("no weight in any frame".into()));
        }
        Ok(counts.max() / total)
    }

    /// Report row for one contig. A contig without weight gets an undefined
    /// periodicity instead of an error.
    pub fn score(&self, profile: &ContigProfile) -> FrameReportRow {
        let counts = self.count(profile);
        let periodicity = match Self::periodicity(&counts) {
            Ok(score) => Some(score),
            Err(e) => {
                log::warn!("{}: {}", profile.contig, e);
                None
            }
        };
        FrameReportRow {
            contig: profile.contig.clone(),
            counts,
            periodicity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(sites: &[(usize, f64)]) -> ContigProfile {
        let mut p = ContigProfile::new("tx1");
        p.sites.extend(sites.iter().copied());
        p
    }

    #[test]
    fn frames_sum_to_total() {
        let p = profile(&[(0, 4.0), (1, 1.0), (3, 2.0), (5, 0.5), (7, 1.5)]);
        let row = FrameScorer::new(0).score(&p);

        assert_eq!(row.counts[Frame::Zero], 6.0);
        assert_eq!(row.counts[Frame::One], 2.5);
        assert_eq!(row.counts[Frame::Two], 0.5);
        assert_eq!(row.counts.total(), p.total());
        assert_eq!(row.periodicity, Some(6.0 / 9.0));
    }

    #[test]
    fn offset_rotates_frames() {
        let p = profile(&[(0, 4.0), (1, 1.0)]);
        let counts = FrameScorer::new(1).count(&p);
        assert_eq!(counts[Frame::One], 4.0);
        assert_eq!(counts[Frame::Two], 1.0);
        assert_eq!(counts[Frame::Zero], 0.0);
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let p = profile(&[(0, 1.0), (1, 1.0), (2, 1.0)]);
        let score = FrameScorer::new(0).score(&p).periodicity.unwrap();
        assert!((score - 1.0 / 3.0).abs() < 1e-12);

        let p = profile(&[(9, 3.0)]);
        assert_eq!(FrameScorer::new(0).score(&p).periodicity, Some(1.0));
    }

    #[test]
    fn empty_profile_is_undefined_not_a_fault() {
        let row = FrameScorer::new(0).score(&ContigProfile::new("tx1"));
        assert_eq!(row.periodicity, None);
        assert_eq!(row.counts.total(), 0.0);
        assert!(matches!(
            FrameScorer::periodicity(&row.counts),
            Err(Error::DegenerateSignal(_))
        ));
    }
}
