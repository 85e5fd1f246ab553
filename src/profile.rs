use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::types::{AlignedRead, Strand};

/// Reads shorter than this (query alignment length) never contribute.
pub const MIN_READ_LENGTH: usize = 25;

/// Positions dropped from each end of a read by the weight-centered policy.
pub const WEIGHT_CENTERED_TRIM: usize = 12;

/// How a footprint is turned into A-site weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitePolicy {
    /// Full multiplicity to the position `offset` nt from the 5' end
    /// (leftmost base on the forward strand, rightmost on the reverse).
    FixedOffset { offset: usize },
    /// Multiplicity spread evenly over the aligned positions left after
    /// dropping `trim` positions from both ends.
    WeightCentered { trim: usize },
}

/// Sparse per-position weight of one contig, ordered by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContigProfile {
    pub contig: String,
    pub sites: BTreeMap<usize, f64>,
    /// Reads that added weight.
    pub reads_used: u64,
    /// Reads long enough to pass the filter but with too few aligned
    /// positions to place a site.
    pub reads_skipped: u64,
}

impl ContigProfile {
    pub fn new(contig: impl Into<String>) -> Self {
        Self {
            contig: contig.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.sites.values().sum()
    }

    fn add(&mut self, position: usize, weight: f64) {
        *self.sites.entry(position).or_insert(0.0) += weight;
    }

    /// Dense counts for positions `0..=max_position`, gaps filled with zero.
    pub fn densify(&self) -> Vec<f64> {
        let len = match self.sites.keys().next_back() {
            Some(&max) => max + 1,
            None => return Vec::new(),
        };
        let mut dense = vec![0.0; len];
        for (&pos, &weight) in &self.sites {
            dense[pos] = weight;
        }
        dense
    }
}

/// Converts aligned footprints into a per-position occupancy profile.
#[derive(Debug, Clone, Copy)]
pub struct SiteProfiler {
    policy: SitePolicy,
    min_read_length: usize,
}

impl SiteProfiler {
    /// Fails when the policy cannot place a site inside a read of
    /// `min_read_length`, so no read passing the filter is out of range.
    pub fn new(policy: SitePolicy, min_read_length: usize) -> Result<Self> {
        match policy {
            SitePolicy::FixedOffset { offset } if offset >= min_read_length => {
                return Err(Error::Configuration(format!(
                    "offset {offset} does not fit inside reads of the minimum length {min_read_length}"
                )))
            }
            SitePolicy::WeightCentered { trim } if 2 * trim >= min_read_length => {
                return Err(Error::Configuration(format!(
                    "trimming {trim} positions from each end leaves nothing of a {min_read_length} nt read"
                )))
            }
            _ => {}
        }
        Ok(Self {
            policy,
            min_read_length,
        })
    }

    pub fn policy(&self) -> SitePolicy {
        self.policy
    }

    /// Builds the profile of `contig` from its footprints.
    pub fn profile<'a, I>(&self, contig: &str, reads: I) -> ContigProfile
    where
        I: IntoIterator<Item = &'a AlignedRead>,
    {
        let mut profile = ContigProfile::new(contig);

        for read in reads {
            if read.length < self.min_read_length {
                continue;
            }
            let placed = match self.policy {
                SitePolicy::FixedOffset { offset } => place_fixed(&mut profile, read, offset),
                SitePolicy::WeightCentered { trim } => place_centered(&mut profile, read, trim),
            };
            if placed {
                profile.reads_used += 1;
            } else {
                profile.reads_skipped += 1;
                log::debug!(
                    "{}: read at {} has {} aligned positions, cannot place a site",
                    contig,
                    read.start,
                    read.positions.len()
                );
            }
        }
        profile
    }
}

fn place_fixed(profile: &mut ContigProfile, read: &AlignedRead, offset: usize) -> bool {
    let n = read.positions.len();
    let idx = match read.strand {
        Strand::Forward => Some(offset),
        Strand::Reverse => n.checked_sub(offset + 1),
    };
    match idx.and_then(|i| read.positions.get(i)) {
        Some(&site) => {
            profile.add(site, read.multiplicity as f64);
            true
        }
        None => false,
    }
}

fn place_centered(profile: &mut ContigProfile, read: &AlignedRead, trim: usize) -> bool {
    let n = read.positions.len();
    if n <= 2 * trim {
        return false;
    }
    let window = &read.positions[trim..n - trim];
    let share = read.multiplicity as f64 / window.len() as f64;
    for &site in window {
        profile.add(site, share);
    }
    true
}

/// Writes the position-weight listing:
/// ```text
/// contig  start  end  weight
/// ```
/// with `end = start + 1`, ordered by contig then position.
pub fn write_listing<W: Write>(profiles: &[ContigProfile], out: &mut W) -> io::Result<()> {
    let mut ordered: Vec<&ContigProfile> = profiles.iter().collect();
    ordered.sort_by(|a, b| a.contig.cmp(&b.contig));

    for profile in ordered {
        for (&pos, &weight) in &profile.sites {
            writeln!(out, "{}\t{}\t{}\t{}", profile.contig, pos, pos + 1, weight)?;
        }
    }
    Ok(())
}
