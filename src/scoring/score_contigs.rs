// src/scoring/score_contigs.rs

use parking_lot::Mutex;
use rayon::prelude::*;

use super::{FrameScorer, SpectralScorer};
use crate::alignments::AlignmentFile;
use crate::error::{Error, Result};
use crate::profile::{ContigProfile, SiteProfiler};
use crate::types::{AlignedRead, FrameReportRow, SpectralReportRow};

/// Anything that can hand out the footprints aligned to one contig.
pub trait FootprintSource {
    /// `Ok(None)` when the source does not know `contig` at all.
    fn fetch(&mut self, contig: &str) -> Result<Option<Vec<AlignedRead>>>;
}

impl FootprintSource for AlignmentFile {
    fn fetch(&mut self, contig: &str) -> Result<Option<Vec<AlignedRead>>> {
        AlignmentFile::fetch(self, contig)
    }
}

/// Profile and frame score of one contig.
#[derive(Debug, Clone)]
pub struct ContigResult {
    pub profile: ContigProfile,
    pub frame: FrameReportRow,
}

/// Never fails: a contig whose reads cannot be fetched gets an empty profile
/// and therefore an undefined score.
fn score_contig<S: FootprintSource>(
    source: &mut S,
    contig: &str,
    profiler: &SiteProfiler,
    frame_scorer: &FrameScorer,
) -> ContigResult {
    let profile = match source.fetch(contig) {
        Ok(Some(reads)) if !reads.is_empty() => profiler.profile(contig, &reads),
        Ok(Some(_)) => {
            log::warn!("{contig}: no aligned reads, reporting an undefined score");
            ContigProfile::new(contig)
        }
        Ok(None) => {
            log::warn!(
                "No reads fetchable for contig {contig}. Perhaps the reference is not what the reads were aligned to"
            );
            ContigProfile::new(contig)
        }
        Err(e) => {
            log::warn!("{contig}: cannot read alignments ({e}), reporting an undefined score");
            ContigProfile::new(contig)
        }
    };
    let frame = frame_scorer.score(&profile);
    ContigResult { profile, frame }
}

/// Scores every contig independently on a pool of `threads` workers.
///
/// Each worker opens its own source through `open_source`. Results come back
/// sorted by contig name whatever the completion order, and every contig in
/// `contigs` yields exactly one result, even when its reads cannot be read.
pub fn score_contigs_parallel<S, F>(
    contigs: &[String],
    open_source: F,
    profiler: &SiteProfiler,
    frame_scorer: &FrameScorer,
    threads: usize,
) -> Result<Vec<ContigResult>>
where
    S: FootprintSource,
    F: Fn() -> Result<S> + Sync + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Configuration(format!("cannot start {threads} worker threads: {e}")))?;

    let results = Mutex::new(Vec::with_capacity(contigs.len()));

    // a worker opens its source on first use; failing to open one is fatal
    pool.install(|| {
        contigs.par_iter().try_for_each_init(
            || None,
            |slot: &mut Option<S>, contig| -> Result<()> {
                let mut source = match slot.take() {
                    Some(source) => source,
                    None => open_source()?,
                };
                let result = score_contig(&mut source, contig, profiler, frame_scorer);
                *slot = Some(source);
                results.lock().push(result);
                Ok(())
            },
        )
    })?;

    let mut results = results.into_inner();
    results.sort_by(|a, b| a.profile.contig.cmp(&b.profile.contig));
    log::info!("Scored {} contigs", results.len());
    Ok(results)
}

/// Spectral scores of the `top_n` highest-weight contigs whose name contains
/// `name_filter` (all contigs when `None`). Rows are sorted by contig name.
pub fn score_spectral(
    results: &[ContigResult],
    top_n: usize,
    name_filter: Option<&str>,
    scorer: &SpectralScorer,
) -> Vec<SpectralReportRow> {
    let mut eligible: Vec<(&ContigResult, f64)> = results
        .iter()
        .filter(|r| name_filter.map_or(true, |f| r.profile.contig.contains(f)))
        .map(|r| (r, r.profile.total()))
        .filter(|(_, total)| *total > 0.0)
        .collect();

    // highest coverage first, ties broken by name for a stable selection
    eligible.sort_by(|(a, ta), (b, tb)| {
        tb.total_cmp(ta)
            .then_with(|| a.profile.contig.cmp(&b.profile.contig))
    });
    eligible.truncate(top_n);

    let mut rows: Vec<SpectralReportRow> = eligible
        .par_iter()
        .map(|(result, total)| {
            let call = scorer.analyse(&result.profile.densify());
            log::debug!("{}: {:?}", result.profile.contig, call);
            SpectralReportRow {
                contig: result.profile.contig.clone(),
                total: *total,
                peak_frequency: call.frequency(),
                periodicity: call.score(),
            }
        })
        .collect();
    rows.sort_by(|a, b| a.contig.cmp(&b.contig));
    rows
}
