// src/lib.rs
pub mod types;
pub mod error;
pub mod config;
pub mod fastq;
pub mod reference;
pub mod collapse;
pub mod alignments;
pub mod profile;
pub mod scoring;
pub mod tools;
pub mod report;

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::alignments::{is_indexed, AlignmentFile};
use crate::collapse::{collapse_fastq, CollapseSummary};
use crate::config::{CheckerConfig, RunMode};
use crate::error::{Error, Result};
use crate::profile::{write_listing, ContigProfile, SiteProfiler};
use crate::reference::{read_contigs, write_chrom_sizes, ContigInfo};
use crate::report::{frame_report, mean_positive_periodicity, spectral_report, write_report};
use crate::scoring::{score_contigs_parallel, score_spectral, FrameScorer, SpectralScorer};
use crate::types::{FrameReportRow, SpectralReportRow};

pub const FRAME_REPORT_FILE: &str = "periodicity.tsv";
pub const SPECTRAL_REPORT_FILE: &str = "spectral.tsv";
pub const PROFILE_LISTING_FILE: &str = "profile.bed";
pub const CHROM_SIZES_FILE: &str = "chrom.sizes";

/// Directory holding collapsed reads, contigs, indexes and alignments.
///
/// A temporary directory inside the output directory is removed on drop,
/// whether the run succeeded or not. With `keep_intermediates` the files go
/// to `<output>/intermediates` and stay.
pub enum Workspace {
    Temporary(TempDir),
    Kept(PathBuf),
}

impl Workspace {
    /// Creates the output directory if needed, then the work directory.
    pub fn create(config: &CheckerConfig) -> Result<Self> {
        let out = &config.output_dir;
        fs::create_dir_all(out).map_err(|e| Error::io(e, out))?;

        if config.keep_intermediates {
            let dir = out.join("intermediates");
            fs::create_dir_all(&dir).map_err(|e| Error::io(e, &dir))?;
            Ok(Workspace::Kept(dir))
        } else {
            let dir = tempfile::Builder::new()
                .prefix("riboperiod-work-")
                .tempdir_in(out)
                .map_err(|e| Error::io(e, out))?;
            Ok(Workspace::Temporary(dir))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Workspace::Temporary(dir) => dir.path(),
            Workspace::Kept(dir) => dir,
        }
    }
}

/// A sorted, indexed BAM plus the contigs to score, sorted by name.
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub alignments: PathBuf,
    pub contigs: Vec<ContigInfo>,
    pub collapse_summary: Option<CollapseSummary>,
}

/// Collapse, assemble, align, sort and index as the run mode requires.
pub fn prepare_alignments(config: &CheckerConfig, workspace: &Workspace) -> Result<PreparedInput> {
    let work = workspace.path();
    let tools = &config.tools;

    let (reads, reference) = match &config.mode {
        RunMode::PreAligned { alignments } => {
            if !is_indexed(alignments) {
                log::info!("No index for {}, running samtools index", alignments.display());
                crate::tools::index_alignments(tools, alignments)?;
            }
            let mut contigs = AlignmentFile::open(alignments)?.references();
            contigs.sort_by(|a, b| a.name.cmp(&b.name));
            return Ok(PreparedInput {
                alignments: alignments.clone(),
                contigs,
                collapse_summary: None,
            });
        }
        RunMode::Agnostic { reads } => (reads, None),
        RunMode::OrganismKnown { reads, reference } => (reads, Some(reference.clone())),
    };

    let collapsed = work.join("collapsed.fa");
    let summary = collapse_fastq(reads, &collapsed)?;

    let reference = match reference {
        Some(reference) => reference,
        None => {
            log::info!("Assembling contigs with {}", tools.inchworm.display());
            crate::tools::build_contigs(tools, &collapsed, work, config.threads)?
        }
    };

    let mut contigs = read_contigs(&reference)?;
    if contigs.is_empty() {
        log::warn!("{} holds no sequences", reference.display());
    }
    contigs.sort_by(|a, b| a.name.cmp(&b.name));

    log::info!("Aligning reads to {} contigs", contigs.len());
    let index_prefix = crate::tools::build_aligner_index(tools, &reference, work)?;
    let sam = crate::tools::align_reads(tools, &index_prefix, &collapsed, work, config.threads)?;

    let sorted = work.join("aligned.sorted.bam");
    crate::tools::sort_alignments(tools, &sam, &sorted, config.threads)?;
    crate::tools::index_alignments(tools, &sorted)?;

    Ok(PreparedInput {
        alignments: sorted,
        contigs,
        collapse_summary: Some(summary),
    })
}

/// Everything a run produced. Text outputs are rendered on demand.
#[derive(Debug, Clone)]
pub struct PeriodicityResults {
    pub contigs: Vec<ContigInfo>,
    /// One per contig, sorted by contig name.
    pub profiles: Vec<ContigProfile>,
    /// One per contig, same order as `profiles`.
    pub frame_rows: Vec<FrameReportRow>,
    /// Present when spectral scoring ran.
    pub spectral_rows: Option<Vec<SpectralReportRow>>,
    pub collapse_summary: Option<CollapseSummary>,
    pub spectral_scorer: SpectralScorer,
}

impl PeriodicityResults {
    pub fn get_frame_report(&self) -> String {
        frame_report(&self.frame_rows)
    }

    /// Position-weight listing: `contig  start  end  weight`.
    pub fn get_profile_listing(&self) -> String {
        let mut buf = Vec::new();
        // writing into a Vec cannot fail
        let _ = write_listing(&self.profiles, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn get_spectral_report(&self) -> Option<String> {
        self.spectral_rows
            .as_ref()
            .map(|rows| spectral_report(rows, &self.spectral_scorer))
    }

    /// Mean of the strictly positive spectral scores.
    pub fn mean_spectral_score(&self) -> Option<f64> {
        self.spectral_rows
            .as_deref()
            .and_then(mean_positive_periodicity)
    }

    /// Writes the frame report, position listing, chrom.sizes and (if scored)
    /// the spectral report into `dir`.
    pub fn write_reports<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        write_report(dir.join(FRAME_REPORT_FILE), &self.get_frame_report())?;
        write_report(dir.join(PROFILE_LISTING_FILE), &self.get_profile_listing())?;
        write_chrom_sizes(&self.contigs, dir.join(CHROM_SIZES_FILE))?;
        if let Some(text) = self.get_spectral_report() {
            write_report(dir.join(SPECTRAL_REPORT_FILE), &text)?;
        }
        Ok(())
    }
}

/// Profiles and scores every contig of a prepared BAM.
pub fn score_alignments(config: &CheckerConfig, input: &PreparedInput) -> Result<PeriodicityResults> {
    let profiler = SiteProfiler::new(config.site_policy(), config.min_read_length)?;
    log::info!("Profiling with {:?}", profiler.policy());
    let frame_scorer = FrameScorer::new(config.frame_offset);
    let names: Vec<String> = input.contigs.iter().map(|c| c.name.clone()).collect();

    let results = score_contigs_parallel(
        &names,
        || AlignmentFile::open(&input.alignments),
        &profiler,
        &frame_scorer,
        config.threads,
    )?;

    let spectral_scorer = SpectralScorer::default();
    let spectral_rows = if config.spectral {
        let rows = score_spectral(
            &results,
            config.top_n,
            config.transcript_filter.as_deref(),
            &spectral_scorer,
        );
        log::info!("Spectral scores for {} transcripts", rows.len());
        Some(rows)
    } else {
        None
    };

    let skipped: u64 = results.iter().map(|r| r.profile.reads_skipped).sum();
    if skipped > 0 {
        log::info!("{skipped} reads had too few aligned positions to place a site");
    }

    let (profiles, frame_rows): (Vec<_>, Vec<_>) = results.into_iter().map(|r| (r.profile, r.frame)).unzip();
    Ok(PeriodicityResults {
        contigs: input.contigs.clone(),
        profiles,
        frame_rows,
        spectral_rows,
        collapse_summary: input.collapse_summary,
        spectral_scorer,
    })
}

/// Runs the whole pipeline for `config` and writes the reports into
/// `config.output_dir`.
pub fn check_periodicity(config: &CheckerConfig) -> Result<PeriodicityResults> {
    config.validate()?;
    let workspace = Workspace::create(config)?;
    let input = prepare_alignments(config, &workspace)?;
    let results = score_alignments(config, &input)?;
    results.write_reports(&config.output_dir)?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignments::testing::{record, write_indexed_bam};
    use noodles::sam::alignment::record::cigar::op::Kind;
    use std::path::PathBuf;

    /// tx_a: 10 in-frame footprints; tx_b: 3 footprints spread over all
    /// frames; tx_c: declared but empty.
    fn pre_aligned_bam(dir: &Path) -> PathBuf {
        let bam = dir.join("input.bam");
        let mut records = Vec::new();
        for i in 0..10 {
            let name = format!("read{}_x3", i + 1);
            records.push(record(0, 3 * i, &name, false, &[(Kind::Match, 30)]));
        }
        for (i, start) in [0, 1, 2].into_iter().enumerate() {
            let name = format!("read{}_x1", 20 + i);
            records.push(record(1, start, &name, false, &[(Kind::Match, 28)]));
        }
        write_indexed_bam(&bam, &[("tx_a", 500), ("tx_b", 300), ("tx_c", 100)], &records);
        bam
    }

    #[test]
    fn pre_aligned_run_writes_all_reports() {
        let dir = tempfile::tempdir().unwrap();
        let bam = pre_aligned_bam(dir.path());
        let out = dir.path().join("out");
        let config = CheckerConfig::new(RunMode::PreAligned { alignments: bam }, &out);

        let results = check_periodicity(&config).unwrap();

        let names: Vec<&str> = results.frame_rows.iter().map(|r| r.contig.as_str()).collect();
        assert_eq!(names, vec!["tx_a", "tx_b", "tx_c"]);
        assert_eq!(results.frame_rows[0].periodicity, Some(1.0));
        assert_eq!(results.frame_rows[0].counts.total(), 30.0);
        let tx_b = results.frame_rows[1].periodicity.unwrap();
        assert!((tx_b - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(results.frame_rows[2].periodicity, None);

        let report = fs::read_to_string(out.join(FRAME_REPORT_FILE)).unwrap();
        assert!(report.contains("tx_c\t0\t0\t0\t0\tNA\n"));

        let listing = fs::read_to_string(out.join(PROFILE_LISTING_FILE)).unwrap();
        assert_eq!(listing.lines().next(), Some("tx_a\t15\t16\t3"));
        assert_eq!(listing.lines().count(), 13);

        let sizes = fs::read_to_string(out.join(CHROM_SIZES_FILE)).unwrap();
        assert_eq!(sizes, "tx_a\t500\ntx_b\t300\ntx_c\t100\n");

        let spectral = fs::read_to_string(out.join(SPECTRAL_REPORT_FILE)).unwrap();
        assert!(spectral.contains("# mean_periodicity\t"));
        assert_eq!(results.spectral_rows.as_ref().map(Vec::len), Some(2));

        // the temporary work directory is gone
        let leftovers: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("riboperiod-work-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn malformed_contig_does_not_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let bam = dir.path().join("input.bam");
        let records = vec![
            record(0, 0, "read1_xbad", false, &[(Kind::Match, 30)]),
            record(1, 3, "read2_x5", false, &[(Kind::Match, 30)]),
        ];
        write_indexed_bam(&bam, &[("tx_bad", 200), ("tx_good", 200)], &records);
        let out = dir.path().join("out");
        let config = CheckerConfig::new(RunMode::PreAligned { alignments: bam }, &out);

        let results = check_periodicity(&config).unwrap();

        assert_eq!(results.frame_rows.len(), 2);
        assert_eq!(results.frame_rows[0].contig, "tx_bad");
        assert_eq!(results.frame_rows[0].periodicity, None);
        assert_eq!(results.frame_rows[1].contig, "tx_good");
        assert_eq!(results.frame_rows[1].periodicity, Some(1.0));
        assert_eq!(results.frame_rows[1].counts.total(), 5.0);

        let report = fs::read_to_string(out.join(FRAME_REPORT_FILE)).unwrap();
        assert!(report.contains("tx_bad\t0\t0\t0\t0\tNA\n"));
        assert!(report.contains("tx_good\t5\t0\t0\t5\t1.0000\n"));
    }

    #[test]
    fn spectral_scoring_can_be_disabled_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let bam = pre_aligned_bam(dir.path());

        let mut config = CheckerConfig::new(RunMode::PreAligned { alignments: bam }, dir.path().join("out"));
        config.spectral = false;
        let results = check_periodicity(&config).unwrap();
        assert!(results.spectral_rows.is_none());
        assert!(!config.output_dir.join(SPECTRAL_REPORT_FILE).exists());

        config.spectral = true;
        config.transcript_filter = Some("_b".into());
        config.threads = 2;
        let results = check_periodicity(&config).unwrap();
        let rows = results.spectral_rows.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].contig, "tx_b");
    }

    #[test]
    fn weight_centered_mode_keeps_totals() {
        let dir = tempfile::tempdir().unwrap();
        let bam = pre_aligned_bam(dir.path());
        let mut config = CheckerConfig::new(RunMode::PreAligned { alignments: bam }, dir.path().join("out"));
        config.profile_mode = config::ProfileMode::WeightCentered;

        let results = check_periodicity(&config).unwrap();
        let total_a = results.frame_rows[0].counts.total();
        assert!((total_a - 30.0).abs() < 1e-9);
        assert_eq!(results.profiles[0].reads_used, 10);
    }

    #[test]
    fn failed_tool_leaves_no_work_directory() {
        let dir = tempfile::tempdir().unwrap();
        let reads = dir.path().join("reads.fq");
        fs::write(&reads, "@r1\nACGTACGTACGTACGTACGTACGTACGT\n+\nIIIIIIIIIIIIIIIIIIIIIIIIIIII\n").unwrap();
        let out = dir.path().join("out");

        let mut config = CheckerConfig::new(RunMode::Agnostic { reads }, &out);
        config.tools.inchworm = PathBuf::from("/nonexistent/inchworm");

        assert!(check_periodicity(&config).is_err());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn invalid_offset_fails_before_any_output() {
        let dir = tempfile::tempdir().unwrap();
        let bam = pre_aligned_bam(dir.path());
        let out = dir.path().join("out");
        let mut config = CheckerConfig::new(RunMode::PreAligned { alignments: bam }, &out);
        config.offset = 40;

        assert!(matches!(check_periodicity(&config), Err(Error::Configuration(_))));
        assert!(!out.exists());
    }
}
