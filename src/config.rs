//! Run configuration and up-front validation.
//!
//! Every check here runs before any input is read or any tool is started, so
//! a bad flag combination never leaves half-written output behind.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::profile::{SitePolicy, MIN_READ_LENGTH, WEIGHT_CENTERED_TRIM};

/// Which inputs the run starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Raw reads only; contigs are assembled from the reads themselves.
    Agnostic { reads: PathBuf },
    /// Raw reads plus a known reference; assembly is skipped.
    OrganismKnown { reads: PathBuf, reference: PathBuf },
    /// A coordinate-sorted BAM; collapsing, assembly and alignment are skipped.
    PreAligned { alignments: PathBuf },
}

impl RunMode {
    /// Resolves the mutually exclusive mode flags and the input paths each
    /// mode requires or forbids.
    pub fn from_flags(
        agnostic: bool,
        organism: bool,
        pre_aligned: bool,
        reads: Option<PathBuf>,
        reference: Option<PathBuf>,
        alignments: Option<PathBuf>,
    ) -> Result<Self> {
        let selected = [agnostic, organism, pre_aligned].iter().filter(|&&f| f).count();
        if selected != 1 {
            return Err(Error::Configuration(
                "exactly one of -A/--agnostic, -O/--organism, -B/--bam-mode must be given".into(),
            ));
        }

        if agnostic {
            if reference.is_some() || alignments.is_some() {
                return Err(Error::Configuration(
                    "-A mode takes only -q/--fastq (no --fasta or --bam)".into(),
                ));
            }
            let reads = reads.ok_or_else(|| {
                Error::Configuration("-A mode requires -q/--fastq option.".into())
            })?;
            Ok(RunMode::Agnostic { reads })
        } else if organism {
            if alignments.is_some() {
                return Err(Error::Configuration("-O mode does not take --bam".into()));
            }
            match (reads, reference) {
                (Some(reads), Some(reference)) => Ok(RunMode::OrganismKnown { reads, reference }),
                _ => Err(Error::Configuration(
                    "-O mode requires -f/--fasta, -q/--fastq options.".into(),
                )),
            }
        } else {
            if reads.is_some() || reference.is_some() {
                return Err(Error::Configuration(
                    "-B mode takes only -b/--bam (no --fastq or --fasta)".into(),
                ));
            }
            let alignments = alignments.ok_or_else(|| {
                Error::Configuration("-B mode requires -b/--bam option.".into())
            })?;
            Ok(RunMode::PreAligned { alignments })
        }
    }

    fn inputs(&self) -> Vec<&Path> {
        match self {
            RunMode::Agnostic { reads } => vec![reads],
            RunMode::OrganismKnown { reads, reference } => vec![reads, reference],
            RunMode::PreAligned { alignments } => vec![alignments],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileMode {
    #[default]
    FixedOffset,
    WeightCentered,
}

/// Largest mismatch count bowtie's `-v` mode accepts.
pub const MAX_MISMATCHES: usize = 3;

/// Executables and parameters for the external assembler, aligner and
/// samtools.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    pub inchworm: PathBuf,
    pub bowtie: PathBuf,
    pub bowtie_build: PathBuf,
    pub samtools: PathBuf,
    pub kmer_length: usize,
    pub min_contig_length: usize,
    pub mismatches: usize,
    pub seed_length: usize,
    /// Per-invocation limit; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            inchworm: PathBuf::from("inchworm"),
            bowtie: PathBuf::from("bowtie"),
            bowtie_build: PathBuf::from("bowtie-build"),
            samtools: PathBuf::from("samtools"),
            kmer_length: 25,
            min_contig_length: 100,
            mismatches: 3,
            seed_length: 25,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckerConfig {
    pub mode: RunMode,
    pub output_dir: PathBuf,
    pub profile_mode: ProfileMode,
    /// A-site offset from the 5' end used by the fixed-offset profiler.
    pub offset: usize,
    /// Shift applied before taking positions modulo 3.
    pub frame_offset: usize,
    pub min_read_length: usize,
    pub trim: usize,
    pub threads: usize,
    /// Highest-coverage transcripts passed to the spectral scorer.
    pub top_n: usize,
    /// Substring a transcript name must contain to be eligible for spectral
    /// scoring.
    pub transcript_filter: Option<String>,
    pub spectral: bool,
    pub keep_intermediates: bool,
    pub tools: ToolSettings,
}

impl CheckerConfig {
    pub fn new(mode: RunMode, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            output_dir: output_dir.into(),
            profile_mode: ProfileMode::FixedOffset,
            offset: 15,
            frame_offset: 0,
            min_read_length: MIN_READ_LENGTH,
            trim: WEIGHT_CENTERED_TRIM,
            threads: 1,
            top_n: 100,
            transcript_filter: None,
            spectral: true,
            keep_intermediates: false,
            tools: ToolSettings::default(),
        }
    }

    pub fn site_policy(&self) -> SitePolicy {
        match self.profile_mode {
            ProfileMode::FixedOffset => SitePolicy::FixedOffset { offset: self.offset },
            ProfileMode::WeightCentered => SitePolicy::WeightCentered { trim: self.trim },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.profile_mode == ProfileMode::FixedOffset && self.offset >= self.min_read_length {
            return Err(Error::Configuration(format!(
                "offset {} must be smaller than the minimum read length {}",
                self.offset, self.min_read_length
            )));
        }
        if self.profile_mode == ProfileMode::WeightCentered && 2 * self.trim >= self.min_read_length {
            return Err(Error::Configuration(format!(
                "trim {} leaves no positions in reads of {} nt",
                self.trim, self.min_read_length
            )));
        }
        if self.threads == 0 {
            return Err(Error::Configuration("threads must be at least 1".into()));
        }
        if self.top_n == 0 {
            return Err(Error::Configuration("top-N must be at least 1".into()));
        }
        if self.tools.kmer_length == 0 {
            return Err(Error::Configuration("k-mer length must be at least 1".into()));
        }
        if self.tools.mismatches > MAX_MISMATCHES {
            return Err(Error::Configuration(format!(
                "bowtie accepts at most {MAX_MISMATCHES} mismatches, got {}",
                self.tools.mismatches
            )));
        }
        if self.tools.seed_length == 0 {
            return Err(Error::Configuration("seed length must be at least 1".into()));
        }
        if self.tools.timeout == Some(Duration::ZERO) {
            return Err(Error::Configuration("timeout must be positive".into()));
        }
        for input in self.mode.inputs() {
            if !input.exists() {
                return Err(Error::Configuration(format!(
                    "input {} does not exist",
                    input.display()
                )));
            }
        }
        Ok(())
    }
}
