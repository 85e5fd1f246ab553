use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use riboperiod::config::{CheckerConfig, ProfileMode, RunMode};
use riboperiod::error::{Error, Result};
use riboperiod::{prepare_alignments, score_alignments, PeriodicityResults, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SiteMode {
    /// Full weight at a fixed offset from the 5' end
    FixedOffset,
    /// Weight spread over the trimmed read center
    WeightCentered,
}

/// Checks ribosome-profiling reads for 3-nt periodicity.
#[derive(Debug, Parser)]
#[command(name = "riboperiod", version)]
struct Cli {
    /// Reference-agnostic mode: assemble contigs from the reads (needs -q)
    #[arg(short = 'A', long)]
    agnostic: bool,

    /// Organism-known mode: align reads to a reference (needs -q, -f)
    #[arg(short = 'O', long)]
    organism: bool,

    /// Pre-aligned mode: score a sorted BAM (needs -b)
    #[arg(short = 'B', long = "bam-mode")]
    bam_mode: bool,

    /// Raw reads, FASTQ or gzipped FASTQ
    #[arg(short = 'q', long)]
    fastq: Option<PathBuf>,

    /// Reference transcript FASTA
    #[arg(short = 'f', long)]
    fasta: Option<PathBuf>,

    /// Coordinate-sorted BAM
    #[arg(short = 'b', long)]
    bam: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long, default_value = "periodicity_out")]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = SiteMode::FixedOffset)]
    mode: SiteMode,

    /// A-site offset from the 5' end
    #[arg(long, default_value_t = 15)]
    offset: usize,

    /// Shift applied to positions before taking them modulo 3
    #[arg(long, default_value_t = 0)]
    frame_offset: usize,

    #[arg(short = 'p', long, default_value_t = 1)]
    threads: usize,

    /// Highest-coverage transcripts passed to spectral scoring
    #[arg(long, default_value_t = 100)]
    top_n: usize,

    /// Only transcripts whose name contains this are spectrally scored
    #[arg(long)]
    transcript_filter: Option<String>,

    #[arg(long)]
    no_spectral: bool,

    /// Keep collapsed reads, contigs and alignments under <output>/intermediates
    #[arg(long)]
    keep_intermediates: bool,

    #[arg(long, default_value = "inchworm")]
    inchworm: PathBuf,

    #[arg(long, default_value = "bowtie")]
    bowtie: PathBuf,

    #[arg(long, default_value = "bowtie-build")]
    bowtie_build: PathBuf,

    #[arg(long, default_value = "samtools")]
    samtools: PathBuf,

    #[arg(long, default_value_t = 25)]
    kmer_length: usize,

    #[arg(long, default_value_t = 100)]
    min_contig_length: usize,

    /// Mismatches bowtie allows per alignment (0-3)
    #[arg(long, default_value_t = 3)]
    mismatches: usize,

    #[arg(long, default_value_t = 25)]
    seed_length: usize,

    /// Seconds before an external tool is killed
    #[arg(long)]
    timeout: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<CheckerConfig> {
        let mode = RunMode::from_flags(
            self.agnostic,
            self.organism,
            self.bam_mode,
            self.fastq,
            self.fasta,
            self.bam,
        )?;

        let mut config = CheckerConfig::new(mode, self.output);
        config.profile_mode = match self.mode {
            SiteMode::FixedOffset => ProfileMode::FixedOffset,
            SiteMode::WeightCentered => ProfileMode::WeightCentered,
        };
        config.offset = self.offset;
        config.frame_offset = self.frame_offset;
        config.threads = self.threads;
        config.top_n = self.top_n;
        config.transcript_filter = self.transcript_filter;
        config.spectral = !self.no_spectral;
        config.keep_intermediates = self.keep_intermediates;
        config.tools.inchworm = self.inchworm;
        config.tools.bowtie = self.bowtie;
        config.tools.bowtie_build = self.bowtie_build;
        config.tools.samtools = self.samtools;
        config.tools.kmer_length = self.kmer_length;
        config.tools.min_contig_length = self.min_contig_length;
        config.tools.mismatches = self.mismatches;
        config.tools.seed_length = self.seed_length;
        config.tools.timeout = self.timeout.map(Duration::from_secs);

        config.validate()?;
        Ok(config)
    }
}

fn spinner(color: &str, message: &'static str) -> ProgressBar {
    let template = format!("{{spinner:.{color}}} {{msg}}");
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(style);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn run(config: &CheckerConfig) -> Result<PeriodicityResults> {
    // 1. Collapse, assemble, align as the mode requires
    let workspace = Workspace::create(config)?;
    let pb = spinner("blue", "Preparing alignments...");
    let input = prepare_alignments(config, &workspace)?;
    pb.finish_with_message(format!("{} contigs to score.", input.contigs.len()));

    // 2. Profile and score every contig
    let pb = spinner("green", "Scoring contigs...");
    let results = score_alignments(config, &input)?;
    pb.finish_with_message("Scoring finished.");

    // 3. Reports
    let pb = spinner("yellow", "Writing reports...");
    results.write_reports(&config.output_dir)?;
    pb.finish_with_message(format!("Reports written to {}.", config.output_dir.display()));

    Ok(results)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(Error::Configuration(msg)) => Cli::command().error(ErrorKind::ArgumentConflict, msg).exit(),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(results) => {
            let scored = results.frame_rows.iter().filter(|r| r.periodicity.is_some()).count();
            log::info!("{} of {} contigs carried footprints", scored, results.frame_rows.len());
            if let Some(mean) = results.mean_spectral_score() {
                log::info!("Mean spectral periodicity: {mean:.4}");
            }
            ExitCode::SUCCESS
        }
        Err(Error::Configuration(msg)) => Cli::command().error(ErrorKind::InvalidValue, msg).exit(),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
