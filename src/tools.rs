//src/tools.rs

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::ToolSettings;
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs an external program to completion.
///
/// Stderr is captured for the error message. When `stdout_path` is given,
/// stdout is written there, otherwise it is discarded. A child still running
/// after `timeout` is killed and reported as `Error::Timeout`.
pub fn run_tool<I, S>(
    program: &Path,
    args: I,
    stdout_path: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = program.display().to_string();
    let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    log::debug!("Running {} {:?}", tool, args);

    let mut cmd = Command::new(program);
    cmd.args(&args).stdin(Stdio::null()).stderr(Stdio::piped());
    match stdout_path {
        Some(path) => {
            let out = File::create(path).map_err(|e| Error::io(e, path))?;
            cmd.stdout(Stdio::from(out));
        }
        None => {
            cmd.stdout(Stdio::null());
        }
    }

    let mut child = cmd.spawn().map_err(|e| Error::io(e, program))?;

    // Drain stderr on its own thread so a chatty child cannot block on a full pipe.
    let pipe = child.stderr.take();
    let stderr_reader = thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut text);
        }
        text
    });

    // On timeout the reader is left detached: grandchildren may still hold the pipe.
    let status = match wait_with_timeout(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            return Err(Error::Timeout {
                tool,
                after: timeout.unwrap_or_default(),
            })
        }
        Err(e) => return Err(Error::io(e, program)),
    };
    let stderr = stderr_reader.join().unwrap_or_default();

    if !status.success() {
        return Err(Error::ExternalTool {
            tool,
            status,
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(())
}

/// `Ok(None)` means the child was killed after running past `timeout`.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    let limit = match timeout {
        Some(limit) => limit,
        None => return child.wait().map(Some),
    };

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= limit {
            // the child may exit between try_wait and kill
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Assembles contigs from collapsed reads with inchworm. Returns the path of
/// the contig FASTA inside `work_dir`.
pub fn build_contigs(
    settings: &ToolSettings,
    reads_fasta: &Path,
    work_dir: &Path,
    threads: usize,
) -> Result<PathBuf> {
    let contigs = work_dir.join("contigs.fa");
    let args: Vec<OsString> = vec![
        "--reads".into(),
        reads_fasta.into(),
        "--run_inchworm".into(),
        "-K".into(),
        settings.kmer_length.to_string().into(),
        "-L".into(),
        settings.min_contig_length.to_string().into(),
        "--num_threads".into(),
        threads.to_string().into(),
    ];
    run_tool(&settings.inchworm, args, Some(&contigs), settings.timeout)?;
    Ok(contigs)
}

/// Builds the bowtie index for `contigs`; returns the index prefix.
pub fn build_aligner_index(settings: &ToolSettings, contigs: &Path, work_dir: &Path) -> Result<PathBuf> {
    let prefix = work_dir.join("contig_index");
    run_tool(
        &settings.bowtie_build,
        [contigs.as_os_str(), prefix.as_os_str()],
        None,
        settings.timeout,
    )?;
    Ok(prefix)
}

/// Aligns collapsed reads (FASTA) to the index, reporting all alignments on
/// the forward strand only. Returns the SAM path.
pub fn align_reads(
    settings: &ToolSettings,
    index_prefix: &Path,
    reads_fasta: &Path,
    work_dir: &Path,
    threads: usize,
) -> Result<PathBuf> {
    let sam = work_dir.join("contigs.sam");
    let args: Vec<OsString> = vec![
        "-a".into(),
        "--norc".into(),
        "-p".into(),
        threads.to_string().into(),
        "-v".into(),
        settings.mismatches.to_string().into(),
        "--seedlen".into(),
        settings.seed_length.to_string().into(),
        index_prefix.into(),
        "-f".into(),
        reads_fasta.into(),
        "-S".into(),
        sam.clone().into(),
    ];
    run_tool(&settings.bowtie, args, None, settings.timeout)?;
    Ok(sam)
}

/// Coordinate-sorts `alignments` into `sorted_bam`.
pub fn sort_alignments(
    settings: &ToolSettings,
    alignments: &Path,
    sorted_bam: &Path,
    threads: usize,
) -> Result<()> {
    let args: Vec<OsString> = vec![
        "sort".into(),
        "-@".into(),
        threads.to_string().into(),
        alignments.into(),
        "-o".into(),
        sorted_bam.into(),
    ];
    run_tool(&settings.samtools, args, None, settings.timeout)
}

/// Writes the `.bai` index next to a sorted BAM.
pub fn index_alignments(settings: &ToolSettings, sorted_bam: &Path) -> Result<()> {
    run_tool(
        &settings.samtools,
        [OsStr::new("index"), sorted_bam.as_os_str()],
        None,
        settings.timeout,
    )
}
