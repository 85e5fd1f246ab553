// src/report.rs

use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::scoring::SpectralScorer;
use crate::types::{Frame, FrameReportRow, SpectralReportRow};

/// Printed where a score is undefined.
pub const UNDEFINED: &str = "NA";

pub const FRAME_REPORT_HEADER: &str = "contig\tframe0\tframe1\tframe2\ttotal\tperiodicity";
pub const SPECTRAL_REPORT_HEADER: &str = "contig\ttotal\tpeak_frequency\tperiodicity";

fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{s:.4}"),
        None => UNDEFINED.to_string(),
    }
}

/// Frame report, one row per contig in the order given.
pub fn frame_report(rows: &[FrameReportRow]) -> String {
    let mut out = String::new();
    out.push_str("# Periodicity Checker\n");
    out.push_str("# frame = A-site position mod 3\n");
    out.push_str("# periodicity is calculated as max(frame0, frame1, frame2) / total\n");
    let _ = writeln!(out, "# {UNDEFINED}: no footprint weight on the contig");
    let _ = writeln!(out, "{FRAME_REPORT_HEADER}");

    for row in rows {
        let c = &row.counts;
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            row.contig,
            c[Frame::Zero],
            c[Frame::One],
            c[Frame::Two],
            c.total(),
            format_score(row.periodicity)
        );
    }
    out
}

/// Mean of the strictly positive spectral scores, `None` if there are none.
pub fn mean_positive_periodicity(rows: &[SpectralReportRow]) -> Option<f64> {
    let positive: Vec<f64> = rows
        .iter()
        .map(|r| r.periodicity)
        .filter(|&p| p > 0.0)
        .collect();
    if positive.is_empty() {
        None
    } else {
        Some(positive.iter().sum::<f64>() / positive.len() as f64)
    }
}

/// Spectral report for the selected top-N transcripts.
pub fn spectral_report(rows: &[SpectralReportRow], scorer: &SpectralScorer) -> String {
    let mut out = String::new();
    out.push_str("# Periodicity Checker spectral scores\n");
    let _ = writeln!(
        out,
        "# periodicity is (peak - background) / peak amplitude, peak in ({}, {}) cycles/nt",
        scorer.band.0, scorer.band.1
    );
    out.push_str("# heuristic contrast ratio, not a calibrated statistic; 0 means no codon peak\n");
    let _ = writeln!(
        out,
        "# mean_periodicity\t{}",
        format_score(mean_positive_periodicity(rows))
    );
    let _ = writeln!(out, "{SPECTRAL_REPORT_HEADER}");

    for row in rows {
        let freq = match row.peak_frequency {
            Some(f) => format!("{f:.4}"),
            None => UNDEFINED.to_string(),
        };
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{:.4}",
            row.contig, row.total, freq, row.periodicity
        );
    }
    out
}

pub fn write_report<P: AsRef<Path>>(path: P, text: &str) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, text).map_err(|e| Error::io(e, path))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
