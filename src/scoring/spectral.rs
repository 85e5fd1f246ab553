// src/scoring/spectral.rs

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Outcome of spectral analysis for one dense count series.
///
/// Only `Periodic` carries a non-zero score. The score is a peak-to-background
/// contrast ratio, not a calibrated statistic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpectralCall {
    /// No positive frequency above the near-DC cutoff.
    TooShort,
    /// Constant input, or every candidate bin has the same amplitude.
    Flat,
    /// Strongest bin lies outside the codon band.
    OffBand { frequency: f64 },
    /// Peak in band but no background bins inside the spectrum.
    NoBackground { frequency: f64 },
    Periodic {
        frequency: f64,
        peak: f64,
        background: f64,
        score: f64,
    },
}

impl SpectralCall {
    pub fn score(&self) -> f64 {
        match *self {
            SpectralCall::Periodic { score, .. } => score,
            _ => 0.0,
        }
    }

    pub fn frequency(&self) -> Option<f64> {
        match *self {
            SpectralCall::OffBand { frequency }
            | SpectralCall::NoBackground { frequency }
            | SpectralCall::Periodic { frequency, .. } => Some(frequency),
            SpectralCall::TooShort | SpectralCall::Flat => None,
        }
    }
}

/// Detects a period-3 signal in the discrete Fourier spectrum of per-position
/// counts (sample spacing 1).
#[derive(Debug, Clone, Copy)]
pub struct SpectralScorer {
    /// Bins at or below this frequency (cycles/sample) are ignored.
    pub min_frequency: f64,
    /// Open interval the peak frequency must fall in.
    pub band: (f64, f64),
    /// Bins closer than this to the peak are treated as leakage.
    pub leakage_bins: usize,
    /// Farthest bin from the peak used as background.
    pub window_bins: usize,
}

impl Default for SpectralScorer {
    fn default() -> Self {
        Self {
            min_frequency: 0.05,
            band: (0.32, 0.34),
            leakage_bins: 3,
            window_bins: 10,
        }
    }
}

impl SpectralScorer {
    pub fn analyse(&self, counts: &[f64]) -> SpectralCall {
        let n = counts.len();
        if counts.windows(2).all(|w| w[0] == w[1]) {
            return SpectralCall::Flat;
        }

        // positive-frequency bins are 1..=half
        let half = (n - 1) / 2;
        let freq = |k: usize| k as f64 / n as f64;
        let first = match (1..=half).find(|&k| freq(k) > self.min_frequency) {
            Some(k) => k,
            None => return SpectralCall::TooShort,
        };

        let amplitudes = amplitude_spectrum(counts, half);
        let candidates = &amplitudes[first..=half];

        let (mut peak_bin, mut peak) = (first, f64::MIN);
        let mut lowest = f64::MAX;
        for (i, &amp) in candidates.iter().enumerate() {
            if amp > peak {
                peak = amp;
                peak_bin = first + i;
            }
            lowest = lowest.min(amp);
        }
        if peak - lowest <= peak.abs() * 1e-12 {
            return SpectralCall::Flat;
        }

        let frequency = freq(peak_bin);
        if !(frequency > self.band.0 && frequency < self.band.1) {
            return SpectralCall::OffBand { frequency };
        }

        let mut background = Vec::with_capacity(2 * self.window_bins);
        for d in self.leakage_bins..=self.window_bins {
            if let Some(k) = peak_bin.checked_sub(d).filter(|&k| k >= 1) {
                background.push(amplitudes[k]);
            }
            if peak_bin + d <= half {
                background.push(amplitudes[peak_bin + d]);
            }
        }
        if background.is_empty() {
            return SpectralCall::NoBackground { frequency };
        }
        let background = background.iter().sum::<f64>() / background.len() as f64;
        let score = ((peak - background) / peak).clamp(0.0, 1.0);

        SpectralCall::Periodic {
            frequency,
            peak,
            background,
            score,
        }
    }

    pub fn score(&self, counts: &[f64]) -> f64 {
        self.analyse(counts).score()
    }
}

/// Magnitudes of DFT bins `0..=half`.
fn amplitude_spectrum(counts: &[f64], half: usize) -> Vec<f64> {
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(counts.len());
    let mut buffer: Vec<Complex<f64>> = counts.iter().map(|&c| Complex::new(c, 0.0)).collect();
    fft.process(&mut buffer);
    buffer[..=half].iter().map(|c| c.norm()).collect()
}
