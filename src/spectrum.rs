//! # Dominant Periods
//!
//! Amplitude spectrum of the linearly detrended heights, computed with an FFT.
//! The strongest positive frequencies are reported with their period and, when
//! one lies within a frequency bin, the matching [`ConstituentKind`].
//!
//! The sample spacing is the mean spacing of the series, so the frequencies
//! are only meaningful on a roughly uniform series (the same precondition the
//! feature engineer has).

use crate::config::SpectrumConfig;
use crate::harmonic::ConstituentKind;
use crate::{hours_since, validate_series, AnalysisError, Observation, Result};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fewest samples with at least two positive frequency bins
const MIN_SAMPLES: usize = 4;

/// One of the strongest spectral lines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeak {
    /// Cycles per hour
    pub frequency: f64,
    pub period_hours: f64,
    /// Sinusoid amplitude in height units
    pub amplitude: f64,
    /// Constituent whose frequency is within one bin of this line
    pub constituent: Option<ConstituentKind>,
}

/// One-sided amplitude spectrum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Mean sample spacing in hours
    pub sample_hours: f64,
    /// Bin width in cycles per hour
    pub resolution: f64,
    /// Bin frequencies from 0 to Nyquist, cycles per hour
    pub frequencies: Vec<f64>,
    pub amplitudes: Vec<f64>,
    /// Strongest non-zero frequencies, strongest first
    pub dominant: Vec<SpectralPeak>,
}

impl Spectrum {
    /// Dominant line closest to `kind`, if one was matched to it.
    pub fn peak_for(&self, kind: ConstituentKind) -> Option<&SpectralPeak> {
        self.dominant.iter().find(|p| p.constituent == Some(kind))
    }
}

#[derive(Clone, Debug, Default)]
pub struct SpectrumAnalyzer {
    config: SpectrumConfig,
}

impl SpectrumAnalyzer {
    pub fn new(config: SpectrumConfig) -> Self {
        SpectrumAnalyzer { config }
    }

    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    pub fn analyze<O: Observation>(&self, series: &[O]) -> Result<Spectrum> {
        if self.config.top_n == 0 {
            return Err(AnalysisError::invalid("top_n", "must be at least 1"));
        }
        let n = series.len();
        if n < MIN_SAMPLES {
            return Err(AnalysisError::InsufficientData {
                operation: "power spectrum",
                required: MIN_SAMPLES,
                available: n,
            });
        }
        validate_series(series)?;

        let span = hours_since(series[0].timestamp(), series[n - 1].timestamp());
        let sample_hours = span / (n - 1) as f64;
        let resolution = 1.0 / (n as f64 * sample_hours);

        let heights: Vec<f64> = series.iter().map(|o| o.height()).collect();
        let mut buffer: Vec<Complex<f64>> = detrend(&heights)
            .into_iter()
            .map(|h| Complex::new(h, 0.0))
            .collect();
        FftPlanner::<f64>::new()
            .plan_fft_forward(n)
            .process(&mut buffer);

        let n_bins = n / 2 + 1;
        let frequencies: Vec<f64> = (0..n_bins).map(|k| k as f64 * resolution).collect();
        let amplitudes: Vec<f64> = (0..n_bins)
            .map(|k| {
                let magnitude = buffer[k].norm() / n as f64;
                // Energy of the mirrored negative frequency, except at DC and Nyquist
                if k == 0 || 2 * k == n {
                    magnitude
                } else {
                    2.0 * magnitude
                }
            })
            .collect();

        let mut order: Vec<usize> = (1..n_bins).collect();
        order.sort_by(|&a, &b| amplitudes[b].total_cmp(&amplitudes[a]).then(a.cmp(&b)));
        let dominant: Vec<SpectralPeak> = order
            .into_iter()
            .take(self.config.top_n)
            .map(|k| SpectralPeak {
                frequency: frequencies[k],
                period_hours: 1.0 / frequencies[k],
                amplitude: amplitudes[k],
                constituent: nearest_constituent(frequencies[k], resolution),
            })
            .collect();

        if let Some(top) = dominant.first() {
            debug!(
                period_hours = top.period_hours,
                amplitude = top.amplitude,
                "strongest spectral line"
            );
        }

        Ok(Spectrum {
            sample_hours,
            resolution,
            frequencies,
            amplitudes,
            dominant,
        })
    }
}

/// Remove the least-squares line through `(index, value)`.
fn detrend(values: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    values
        .iter()
        .enumerate()
        .map(|(i, &y)| y - y_mean - slope * (i as f64 - x_mean))
        .collect()
}

fn nearest_constituent(frequency: f64, resolution: f64) -> Option<ConstituentKind> {
    ConstituentKind::ALL
        .iter()
        .map(|&kind| (kind, (1.0 / kind.period_hours() - frequency).abs()))
        .filter(|&(_, distance)| distance <= resolution)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(kind, _)| kind)
}
