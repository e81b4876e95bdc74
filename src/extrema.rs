//! # High/Low Tide Detection
//!
//! Labels every sample of a series as a high tide, a low tide, or neither.
//!
//! ## Algorithm
//!
//! Peaks are found in three passes over the height sequence:
//! 1. **Candidates**: interior samples strictly higher than both neighbours.
//!    The first and last sample can never qualify, and flat tops (equal
//!    neighbours) are not peaks.
//! 2. **Prominence**: for each candidate, walk outwards on both sides until a
//!    strictly higher sample (or the series boundary) is reached and take the
//!    lowest point of each walk. The prominence is the drop from the peak to
//!    the higher of the two minima; candidates below `min_prominence` go.
//! 3. **Distance**: survivors are visited from highest to lowest and accepted
//!    only if no accepted peak lies closer than `min_distance` samples.
//!    Rejected peaks are dropped, never merged.
//!
//! Troughs are the peaks of the negated sequence. A strict maximum can never
//! be a strict minimum, so a sample gets at most one label.
//!
//! The nearest-higher scans use a monotonic stack and the range minima a
//! sparse table, so the whole detection is O(n log n).

use crate::config::ExtremaConfig;
use crate::{validate_series, AnalysisError, LabeledSample, Observation, Result, TideType};
use std::collections::BTreeSet;
use tracing::debug;

/// Minimum series length: one interior sample with a neighbour on each side
const MIN_SAMPLES: usize = 3;

/// Peak/trough labeller.
#[derive(Clone, Debug, Default)]
pub struct ExtremaDetector {
    config: ExtremaConfig,
}

impl ExtremaDetector {
    pub fn new(config: ExtremaConfig) -> Self {
        ExtremaDetector { config }
    }

    pub fn config(&self) -> &ExtremaConfig {
        &self.config
    }

    /// Label each sample as high, low or normal.
    ///
    /// # Errors
    /// - [`AnalysisError::InsufficientData`] for fewer than 3 samples
    /// - [`AnalysisError::InvalidParameter`] for a zero distance or a negative
    ///   or non-finite prominence
    /// - series validation errors for unordered timestamps or non-finite heights
    pub fn detect<O: Observation>(&self, series: &[O]) -> Result<Vec<LabeledSample>> {
        self.validate()?;
        if series.len() < MIN_SAMPLES {
            return Err(AnalysisError::InsufficientData {
                operation: "extrema detection",
                required: MIN_SAMPLES,
                available: series.len(),
            });
        }
        validate_series(series)?;

        let heights: Vec<f64> = series.iter().map(|o| o.height()).collect();
        let highs = self.find_peaks(&heights);
        let negated: Vec<f64> = heights.iter().map(|h| -h).collect();
        let lows = self.find_peaks(&negated);

        debug!(
            samples = heights.len(),
            highs = highs.len(),
            lows = lows.len(),
            "labelled tidal extrema"
        );

        let mut labels = vec![TideType::Normal; heights.len()];
        for &i in &highs {
            labels[i] = TideType::High;
        }
        for &i in &lows {
            labels[i] = TideType::Low;
        }

        Ok(series
            .iter()
            .zip(labels)
            .map(|(obs, tide_type)| LabeledSample {
                timestamp: obs.timestamp(),
                height: obs.height(),
                tide_type,
            })
            .collect())
    }

    /// Indices (ascending) of the peaks of `x` that pass the prominence and
    /// distance filters.
    pub fn find_peaks(&self, x: &[f64]) -> Vec<usize> {
        let candidates = local_maxima(x);
        if candidates.is_empty() {
            return candidates;
        }

        let left_higher = nearest_higher(x, 0..x.len());
        let right_higher = nearest_higher(x, (0..x.len()).rev());
        let minima = RangeMin::new(x);

        let prominent: Vec<usize> = candidates
            .into_iter()
            .filter(|&peak| {
                let left_start = left_higher[peak].map_or(0, |l| l + 1);
                let right_end = right_higher[peak].map_or(x.len() - 1, |r| r - 1);
                let base = minima
                    .query(left_start, peak)
                    .max(minima.query(peak, right_end));
                x[peak] - base >= self.config.min_prominence
            })
            .collect();

        select_by_distance(x, &prominent, self.config.min_distance)
    }

    fn validate(&self) -> Result<()> {
        if self.config.min_distance == 0 {
            return Err(AnalysisError::invalid("min_distance", "must be at least 1"));
        }
        let p = self.config.min_prominence;
        if !p.is_finite() || p < 0.0 {
            return Err(AnalysisError::invalid(
                "min_prominence",
                format!("must be finite and non-negative, got {p}"),
            ));
        }
        Ok(())
    }
}

/// Interior indices strictly greater than both neighbours.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    if x.len() < MIN_SAMPLES {
        return Vec::new();
    }
    (1..x.len() - 1)
        .filter(|&i| x[i] > x[i - 1] && x[i] > x[i + 1])
        .collect()
}

/// For each index, the nearest index (in visiting order) holding a strictly
/// greater value, found with a monotonic stack.
fn nearest_higher(x: &[f64], order: impl Iterator<Item = usize>) -> Vec<Option<usize>> {
    let mut result = vec![None; x.len()];
    let mut stack: Vec<usize> = Vec::new();
    for i in order {
        while let Some(&top) = stack.last() {
            if x[top] <= x[i] {
                stack.pop();
            } else {
                break;
            }
        }
        result[i] = stack.last().copied();
        stack.push(i);
    }
    result
}

/// Greedy selection by descending height; ties visit the later index first.
fn select_by_distance(x: &[f64], peaks: &[usize], min_distance: usize) -> Vec<usize> {
    if min_distance <= 1 {
        return peaks.to_vec();
    }
    let mut order = peaks.to_vec();
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]).then(a.cmp(&b)));

    let reach = min_distance - 1;
    let mut accepted = BTreeSet::new();
    for &peak in order.iter().rev() {
        let lo = peak.saturating_sub(reach);
        let hi = peak + reach;
        if accepted.range(lo..=hi).next().is_none() {
            accepted.insert(peak);
        }
    }
    accepted.into_iter().collect()
}

/// Sparse table for O(1) range-minimum queries.
struct RangeMin {
    levels: Vec<Vec<f64>>,
}

impl RangeMin {
    fn new(x: &[f64]) -> Self {
        let mut levels = vec![x.to_vec()];
        let mut width = 1;
        while width * 2 <= x.len() {
            let prev = &levels[levels.len() - 1];
            let next: Vec<f64> = (0..=x.len() - width * 2)
                .map(|i| prev[i].min(prev[i + width]))
                .collect();
            levels.push(next);
            width *= 2;
        }
        RangeMin { levels }
    }

    /// Minimum over the inclusive range `lo..=hi`.
    fn query(&self, lo: usize, hi: usize) -> f64 {
        let len = hi - lo + 1;
        let k = (usize::BITS - 1 - len.leading_zeros()) as usize;
        let level = &self.levels[k];
        level[lo].min(level[hi + 1 - (1 << k)])
    }
}
