//! Descriptive statistics for a labelled tide series: overall distribution,
//! high/low tide cycles, hourly and monthly means, and the extreme events
//! beyond the 5th and 95th percentiles.

use crate::{AnalysisError, LabeledSample, Observation, Result, TideType};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

/// Distribution of all heights.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BasicStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; needs two values
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    /// Bias-corrected skewness; needs three values
    pub skewness: Option<f64>,
    /// Bias-corrected excess kurtosis; needs four values
    pub kurtosis: Option<f64>,
}

/// High and low water statistics from the extrema labels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleStatistics {
    pub avg_high: f64,
    pub avg_low: f64,
    pub avg_range: f64,
    pub high_std: Option<f64>,
    pub low_std: Option<f64>,
    pub high_count: usize,
    pub low_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TemporalStatistics {
    /// Mean height per UTC hour of day
    pub hourly_mean: BTreeMap<u32, f64>,
    /// Mean height per calendar month
    pub monthly_mean: BTreeMap<u32, f64>,
    pub weekday_mean: Option<f64>,
    pub weekend_mean: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TidalStatistics {
    pub basic: BasicStatistics,
    /// Absent unless the series has at least one high and one low
    pub cycles: Option<CycleStatistics>,
    pub temporal: TemporalStatistics,
}

impl TidalStatistics {
    pub fn compute(series: &[LabeledSample]) -> Result<Self> {
        if series.is_empty() {
            return Err(AnalysisError::InsufficientData {
                operation: "tidal statistics",
                required: 1,
                available: 0,
            });
        }
        crate::validate_series(series)?;

        let heights: Vec<f64> = series.iter().map(|s| s.height).collect();
        let min = heights.iter().copied().fold(f64::INFINITY, f64::min);
        let max = heights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let basic = BasicStatistics {
            count: heights.len(),
            mean: mean(&heights),
            median: quantile(&heights, 0.5),
            std: sample_std(&heights),
            min,
            max,
            range: max - min,
            skewness: skewness(&heights),
            kurtosis: kurtosis(&heights),
        };

        let of_type = |kind: TideType| -> Vec<f64> {
            series.iter().filter(|s| s.tide_type == kind).map(|s| s.height).collect()
        };
        let highs = of_type(TideType::High);
        let lows = of_type(TideType::Low);
        let cycles = (!highs.is_empty() && !lows.is_empty()).then(|| {
            let (avg_high, avg_low) = (mean(&highs), mean(&lows));
            CycleStatistics {
                avg_high,
                avg_low,
                avg_range: avg_high - avg_low,
                high_std: sample_std(&highs),
                low_std: sample_std(&lows),
                high_count: highs.len(),
                low_count: lows.len(),
            }
        });

        let mut by_hour: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        let (mut weekday, mut weekend) = (Vec::new(), Vec::new());
        for s in series {
            by_hour.entry(s.timestamp.hour()).or_default().push(s.height);
            by_month.entry(s.timestamp.month()).or_default().push(s.height);
            match s.timestamp.weekday() {
                Weekday::Sat | Weekday::Sun => weekend.push(s.height),
                _ => weekday.push(s.height),
            }
        }
        let temporal = TemporalStatistics {
            hourly_mean: by_hour.into_iter().map(|(k, v)| (k, mean(&v))).collect(),
            monthly_mean: by_month.into_iter().map(|(k, v)| (k, mean(&v))).collect(),
            weekday_mean: (!weekday.is_empty()).then(|| mean(&weekday)),
            weekend_mean: (!weekend.is_empty()).then(|| mean(&weekend)),
        };

        Ok(TidalStatistics { basic, cycles, temporal })
    }
}

/// Meteorological season (northern hemisphere months).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ExtremeEvent {
    pub timestamp: DateTime<Utc>,
    pub height: f64,
}

/// Events at or beyond the 95th / 5th height percentiles.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExtremeAnalysis {
    pub high_threshold: f64,
    pub low_threshold: f64,
    pub high_count: usize,
    pub low_count: usize,
    pub high_by_season: BTreeMap<Season, usize>,
    pub low_by_season: BTreeMap<Season, usize>,
    /// First occurrence of the maximum
    pub highest: ExtremeEvent,
    /// First occurrence of the minimum
    pub lowest: ExtremeEvent,
}

impl ExtremeAnalysis {
    pub fn analyze<O: Observation>(series: &[O]) -> Result<Self> {
        if series.is_empty() {
            return Err(AnalysisError::InsufficientData {
                operation: "extreme event analysis",
                required: 1,
                available: 0,
            });
        }
        crate::validate_series(series)?;

        let heights: Vec<f64> = series.iter().map(|o| o.height()).collect();
        let high_threshold = quantile(&heights, 0.95);
        let low_threshold = quantile(&heights, 0.05);

        let mut high_by_season = BTreeMap::new();
        let mut low_by_season = BTreeMap::new();
        let (mut high_count, mut low_count) = (0, 0);
        let mut highest = 0;
        let mut lowest = 0;
        for (i, o) in series.iter().enumerate() {
            let season = Season::from_month(o.timestamp().month());
            if o.height() >= high_threshold {
                high_count += 1;
                *high_by_season.entry(season).or_insert(0) += 1;
            }
            if o.height() <= low_threshold {
                low_count += 1;
                *low_by_season.entry(season).or_insert(0) += 1;
            }
            if o.height() > heights[highest] {
                highest = i;
            }
            if o.height() < heights[lowest] {
                lowest = i;
            }
        }
        let event = |i: usize| ExtremeEvent {
            timestamp: series[i].timestamp(),
            height: heights[i],
        };

        Ok(ExtremeAnalysis {
            high_threshold,
            low_threshold,
            high_count,
            low_count,
            high_by_season,
            low_by_season,
            highest: event(highest),
            lowest: event(lowest),
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> Option<f64> {
    (values.len() >= 2).then(|| crate::features::mean_and_std(values).1)
}

/// Quantile with linear interpolation between order statistics.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Biased central moments m2, m3, m4.
fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let m = mean(values);
    let n = values.len() as f64;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - m;
        m2 += d * d;
        m3 += d * d * d;
        m4 += d * d * d * d;
    }
    (m2 / n, m3 / n, m4 / n)
}

fn skewness(values: &[f64]) -> Option<f64> {
    if values.len() < 3 {
        return None;
    }
    let n = values.len() as f64;
    let (m2, m3, _) = central_moments(values);
    if m2 == 0.0 {
        return Some(0.0);
    }
    Some((n * (n - 1.0)).sqrt() / (n - 2.0) * m3 / m2.powf(1.5))
}

fn kurtosis(values: &[f64]) -> Option<f64> {
    if values.len() < 4 {
        return None;
    }
    let n = values.len() as f64;
    let (m2, _, m4) = central_moments(values);
    if m2 == 0.0 {
        return Some(0.0);
    }
    let g2 = m4 / (m2 * m2) - 3.0;
    Some(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}
