//! # Anomaly Detection
//!
//! Two independent screens, OR-combined:
//!
//! - **Rolling z-score**: `|h - mean| / std` over a centred window of
//!   `window` samples (`window / 2` before the point, `(window - 1) / 2`
//!   after). Only points whose window fits entirely inside the series are
//!   scored. A window with zero spread cannot score its point; the point is
//!   skipped and reported in [`AnomalyReport::recovered`].
//! - **Isolation forest** over `[height, hour, day_of_year, month]`: the
//!   `floor(contamination * n)` points with the highest anomaly scores are
//!   flagged.

use crate::config::AnomalyConfig;
use crate::features::{centred_window, mean_and_std};
use crate::isolation::{top_scores, IsolationForest, IsolationParams};
use crate::{validate_series, AnalysisError, Observation, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;
use tracing::{debug, warn};

/// Per-sample screening result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnomalyPoint {
    pub timestamp: DateTime<Utc>,
    pub height: f64,
    /// `None` at the edges and in zero-variance windows
    pub z_score: Option<f64>,
    pub isolation_score: f64,
    pub z_flag: bool,
    pub isolation_flag: bool,
    pub is_anomaly: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnomalySummary {
    pub total_count: usize,
    /// `100 * total_count / n`
    pub percentage: f64,
    pub flagged_timestamps: Vec<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub summary: AnomalySummary,
    pub points: Vec<AnomalyPoint>,
    /// Degenerate windows that were skipped instead of aborting the run
    #[serde(skip)]
    pub recovered: Vec<AnalysisError>,
}

impl AnomalyReport {
    pub fn anomalies(&self) -> impl Iterator<Item = &AnomalyPoint> {
        self.points.iter().filter(|p| p.is_anomaly)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        AnomalyDetector { config }
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    fn validate(&self) -> Result<()> {
        let c = &self.config;
        if c.window < 2 {
            return Err(AnalysisError::invalid("window", "rolling window needs at least 2 samples"));
        }
        if !(c.z_threshold.is_finite() && c.z_threshold >= 0.0) {
            return Err(AnalysisError::invalid(
                "z_threshold",
                format!("must be finite and non-negative, got {}", c.z_threshold),
            ));
        }
        if !(0.0..=0.5).contains(&c.contamination) {
            return Err(AnalysisError::invalid(
                "contamination",
                format!("must lie in [0, 0.5], got {}", c.contamination),
            ));
        }
        Ok(())
    }

    /// Screen a series and summarise the flagged points.
    pub fn detect<O: Observation>(&self, series: &[O]) -> Result<AnomalyReport> {
        self.validate()?;
        if series.len() < 2 {
            return Err(AnalysisError::InsufficientData {
                operation: "anomaly detection",
                required: 2,
                available: series.len(),
            });
        }
        validate_series(series)?;

        let n = series.len();
        let heights: Vec<f64> = series.iter().map(|o| o.height()).collect();

        let (z_scores, degenerate) = centred_z_scores(&heights, self.config.window);
        let recovered: Vec<AnalysisError> = degenerate
            .into_iter()
            .map(|index| AnalysisError::DegenerateSeries {
                index,
                timestamp: series[index].timestamp(),
            })
            .collect();
        if !recovered.is_empty() {
            warn!(count = recovered.len(), "skipped zero-variance z-score windows");
        }

        let features: Vec<Vec<f64>> = series
            .iter()
            .map(|o| {
                let t = o.timestamp();
                vec![o.height(), t.hour() as f64, t.ordinal() as f64, t.month() as f64]
            })
            .collect();
        let forest = IsolationForest::fit(
            &features,
            &IsolationParams {
                n_trees: self.config.n_trees,
                sample_size: self.config.sample_size,
                seed: self.config.seed,
            },
        )?;
        let scores = forest.score_all(&features);
        let n_flag = (self.config.contamination * n as f64).floor() as usize;
        let mut isolation_flags = vec![false; n];
        for i in top_scores(&scores, n_flag) {
            isolation_flags[i] = true;
        }

        let points: Vec<AnomalyPoint> = (0..n)
            .map(|i| {
                let z_flag = z_scores[i].is_some_and(|z| z > self.config.z_threshold);
                AnomalyPoint {
                    timestamp: series[i].timestamp(),
                    height: heights[i],
                    z_score: z_scores[i],
                    isolation_score: scores[i],
                    z_flag,
                    isolation_flag: isolation_flags[i],
                    is_anomaly: z_flag || isolation_flags[i],
                }
            })
            .collect();

        let flagged_timestamps: Vec<DateTime<Utc>> =
            points.iter().filter(|p| p.is_anomaly).map(|p| p.timestamp).collect();
        let total_count = flagged_timestamps.len();
        debug!(
            z = points.iter().filter(|p| p.z_flag).count(),
            isolation = n_flag,
            total = total_count,
            "anomaly screening complete"
        );

        Ok(AnomalyReport {
            summary: AnomalySummary {
                total_count,
                percentage: 100.0 * total_count as f64 / n as f64,
                flagged_timestamps,
            },
            points,
            recovered,
        })
    }
}

/// Z-scores over centred windows, plus the indices whose window had zero spread.
fn centred_z_scores(heights: &[f64], window: usize) -> (Vec<Option<f64>>, Vec<usize>) {
    let n = heights.len();
    let mut scores = vec![None; n];
    let mut degenerate = Vec::new();
    for i in 0..n {
        let Some(range) = centred_window(i, window, n) else {
            continue;
        };
        let (mean, std) = mean_and_std(&heights[range]);
        if std > 0.0 {
            scores[i] = Some((heights[i] - mean).abs() / std);
        } else {
            degenerate.push(i);
        }
    }
    (scores, degenerate)
}
