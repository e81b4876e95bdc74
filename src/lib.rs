//! # Tide Analytics Core Library
//!
//! This library turns an ordered series of water-level observations into tidal
//! insight: where the highs and lows are, which astronomical constituents make
//! up the signal, what the next hours are likely to look like, and which
//! readings look wrong.
//!
//! ## Design Philosophy
//!
//! ### Batch, In-Memory, Deterministic
//! - **Borrowed input**: every component works on a `&[impl Observation]` snapshot
//!   and never mutates it
//! - **No IO**: acquisition, persistence and rendering belong to the caller
//! - **Seeded randomness**: the forest regressor and the isolation forest take an
//!   explicit seed, so identical input always produces identical output
//!
//! ### Time Handling
//! Harmonic fitting and forecasting use elapsed real time (hours since the first
//! sample), so irregular spacing is tolerated there. Lag and rolling features
//! are keyed by sample index: the ML path assumes roughly uniform sampling and
//! does not resample.
//!
//! ### Data Flow
//! 1. **Label**: [`extrema::ExtremaDetector`] marks highs and lows
//! 2. **Featurise**: [`features::FeatureEngineer`] derives lag, rolling and calendar columns
//! 3. **Decompose**: [`spectrum::SpectrumAnalyzer`] ranks the strongest periods
//! 4. **Forecast**: [`harmonic::HarmonicDecomposer`] → [`harmonic::HarmonicForecaster`],
//!    and independently [`ml_forecast::MlForecaster`]
//! 5. **Screen**: [`anomaly::AnomalyDetector`] fuses z-score and isolation scores
//!
//! [`analysis::TideAnalyzer`] runs the whole chain with one [`config::Config`].
//!
//! ## Core Types
//! - [`Sample`]: one timestamped height
//! - [`LabeledSample`]: a sample with its [`TideType`]
//! - [`ForecastPoint`]: one predicted height tagged with its [`ForecastMethod`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod analysis;
pub mod anomaly;
pub mod config;
pub mod error;
pub mod extrema;
pub mod features;
pub mod forest;
pub mod harmonic;
pub mod isolation;
pub mod lunar;
pub mod ml_forecast;
pub mod spectrum;
pub mod stats;
pub mod synthetic;

#[cfg(test)]
mod tests;

pub use error::{AnalysisError, Result};

/// A single water-level observation.
///
/// Heights are in one consistent unit (meters by convention); the core never
/// converts units.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use tide_analytics_lib::Sample;
///
/// let sample = Sample::new(Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap(), 1.82);
/// assert_eq!(sample.height, 1.82);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Observation instant (UTC)
    pub timestamp: DateTime<Utc>,
    /// Water height
    pub height: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, height: f64) -> Self {
        Sample { timestamp, height }
    }
}

/// Tide classification of a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TideType {
    High,
    Low,
    Normal,
}

/// A sample labelled by the extrema detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub timestamp: DateTime<Utc>,
    pub height: f64,
    pub tide_type: TideType,
}

impl LabeledSample {
    /// Drop the label.
    pub fn sample(&self) -> Sample {
        Sample::new(self.timestamp, self.height)
    }
}

/// Anything with a timestamp and a height.
///
/// Implemented for both [`Sample`] and [`LabeledSample`] so every component
/// accepts raw and labelled series alike.
pub trait Observation {
    fn timestamp(&self) -> DateTime<Utc>;
    fn height(&self) -> f64;
}

impl Observation for Sample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn height(&self) -> f64 {
        self.height
    }
}

impl Observation for LabeledSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn height(&self) -> f64 {
        self.height
    }
}

/// Which forecaster produced a point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMethod {
    Harmonic,
    Ml,
}

/// One predicted height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub predicted_height: f64,
    pub method: ForecastMethod,
}

/// Check the series invariants shared by every component.
///
/// Timestamps must be strictly increasing and heights finite. The first
/// violation is reported with its row index; nothing is reordered.
pub fn validate_series<O: Observation>(series: &[O]) -> Result<()> {
    for (index, obs) in series.iter().enumerate() {
        if !obs.height().is_finite() {
            return Err(AnalysisError::NonFiniteHeight {
                index,
                timestamp: obs.timestamp(),
            });
        }
        if index > 0 && obs.timestamp() <= series[index - 1].timestamp() {
            return Err(AnalysisError::UnorderedTimestamps {
                index,
                timestamp: obs.timestamp(),
            });
        }
    }
    Ok(())
}

/// Elapsed hours from `origin` to `t` (negative if `t` precedes `origin`).
pub fn hours_since(origin: DateTime<Utc>, t: DateTime<Utc>) -> f64 {
    (t - origin).num_milliseconds() as f64 / 3_600_000.0
}

/// Step length in minutes as a chrono duration, rounded to the millisecond.
pub(crate) fn step_duration(step_minutes: f64) -> Result<chrono::Duration> {
    if !(step_minutes.is_finite() && step_minutes > 0.0) {
        return Err(AnalysisError::invalid(
            "step_minutes",
            format!("must be positive and finite, got {step_minutes}"),
        ));
    }
    let millis = (step_minutes * 60_000.0).round();
    if millis < 1.0 {
        return Err(AnalysisError::invalid(
            "step_minutes",
            "rounds to a zero-length step",
        ));
    }
    // Float to int casts saturate, so out-of-range steps land on i64::MAX
    chrono::Duration::try_milliseconds(millis as i64).ok_or_else(|| {
        AnalysisError::invalid(
            "step_minutes",
            format!("{step_minutes} minutes is beyond the representable range"),
        )
    })
}

/// `base + k·step`, or an [`AnalysisError::InvalidParameter`] naming `parameter`
/// when the product or the sum leaves chrono's calendar range.
pub(crate) fn grid_point(
    base: DateTime<Utc>,
    step: chrono::Duration,
    k: usize,
    parameter: &'static str,
) -> Result<DateTime<Utc>> {
    i32::try_from(k)
        .ok()
        .and_then(|k| step.checked_mul(k))
        .and_then(|offset| base.checked_add_signed(offset))
        .ok_or_else(|| {
            AnalysisError::invalid(
                parameter,
                format!("{k} steps of {step} from {base} overflow the calendar"),
            )
        })
}
