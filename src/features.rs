//! # Feature Engineering
//!
//! Derives the regression inputs used by the ML forecaster:
//!
//! | Column | Definition |
//! |---|---|
//! | `height_lag_L` | height `L` samples earlier |
//! | `height_mean_W`, `height_std_W` | mean / sample std of a `W`-sample window |
//! | `hour_sin`, `hour_cos` | fractional hour of day on a 24 h circle |
//! | `day_sin`, `day_cos` | day of year on a 365.25 day circle |
//! | `hour`, `day_of_year`, `month` | raw calendar values (`calendar = true`) |
//! | `moon_phase`, `moon_illumination`, `spring_tide` | lunar context (`lunar = true`) |
//! | `lunar_distance_factor` | day of year on a 27.32 day sine (`lunar = true`) |
//! | `solar_distance_factor` | day of year on a 365.25 day sine (`lunar = true`) |
//!
//! With `tidal = true` the table also carries descriptive columns. They look
//! at the current sample, the future, or the whole series, so they are never
//! part of a predictive row:
//!
//! | Column | Definition |
//! |---|---|
//! | `height_change_rate` | change from the previous sample per elapsed hour |
//! | `height_ma_W` | centred `W`-sample moving average |
//! | `tidal_range` | mean detected high minus mean detected low (max − min without two of each) |
//! | `tide_category` | [`TideCategory`] band index, 0 (very low) to 4 (very high) |
//!
//! Lags and windows count samples, not elapsed time, so the features only
//! mean what their names say on a roughly uniform series. The core does not
//! resample; that is the caller's precondition.
//!
//! Two views are offered:
//! - [`FeatureEngineer::build`] gives one row per sample with rolling windows
//!   ending at (and including) that sample. Rows inside the warm-up period
//!   carry `None` for the features they cannot have yet.
//! - [`FeatureEngineer::predictive_row`] gives the vector used to predict the
//!   height at a timestamp from strictly earlier heights only. Training and
//!   autoregressive forecasting both go through it, so the target never leaks
//!   into its own features.

use crate::config::{ExtremaConfig, FeatureConfig};
use crate::extrema::ExtremaDetector;
use crate::lunar::LunarState;
use crate::{validate_series, AnalysisError, Observation, Result, TideType};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::ops::RangeInclusive;

/// Days per year used for the seasonal circle
const DAYS_PER_YEAR: f64 = 365.25;
/// Sidereal month in days
const LUNAR_MONTH_DAYS: f64 = 27.32;

/// Five equal-width height bands over the observed range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TideCategory {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl TideCategory {
    pub const ALL: [TideCategory; 5] = [
        TideCategory::VeryLow,
        TideCategory::Low,
        TideCategory::Medium,
        TideCategory::High,
        TideCategory::VeryHigh,
    ];

    /// Band index, 0 for [`TideCategory::VeryLow`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Band every height against the `[min, max]` of `heights`.
    ///
    /// Bands are right-closed, except that the minimum falls in the lowest
    /// one. A constant series is padded by 0.1% on both sides and lands in
    /// [`TideCategory::Medium`].
    pub fn classify(heights: &[f64]) -> Vec<TideCategory> {
        let lo = heights.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = heights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = if hi > lo {
            (lo, hi)
        } else {
            let pad = if lo == 0.0 { 0.001 } else { 0.001 * lo.abs() };
            (lo - pad, hi + pad)
        };
        let width = (hi - lo) / Self::ALL.len() as f64;
        heights
            .iter()
            .map(|&h| {
                let band = ((h - lo) / width).ceil() as i64 - 1;
                Self::ALL[band.clamp(0, Self::ALL.len() as i64 - 1) as usize]
            })
            .collect()
    }
}

/// Per-row feature values aligned with the input series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    /// Column names in row order
    pub names: Vec<String>,
    pub timestamps: Vec<DateTime<Utc>>,
    pub heights: Vec<f64>,
    /// `None` marks a feature that is undefined during warm-up
    pub rows: Vec<Vec<Option<f64>>>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column.
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let index = self.names.iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    pub fn is_complete(&self, row: usize) -> bool {
        self.rows[row].iter().all(Option::is_some)
    }

    /// Index of the first row with every feature defined.
    pub fn warm_up(&self) -> Option<usize> {
        (0..self.rows.len()).find(|&i| self.is_complete(i))
    }

    /// Rows with every feature defined, with their row index.
    pub fn complete_rows(&self) -> impl Iterator<Item = (usize, Vec<f64>)> + '_ {
        self.rows.iter().enumerate().filter_map(|(i, row)| {
            row.iter()
                .copied()
                .collect::<Option<Vec<f64>>>()
                .map(|values| (i, values))
        })
    }
}

/// Builds lag, rolling-window and calendar features.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureEngineer {
    config: FeatureConfig,
    /// Peak selection behind the `tidal_range` column
    extrema: ExtremaConfig,
}

impl FeatureEngineer {
    pub fn new(config: FeatureConfig) -> Self {
        FeatureEngineer {
            config,
            extrema: ExtremaConfig::default(),
        }
    }

    /// Use `extrema` when detecting the highs and lows behind `tidal_range`.
    pub fn with_extrema(mut self, extrema: ExtremaConfig) -> Self {
        self.extrema = extrema;
        self
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Reject lags of zero, windows shorter than two samples, and an empty feature set.
    pub fn validate(&self) -> Result<()> {
        if self.config.lags.contains(&0) {
            return Err(AnalysisError::invalid("lags", "lag offsets must be at least 1"));
        }
        if let Some(w) = self.config.windows.iter().find(|&&w| w < 2) {
            return Err(AnalysisError::invalid(
                "windows",
                format!("rolling windows need at least 2 samples, got {w}"),
            ));
        }
        if let Some(w) = self.config.smoothing_windows.iter().find(|&&w| w < 2) {
            return Err(AnalysisError::invalid(
                "smoothing_windows",
                format!("moving averages need at least 2 samples, got {w}"),
            ));
        }
        Ok(())
    }

    /// Names of the predictive columns, in the order [`Self::predictive_row`]
    /// fills them.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .config
            .lags
            .iter()
            .map(|l| format!("height_lag_{l}"))
            .collect();
        for w in &self.config.windows {
            names.push(format!("height_mean_{w}"));
            names.push(format!("height_std_{w}"));
        }
        names.extend(["hour_sin", "hour_cos", "day_sin", "day_cos"].map(String::from));
        if self.config.calendar {
            names.extend(["hour", "day_of_year", "month"].map(String::from));
        }
        if self.config.lunar {
            names.extend(
                [
                    "moon_phase",
                    "moon_illumination",
                    "spring_tide",
                    "lunar_distance_factor",
                    "solar_distance_factor",
                ]
                .map(String::from),
            );
        }
        names
    }

    /// Column names of a [`FeatureTable`]: the predictive columns followed by
    /// the descriptive ones.
    pub fn table_names(&self) -> Vec<String> {
        let mut names = self.feature_names();
        if self.config.tidal {
            names.push("height_change_rate".into());
            for w in &self.config.smoothing_windows {
                names.push(format!("height_ma_{w}"));
            }
            names.extend(["tidal_range", "tide_category"].map(String::from));
        }
        names
    }

    pub fn largest_lag(&self) -> usize {
        self.config.lags.iter().copied().max().unwrap_or(0)
    }

    /// Samples of history a predictive row needs.
    pub fn lookback(&self) -> usize {
        let window = self.config.windows.iter().copied().max().unwrap_or(0);
        self.largest_lag().max(window)
    }

    /// Feature table aligned with `series`.
    pub fn build<O: Observation>(&self, series: &[O]) -> Result<FeatureTable> {
        self.validate()?;
        validate_series(series)?;

        let heights: Vec<f64> = series.iter().map(|o| o.height()).collect();
        let timestamps: Vec<DateTime<Utc>> = series.iter().map(|o| o.timestamp()).collect();

        let descriptive = if self.config.tidal {
            Some(self.descriptive_columns(series, &heights, &timestamps)?)
        } else {
            None
        };

        let rows = (0..heights.len())
            .map(|i| {
                let mut row: Vec<Option<f64>> = self
                    .config
                    .lags
                    .iter()
                    .map(|&lag| i.checked_sub(lag).map(|j| heights[j]))
                    .collect();
                for &w in &self.config.windows {
                    match (i + 1).checked_sub(w) {
                        Some(start) => {
                            let (mean, std) = mean_and_std(&heights[start..=i]);
                            row.push(Some(mean));
                            row.push(Some(std));
                        }
                        None => row.extend([None, None]),
                    }
                }
                let mut calendar = Vec::new();
                self.push_time_features(timestamps[i], &mut calendar);
                row.extend(calendar.into_iter().map(Some));
                if let Some(columns) = &descriptive {
                    row.extend(columns.iter().map(|column| column[i]));
                }
                row
            })
            .collect();

        Ok(FeatureTable {
            names: self.table_names(),
            timestamps,
            heights,
            rows,
        })
    }

    /// The `tidal = true` columns, column-major.
    fn descriptive_columns<O: Observation>(
        &self,
        series: &[O],
        heights: &[f64],
        timestamps: &[DateTime<Utc>],
    ) -> Result<Vec<Vec<Option<f64>>>> {
        let n = heights.len();
        let mut columns = Vec::with_capacity(self.config.smoothing_windows.len() + 3);

        columns.push(
            (0..n)
                .map(|i| {
                    let j = i.checked_sub(1)?;
                    let elapsed = timestamps[i] - timestamps[j];
                    let hours = (elapsed.num_seconds() as f64
                        + f64::from(elapsed.subsec_nanos()) * 1e-9)
                        / 3600.0;
                    Some((heights[i] - heights[j]) / hours)
                })
                .collect(),
        );

        for &w in &self.config.smoothing_windows {
            columns.push(
                (0..n)
                    .map(|i| centred_window(i, w, n).map(|range| mean_and_std(&heights[range]).0))
                    .collect(),
            );
        }

        let range = self.tidal_range(series, heights)?;
        columns.push(vec![Some(range); n]);

        columns.push(
            TideCategory::classify(heights)
                .into_iter()
                .map(|c| Some(c.index() as f64))
                .collect(),
        );
        Ok(columns)
    }

    /// Mean high minus mean low, or the height span when fewer than two of
    /// either are detected.
    fn tidal_range<O: Observation>(&self, series: &[O], heights: &[f64]) -> Result<f64> {
        let labels = match ExtremaDetector::new(self.extrema.clone()).detect(series) {
            Ok(labels) => labels,
            Err(e) if e.is_insufficient_data() => Vec::new(),
            Err(e) => return Err(e),
        };
        let mean_of = |kind: TideType| {
            let values: Vec<f64> = labels
                .iter()
                .filter(|l| l.tide_type == kind)
                .map(|l| l.height)
                .collect();
            (values.len() > 1).then(|| values.iter().sum::<f64>() / values.len() as f64)
        };
        Ok(match (mean_of(TideType::High), mean_of(TideType::Low)) {
            (Some(high), Some(low)) => high - low,
            _ => {
                let hi = heights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let lo = heights.iter().copied().fold(f64::INFINITY, f64::min);
                hi - lo
            }
        })
    }

    /// Features for predicting the height at `timestamp` from `history`, the
    /// heights strictly before it (oldest first).
    ///
    /// Returns `None` while `history` is shorter than [`Self::lookback`].
    pub fn predictive_row(&self, history: &[f64], timestamp: DateTime<Utc>) -> Option<Vec<f64>> {
        let n = history.len();
        if n < self.lookback() {
            return None;
        }
        let mut row = Vec::with_capacity(self.feature_names().len());
        for &lag in &self.config.lags {
            row.push(history[n - lag]);
        }
        for &w in &self.config.windows {
            let (mean, std) = mean_and_std(&history[n - w..]);
            row.push(mean);
            row.push(std);
        }
        self.push_time_features(timestamp, &mut row);
        Some(row)
    }

    fn push_time_features(&self, timestamp: DateTime<Utc>, out: &mut Vec<f64>) {
        let hour = timestamp.hour() as f64
            + timestamp.minute() as f64 / 60.0
            + timestamp.second() as f64 / 3600.0;
        let day = timestamp.ordinal() as f64;

        out.push((TAU * hour / 24.0).sin());
        out.push((TAU * hour / 24.0).cos());
        out.push((TAU * day / DAYS_PER_YEAR).sin());
        out.push((TAU * day / DAYS_PER_YEAR).cos());
        if self.config.calendar {
            out.push(timestamp.hour() as f64);
            out.push(day);
            out.push(timestamp.month() as f64);
        }
        if self.config.lunar {
            let moon = LunarState::at(timestamp);
            out.push(moon.phase_fraction);
            out.push(moon.illumination);
            out.push(if moon.is_spring_tide() { 1.0 } else { 0.0 });
            out.push((TAU * day / LUNAR_MONTH_DAYS).sin());
            out.push((TAU * day / DAYS_PER_YEAR).sin());
        }
    }
}

/// Centred window of `window` samples around `i`, `[i − window/2, i + (window−1)/2]`,
/// or `None` when it does not fit inside `0..n`.
pub(crate) fn centred_window(i: usize, window: usize, n: usize) -> Option<RangeInclusive<usize>> {
    let start = i.checked_sub(window / 2)?;
    let end = i + window.checked_sub(1)? / 2;
    (end < n).then_some(start..=end)
}

/// Mean and sample standard deviation (n − 1 denominator), two-pass.
pub(crate) fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sample;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, TimeZone};

    fn series(heights: &[f64]) -> Vec<Sample> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        heights
            .iter()
            .enumerate()
            .map(|(i, &h)| Sample::new(start + Duration::hours(i as i64), h))
            .collect()
    }

    fn small() -> FeatureEngineer {
        FeatureEngineer::new(FeatureConfig {
            lags: vec![1, 2],
            windows: vec![3],
            calendar: false,
            lunar: false,
            ..FeatureConfig::default()
        })
    }

    #[test]
    fn default_feature_names() {
        let names = FeatureEngineer::default().feature_names();
        assert_eq!(names.len(), 19);
        assert_eq!(names[0], "height_lag_1");
        assert_eq!(names[5], "height_lag_24");
        assert_eq!(names[6], "height_mean_6");
        assert_eq!(names[7], "height_std_6");
        assert_eq!(&names[12..16], &["hour_sin", "hour_cos", "day_sin", "day_cos"]);
        assert_eq!(&names[16..], &["hour", "day_of_year", "month"]);
    }

    #[test]
    fn lags_and_rolling_values() {
        let table = small().build(&series(&[1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();
        assert_eq!(table.len(), 5);

        let lag1 = table.column("height_lag_1").unwrap();
        assert_eq!(lag1, vec![None, Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
        let lag2 = table.column("height_lag_2").unwrap();
        assert_eq!(lag2[..2], [None, None]);
        assert_eq!(lag2[4], Some(3.0));

        let mean = table.column("height_mean_3").unwrap();
        assert_eq!(mean[..2], [None, None]);
        assert_eq!(mean[2], Some(2.0));
        assert_eq!(mean[4], Some(4.0));
        let std = table.column("height_std_3").unwrap();
        assert_abs_diff_eq!(std[3].unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn warm_up_rows_are_excluded_from_complete_rows() {
        let heights: Vec<f64> = (0..40).map(|i| (i as f64 * 0.5).sin()).collect();
        let table = FeatureEngineer::default().build(&series(&heights)).unwrap();
        assert_eq!(table.warm_up(), Some(24));
        let complete: Vec<usize> = table.complete_rows().map(|(i, _)| i).collect();
        assert_eq!(complete, (24..40).collect::<Vec<_>>());
        assert!(!table.is_complete(23));
    }

    #[test]
    fn cyclical_features() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
        let table = FeatureEngineer::default()
            .build(&[Sample::new(ts, 1.0)])
            .unwrap();
        let row = &table.rows[0];
        let at = |name: &str| row[table.names.iter().position(|n| n == name).unwrap()].unwrap();
        assert_abs_diff_eq!(at("hour_sin"), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(at("hour_cos"), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(at("day_sin"), (TAU / DAYS_PER_YEAR).sin(), epsilon = 1e-12);
        assert_eq!(at("hour"), 6.0);
        assert_eq!(at("day_of_year"), 1.0);
        assert_eq!(at("month"), 1.0);

        let half_past = Utc.with_ymd_and_hms(2024, 1, 1, 6, 30, 0).unwrap();
        let row = small().predictive_row(&[0.0, 0.0, 0.0], half_past).unwrap();
        assert_abs_diff_eq!(row[4], (TAU * 6.5 / 24.0).sin(), epsilon = 1e-12);
    }

    #[test]
    fn predictive_row_uses_only_earlier_heights() {
        let heights = [1.0, 2.0, 4.0, 8.0, 16.0, 32.0];
        let input = series(&heights);
        let engineer = small();
        let table = engineer.build(&input).unwrap();

        for i in engineer.lookback()..heights.len() {
            let row = engineer.predictive_row(&heights[..i], input[i].timestamp).unwrap();
            // Lags match the aligned table
            assert_eq!(Some(row[0]), table.rows[i][0]);
            assert_eq!(Some(row[1]), table.rows[i][1]);
            // Rolling stats are the previous row's window
            assert_eq!(Some(row[2]), table.rows[i - 1][2]);
            assert_eq!(Some(row[3]), table.rows[i - 1][3]);
        }
        assert!(engineer.predictive_row(&heights[..2], input[2].timestamp).is_none());
    }

    #[test]
    fn lunar_columns_when_enabled() {
        let engineer = FeatureEngineer::new(FeatureConfig {
            lunar: true,
            ..FeatureConfig::default()
        });
        let names = engineer.feature_names();
        assert_eq!(names.len(), 24);
        assert_eq!(names[21], "spring_tide");
        assert_eq!(names.last().unwrap(), "solar_distance_factor");

        // Full moon 2024-01-25
        let ts = Utc.with_ymd_and_hms(2024, 1, 25, 18, 0, 0).unwrap();
        let table = engineer.build(&[Sample::new(ts, 1.0)]).unwrap();
        assert_eq!(table.rows[0][21], Some(1.0));
        assert_abs_diff_eq!(
            table.rows[0][22].unwrap(),
            (TAU * 25.0 / LUNAR_MONTH_DAYS).sin(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            table.rows[0][23].unwrap(),
            (TAU * 25.0 / DAYS_PER_YEAR).sin(),
            epsilon = 1e-12
        );
    }

    fn tidal() -> FeatureEngineer {
        FeatureEngineer::new(FeatureConfig {
            tidal: true,
            smoothing_windows: vec![3, 4],
            ..small().config().clone()
        })
    }

    #[test]
    fn tidal_columns_follow_the_predictive_ones() {
        let engineer = tidal();
        assert_eq!(engineer.feature_names(), small().feature_names());
        let names = engineer.table_names();
        assert_eq!(
            &names[engineer.feature_names().len()..],
            &["height_change_rate", "height_ma_3", "height_ma_4", "tidal_range", "tide_category"]
        );

        let table = engineer.build(&series(&[0.0, 2.0, 0.0, 2.0, 0.0, 2.0, 0.0])).unwrap();
        assert_eq!(table.names, names);

        let rate = table.column("height_change_rate").unwrap();
        assert_eq!(rate[0], None);
        assert_eq!(rate[1], Some(2.0));
        assert_eq!(rate[2], Some(-2.0));

        // [i − 1, i + 1] and [i − 2, i + 1]
        let ma3 = table.column("height_ma_3").unwrap();
        assert_eq!(ma3[0], None);
        assert_abs_diff_eq!(ma3[1].unwrap(), 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(ma3[6], None);
        let ma4 = table.column("height_ma_4").unwrap();
        assert_eq!(&ma4[..2], &[None, None]);
        assert_eq!(ma4[2], Some(1.0));
        assert_eq!(ma4[5], Some(1.0));
        assert_eq!(ma4[6], None);

        // Highs at 1, 3, 5 and lows at 2, 4
        let range = table.column("tidal_range").unwrap();
        assert!(range.iter().all(|&r| r == Some(2.0)));

        let category = table.column("tide_category").unwrap();
        assert_eq!(category[0], Some(0.0));
        assert_eq!(category[1], Some(4.0));

        // Descriptive columns at the edges keep rows out of the complete set
        assert_eq!(table.warm_up(), Some(2));
        assert!(!table.is_complete(6));
    }

    #[test]
    fn change_rate_uses_elapsed_hours() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let input = [
            Sample::new(start, 1.0),
            Sample::new(start + Duration::minutes(30), 1.5),
            Sample::new(start + Duration::minutes(150), 0.5),
        ];
        let table = tidal().build(&input).unwrap();
        let rate = table.column("height_change_rate").unwrap();
        assert_eq!(rate, vec![None, Some(1.0), Some(-0.5)]);
    }

    #[test]
    fn tidal_range_falls_back_to_height_span() {
        // A ramp has no interior extrema
        let table = tidal().build(&series(&[1.0, 1.5, 2.5, 4.0])).unwrap();
        let range = table.column("tidal_range").unwrap();
        assert!(range.iter().all(|&r| r == Some(3.0)));

        // Too short for extrema detection at all
        let table = tidal().build(&series(&[1.0, 1.25])).unwrap();
        assert_eq!(table.column("tidal_range").unwrap()[0], Some(0.25));
    }

    #[test]
    fn tide_categories_are_equal_width_bands() {
        let heights: Vec<f64> = (0..=10).map(f64::from).collect();
        let bands = TideCategory::classify(&heights);
        assert_eq!(bands[0], TideCategory::VeryLow);
        // Right-closed: 2.0 closes the lowest band
        assert_eq!(bands[2], TideCategory::VeryLow);
        assert_eq!(bands[3], TideCategory::Low);
        assert_eq!(bands[5], TideCategory::Medium);
        assert_eq!(bands[7], TideCategory::High);
        assert_eq!(bands[10], TideCategory::VeryHigh);

        assert!(TideCategory::classify(&[1.2; 4])
            .iter()
            .all(|&c| c == TideCategory::Medium));
        assert!(TideCategory::classify(&[0.0, 0.0])
            .iter()
            .all(|&c| c == TideCategory::Medium));
        assert!(TideCategory::classify(&[]).is_empty());
    }

    #[test]
    fn centred_window_bounds() {
        assert_eq!(centred_window(12, 24, 40), Some(0..=23));
        assert_eq!(centred_window(11, 24, 40), None);
        assert_eq!(centred_window(28, 24, 40), Some(16..=39));
        assert_eq!(centred_window(29, 24, 40), None);
        assert_eq!(centred_window(1, 3, 3), Some(0..=2));
        assert_eq!(centred_window(0, 0, 3), None);
    }

    #[test]
    fn rejects_bad_configuration() {
        let zero_lag = FeatureEngineer::new(FeatureConfig {
            lags: vec![0, 1],
            ..FeatureConfig::default()
        });
        assert!(matches!(
            zero_lag.build(&series(&[1.0, 2.0])),
            Err(AnalysisError::InvalidParameter { name: "lags", .. })
        ));

        let tiny_window = FeatureEngineer::new(FeatureConfig {
            windows: vec![1],
            ..FeatureConfig::default()
        });
        assert!(tiny_window.validate().is_err());

        let tiny_smoothing = FeatureEngineer::new(FeatureConfig {
            tidal: true,
            smoothing_windows: vec![6, 1],
            ..FeatureConfig::default()
        });
        assert!(matches!(
            tiny_smoothing.validate(),
            Err(AnalysisError::InvalidParameter { name: "smoothing_windows", .. })
        ));
    }

    #[test]
    fn mean_and_std_of_constant_window() {
        let (mean, std) = mean_and_std(&[2.5; 6]);
        assert_eq!(mean, 2.5);
        assert_eq!(std, 0.0);
    }
}
