//! # ML Forecasting
//!
//! Autoregressive height forecasting with a random forest over lag, rolling
//! and calendar features.
//!
//! Training and forecasting build their feature vectors the same way, through
//! [`FeatureEngineer::predictive_row`]: the row for time `t` only sees heights
//! before `t`. During forecasting each prediction is appended to the history
//! and feeds the lags of the following steps.
//!
//! ## Model lifecycle
//! [`MlForecaster::fit`] returns a [`FittedModel`], an immutable value that can
//! be shared across threads and used for any number of forecasts. Callers that
//! keep a long-lived slot use [`ForecastSession`]: installing or dropping a
//! model needs `&mut`, so the slot is never replaced under a running forecast.

use crate::config::{Config, FeatureConfig, MlConfig};
use crate::features::FeatureEngineer;
use crate::forest::{ForestParams, RandomForest};
use crate::{
    grid_point, step_duration, validate_series, AnalysisError, ForecastMethod, ForecastPoint,
    Observation, Result,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Hold-out metrics of a fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub r2: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Mean impurity decrease per feature, summing to 1
    pub feature_importance: BTreeMap<String, f64>,
}

/// A trained forecaster, ready to predict forward from the end of its series.
#[derive(Clone, Debug)]
pub struct FittedModel {
    forest: RandomForest,
    feature_names: Vec<String>,
    features: FeatureConfig,
    /// Trailing observed heights, enough to seed the first forecast step
    history: Vec<f64>,
    last_observed: DateTime<Utc>,
    metrics: FitMetrics,
}

impl FittedModel {
    pub fn metrics(&self) -> &FitMetrics {
        &self.metrics
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn last_observed(&self) -> DateTime<Utc> {
        self.last_observed
    }
}

/// Optional slot for a fitted model.
#[derive(Clone, Debug, Default)]
pub struct ForecastSession {
    model: Option<FittedModel>,
}

impl ForecastSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held model, returning the previous one.
    pub fn install(&mut self, model: FittedModel) -> Option<FittedModel> {
        self.model.replace(model)
    }

    /// Drop the held model; forecasts fail until a new one is installed.
    pub fn invalidate(&mut self) -> Option<FittedModel> {
        self.model.take()
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Result<&FittedModel> {
        self.model.as_ref().ok_or_else(|| AnalysisError::ModelNotFitted {
            reason: "no model installed in the session".into(),
        })
    }
}

/// Random-forest forecaster.
#[derive(Clone, Debug, Default)]
pub struct MlForecaster {
    config: MlConfig,
    engineer: FeatureEngineer,
}

impl MlForecaster {
    pub fn new(config: MlConfig, engineer: FeatureEngineer) -> Self {
        MlForecaster { config, engineer }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ml.clone(), FeatureEngineer::new(config.features.clone()))
    }

    pub fn config(&self) -> &MlConfig {
        &self.config
    }

    fn validate(&self) -> Result<()> {
        self.engineer.validate()?;
        let fraction = self.config.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(AnalysisError::invalid(
                "test_fraction",
                format!("must lie strictly between 0 and 1, got {fraction}"),
            ));
        }
        if self.config.min_rows_factor == 0 {
            return Err(AnalysisError::invalid("min_rows_factor", "must be at least 1"));
        }
        Ok(())
    }

    /// Train on every sample that has enough history, holding out a seeded
    /// random `test_fraction` of them for the metrics.
    pub fn fit<O: Observation>(&self, series: &[O]) -> Result<FittedModel> {
        self.validate()?;
        validate_series(series)?;

        let heights: Vec<f64> = series.iter().map(|o| o.height()).collect();
        let lookback = self.engineer.lookback();
        let required = (self.config.min_rows_factor * self.engineer.largest_lag()).max(2);
        let available = heights.len().saturating_sub(lookback);
        if available < required {
            return Err(AnalysisError::InsufficientData {
                operation: "ML training",
                required,
                available,
            });
        }

        let mut x = Vec::with_capacity(available);
        let mut y = Vec::with_capacity(available);
        let mut source = Vec::with_capacity(available);
        for i in lookback..heights.len() {
            if let Some(row) = self.engineer.predictive_row(&heights[..i], series[i].timestamp()) {
                x.push(row);
                y.push(heights[i]);
                source.push(i);
            }
        }
        // Features are finite functions of heights already checked by
        // `validate_series`, so every row is usable as is

        let (train, test) = split_indices(x.len(), self.config.test_fraction, self.config.seed);
        debug!(train = train.len(), test = test.len(), "split training rows");

        let train_x: Vec<Vec<f64>> = train.iter().map(|&r| x[r].clone()).collect();
        let train_y: Vec<f64> = train.iter().map(|&r| y[r]).collect();
        let params = ForestParams::from(&self.config);
        let forest = RandomForest::fit(&train_x, &train_y, &params).map_err(|e| match e {
            AnalysisError::ModelTraining { rows, reason } => AnalysisError::ModelTraining {
                rows: rows.into_iter().map(|r| source[train[r]]).collect(),
                reason,
            },
            other => other,
        })?;

        let actual: Vec<f64> = test.iter().map(|&r| y[r]).collect();
        let predicted: Vec<f64> = test.iter().map(|&r| forest.predict(&x[r])).collect();
        let mse = mean_squared_error(&actual, &predicted);
        let feature_names = self.engineer.feature_names();
        let metrics = FitMetrics {
            mse,
            rmse: mse.sqrt(),
            r2: r_squared(&actual, &predicted),
            train_rows: train.len(),
            test_rows: test.len(),
            feature_importance: feature_names
                .iter()
                .cloned()
                .zip(forest.feature_importances().iter().copied())
                .collect(),
        };
        info!(
            rows = x.len(),
            rmse = metrics.rmse,
            r2 = metrics.r2,
            "ML model trained"
        );

        let last = &series[series.len() - 1];
        Ok(FittedModel {
            forest,
            feature_names,
            features: self.engineer.config().clone(),
            history: heights[heights.len() - lookback..].to_vec(),
            last_observed: last.timestamp(),
            metrics,
        })
    }

    /// Predict `n_steps` points after the model's last observation, feeding
    /// each prediction back into the lag history.
    pub fn forecast(
        &self,
        model: &FittedModel,
        n_steps: usize,
        step_minutes: f64,
    ) -> Result<Vec<ForecastPoint>> {
        let step = step_duration(step_minutes)?;
        grid_point(model.last_observed, step, n_steps, "n_steps")?;
        if model.feature_names != self.engineer.feature_names() {
            return Err(AnalysisError::ModelNotFitted {
                reason: "feature configuration changed since the model was fitted".into(),
            });
        }

        let engineer = FeatureEngineer::new(model.features.clone());
        let mut history = model.history.clone();
        let mut points = Vec::with_capacity(n_steps);
        for k in 1..=n_steps {
            let timestamp = grid_point(model.last_observed, step, k, "n_steps")?;
            let row = engineer
                .predictive_row(&history, timestamp)
                .ok_or_else(|| AnalysisError::ModelNotFitted {
                    reason: "model history is shorter than the feature lookback".into(),
                })?;
            let predicted_height = model.forest.predict(&row);
            history.push(predicted_height);
            points.push(ForecastPoint {
                timestamp,
                predicted_height,
                method: ForecastMethod::Ml,
            });
        }
        debug!(points = points.len(), "ML forecast complete");
        Ok(points)
    }

    /// [`Self::forecast`] with the configured step count and spacing.
    pub fn forecast_default(&self, model: &FittedModel) -> Result<Vec<ForecastPoint>> {
        self.forecast(model, self.config.forecast_steps, self.config.step_minutes)
    }

    /// Forecast from the model held by `session`.
    pub fn forecast_session(
        &self,
        session: &ForecastSession,
        n_steps: usize,
        step_minutes: f64,
    ) -> Result<Vec<ForecastPoint>> {
        self.forecast(session.model()?, n_steps, step_minutes)
    }
}

/// Seeded shuffle split; the test set gets `ceil(fraction * n)` rows but
/// never all of them.
fn split_indices(n: usize, fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((fraction * n as f64).ceil() as usize).clamp(1, n - 1);
    let train = order.split_off(n_test);
    (train, order)
}

fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// Coefficient of determination. A constant target scores 1 when predicted
/// exactly and 0 otherwise.
fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sample;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, TimeZone};
    use std::f64::consts::TAU;

    fn hourly_tide(n: usize) -> Vec<Sample> {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let t = i as f64;
                Sample::new(
                    start + Duration::hours(i as i64),
                    1.5 + (TAU * t / 12.4206).cos() + 0.3 * (TAU * t / 23.9345 + 0.4).cos(),
                )
            })
            .collect()
    }

    fn forecaster() -> MlForecaster {
        MlForecaster::new(
            MlConfig {
                n_trees: 20,
                ..MlConfig::default()
            },
            FeatureEngineer::default(),
        )
    }

    #[test]
    fn fit_reports_holdout_metrics() {
        let series = hourly_tide(24 * 14);
        let model = forecaster().fit(&series).unwrap();
        let m = model.metrics();

        // 312 rows after the 24-sample lookback, 20% held out
        assert_eq!(m.train_rows + m.test_rows, 312);
        assert_eq!(m.test_rows, 63);
        assert!(m.r2 > 0.9, "r2 {}", m.r2);
        assert_abs_diff_eq!(m.rmse, m.mse.sqrt(), epsilon = 1e-15);
        assert_abs_diff_eq!(m.feature_importance.values().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_eq!(model.feature_names().len(), m.feature_importance.len());
        assert_eq!(model.last_observed(), series.last().unwrap().timestamp);
    }

    #[test]
    fn same_seed_same_model() {
        let series = hourly_tide(24 * 10);
        let ml = forecaster();
        let a = ml.fit(&series).unwrap();
        let b = ml.fit(&series).unwrap();
        assert_eq!(a.metrics(), b.metrics());

        let fa = ml.forecast(&a, 48, 15.0).unwrap();
        let fb = ml.forecast(&b, 48, 15.0).unwrap();
        assert_eq!(fa, fb);
    }

    #[test]
    fn forecast_has_requested_points_and_spacing() {
        let series = hourly_tide(24 * 10);
        let ml = forecaster();
        let model = ml.fit(&series).unwrap();
        let points = ml.forecast(&model, 24, 15.0).unwrap();

        assert_eq!(points.len(), 24);
        assert_eq!(points[0].timestamp, model.last_observed() + Duration::minutes(15));
        for pair in points.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::minutes(15));
        }
        assert!(points.iter().all(|p| p.method == ForecastMethod::Ml));
        assert!(points.iter().all(|p| p.predicted_height.is_finite()));
        assert!(ml.forecast(&model, 0, 15.0).unwrap().is_empty());
    }

    #[test]
    fn too_few_rows_is_insufficient_data() {
        // 30 samples leave 6 rows after a 24-sample lookback; 48 are needed
        let err = forecaster().fit(&hourly_tide(30)).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InsufficientData {
                operation: "ML training",
                required: 48,
                available: 6,
            }
        );
    }

    #[test]
    fn session_lifecycle() {
        let series = hourly_tide(24 * 6);
        let ml = forecaster();
        let mut session = ForecastSession::new();
        assert!(matches!(
            ml.forecast_session(&session, 4, 15.0),
            Err(AnalysisError::ModelNotFitted { .. })
        ));

        assert!(session.install(ml.fit(&series).unwrap()).is_none());
        assert!(session.is_fitted());
        assert_eq!(ml.forecast_session(&session, 4, 15.0).unwrap().len(), 4);

        session.invalidate();
        assert!(session.model().is_err());
    }

    #[test]
    fn changed_features_require_refit() {
        let series = hourly_tide(24 * 6);
        let model = forecaster().fit(&series).unwrap();
        let other = MlForecaster::new(
            MlConfig::default(),
            FeatureEngineer::new(FeatureConfig {
                lunar: true,
                ..FeatureConfig::default()
            }),
        );
        assert!(matches!(
            other.forecast(&model, 4, 15.0),
            Err(AnalysisError::ModelNotFitted { .. })
        ));
    }

    #[test]
    fn rejects_bad_parameters() {
        let series = hourly_tide(24 * 6);
        let ml = MlForecaster::new(
            MlConfig {
                test_fraction: 1.0,
                ..MlConfig::default()
            },
            FeatureEngineer::default(),
        );
        assert!(matches!(
            ml.fit(&series),
            Err(AnalysisError::InvalidParameter { name: "test_fraction", .. })
        ));

        let ml = forecaster();
        let model = ml.fit(&series).unwrap();
        assert!(ml.forecast(&model, 4, 0.0).is_err());
        assert!(ml.forecast(&model, 4, f64::NAN).is_err());
    }

    /// Steps that run past chrono's calendar range are rejected up front.
    #[test]
    fn rejects_forecast_beyond_calendar() {
        let ml = forecaster();
        let model = ml.fit(&hourly_tide(24 * 6)).unwrap();

        assert!(matches!(
            ml.forecast(&model, 2, 1e11),
            Err(AnalysisError::InvalidParameter { name: "n_steps", .. })
        ));
        assert!(matches!(
            ml.forecast(&model, usize::MAX, 15.0),
            Err(AnalysisError::InvalidParameter { name: "n_steps", .. })
        ));
        assert!(matches!(
            ml.forecast(&model, 1, 1e20),
            Err(AnalysisError::InvalidParameter { name: "step_minutes", .. })
        ));
    }

    #[test]
    fn non_finite_heights_stop_the_fit() {
        let mut series = hourly_tide(24 * 6);
        series[100].height = f64::INFINITY;
        assert!(matches!(
            forecaster().fit(&series),
            Err(AnalysisError::NonFiniteHeight { index: 100, .. })
        ));
    }

    #[test]
    fn split_is_seeded_and_disjoint() {
        let (train, test) = split_indices(10, 0.2, 42);
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
        assert_eq!(split_indices(10, 0.2, 42), (train, test));

        // Never empties the training set
        assert_eq!(split_indices(2, 0.9, 1).0.len(), 1);
    }

    #[test]
    fn r_squared_edge_cases() {
        assert_eq!(r_squared(&[1.0, 1.0], &[1.0, 1.0]), 1.0);
        assert_eq!(r_squared(&[1.0, 1.0], &[1.0, 2.0]), 0.0);
        assert_abs_diff_eq!(r_squared(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 1.0);
        assert_abs_diff_eq!(mean_squared_error(&[1.0, 2.0], &[2.0, 4.0]), 2.5);
    }
}
