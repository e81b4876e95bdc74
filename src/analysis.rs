//! # Analysis Pipeline
//!
//! [`TideAnalyzer`] runs every component over one series with one
//! [`Config`] and collects the results in a serialisable [`AnalysisReport`]:
//!
//! 1. extrema labels
//! 2. feature table summary
//! 3. dominant periods of the power spectrum
//! 4. harmonic fit and forecast
//! 5. ML fit and forecast
//! 6. anomaly screening
//! 7. descriptive and extreme-event statistics
//!
//! The spectrum and forecasting stages need more history than the others. When a series is
//! too short for one of them that stage is left out of the report with a
//! warning; every other error aborts the run.

use crate::anomaly::{AnomalyDetector, AnomalyReport};
use crate::config::Config;
use crate::extrema::ExtremaDetector;
use crate::features::FeatureEngineer;
use crate::harmonic::{HarmonicDecomposer, HarmonicFit, HarmonicForecaster};
use crate::ml_forecast::{FitMetrics, MlForecaster};
use crate::spectrum::{Spectrum, SpectrumAnalyzer};
use crate::stats::{ExtremeAnalysis, TidalStatistics};
use crate::{ForecastPoint, LabeledSample, Observation, Result, TideType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub samples: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureSummary {
    pub names: Vec<String>,
    pub complete_rows: usize,
    /// First row with every feature defined
    pub warm_up: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HarmonicSection {
    pub fit: HarmonicFit,
    pub forecast: Vec<ForecastPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MlSection {
    pub metrics: FitMetrics,
    pub forecast: Vec<ForecastPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub span: SeriesSpan,
    pub labels: Vec<LabeledSample>,
    pub high_count: usize,
    pub low_count: usize,
    pub features: FeatureSummary,
    pub spectrum: Option<Spectrum>,
    pub harmonic: Option<HarmonicSection>,
    pub ml: Option<MlSection>,
    pub anomalies: AnomalyReport,
    pub statistics: TidalStatistics,
    pub extremes: ExtremeAnalysis,
    /// Skipped stages and recovered numeric problems
    pub warnings: Vec<String>,
}

/// Runs the full analysis chain.
#[derive(Clone, Debug, Default)]
pub struct TideAnalyzer {
    config: Config,
}

impl TideAnalyzer {
    pub fn new(config: Config) -> Self {
        TideAnalyzer { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run<O: Observation>(&self, series: &[O]) -> Result<AnalysisReport> {
        let config = &self.config;
        let mut warnings = Vec::new();

        let labels = ExtremaDetector::new(config.extrema.clone()).detect(series)?;
        let count = |kind: TideType| labels.iter().filter(|l| l.tide_type == kind).count();
        let (high_count, low_count) = (count(TideType::High), count(TideType::Low));

        let table = FeatureEngineer::new(config.features.clone())
            .with_extrema(config.extrema.clone())
            .build(series)?;
        let features = FeatureSummary {
            complete_rows: table.complete_rows().count(),
            warm_up: table.warm_up(),
            names: table.names,
        };

        let spectrum = skip_if_short(
            SpectrumAnalyzer::new(config.spectrum.clone()).analyze(series),
            "spectrum",
            &mut warnings,
        )?;
        let harmonic = skip_if_short(self.harmonic_stage(series), "harmonic", &mut warnings)?;
        let ml = skip_if_short(self.ml_stage(series), "ML", &mut warnings)?;

        let anomalies = AnomalyDetector::new(config.anomaly.clone()).detect(series)?;
        warnings.extend(anomalies.recovered.iter().map(|e| e.to_string()));

        let statistics = TidalStatistics::compute(&labels)?;
        let extremes = ExtremeAnalysis::analyze(series)?;

        info!(
            samples = series.len(),
            highs = high_count,
            lows = low_count,
            anomalies = anomalies.summary.total_count,
            "analysis complete"
        );

        Ok(AnalysisReport {
            span: SeriesSpan {
                start: labels[0].timestamp,
                end: labels[labels.len() - 1].timestamp,
                samples: labels.len(),
            },
            labels,
            high_count,
            low_count,
            features,
            spectrum,
            harmonic,
            ml,
            anomalies,
            statistics,
            extremes,
            warnings,
        })
    }

    fn harmonic_stage<O: Observation>(&self, series: &[O]) -> Result<HarmonicSection> {
        let fit = HarmonicDecomposer::from_config(&self.config.harmonic).decompose(series)?;
        let forecast = HarmonicForecaster::from_config(&self.config.harmonic).forecast(&fit)?;
        Ok(HarmonicSection { fit, forecast })
    }

    fn ml_stage<O: Observation>(&self, series: &[O]) -> Result<MlSection> {
        let forecaster = MlForecaster::from_config(&self.config);
        let model = forecaster.fit(series)?;
        let forecast = forecaster.forecast_default(&model)?;
        Ok(MlSection {
            metrics: model.metrics().clone(),
            forecast,
        })
    }
}

/// Turn an insufficient-data error into a skipped stage.
fn skip_if_short<T>(
    result: Result<T>,
    stage: &str,
    warnings: &mut Vec<String>,
) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_insufficient_data() => {
            warn!(stage, error = %e, "skipping stage");
            warnings.push(format!("{stage} stage skipped: {e}"));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
