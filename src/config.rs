//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! `tide-analytics.toml` file. Every analysis component takes its parameters
//! from one section of [`Config`]; the defaults reproduce the reference
//! behaviour (prominence 0.3, lags 1-24, 80/20 split with seed 42, z-score 2.5,
//! 5% contamination).
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it
//! changes:
//!
//! ```toml
//! [anomaly]
//! z_threshold = 3.0
//!
//! [harmonic]
//! strategy = "joint"
//! ```

use crate::harmonic::{ConstituentKind, FitStrategy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "tide-analytics.toml";

/// Application configuration loaded from tide-analytics.toml
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// High/low tide detection
    pub extrema: ExtremaConfig,
    /// Lag, rolling and calendar features
    pub features: FeatureConfig,
    /// Constituent fit and harmonic forecast
    pub harmonic: HarmonicConfig,
    /// Forest regressor and autoregressive forecast
    pub ml: MlConfig,
    /// Z-score and isolation forest screening
    pub anomaly: AnomalyConfig,
    /// Dominant-period search
    pub spectrum: SpectrumConfig,
}

/// Peak/trough selection parameters
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtremaConfig {
    /// Minimum index separation between two accepted extrema of the same kind
    pub min_distance: usize,
    /// Minimum prominence, in height units
    pub min_prominence: f64,
}

impl Default for ExtremaConfig {
    fn default() -> Self {
        ExtremaConfig {
            min_distance: 2,
            min_prominence: 0.3,
        }
    }
}

/// Feature engineering parameters
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Lag offsets in samples
    pub lags: Vec<usize>,
    /// Rolling window lengths in samples
    pub windows: Vec<usize>,
    /// Add raw `hour`, `day_of_year` and `month` columns
    pub calendar: bool,
    /// Add moon phase, illumination, spring-tide and orbital cycle columns
    pub lunar: bool,
    /// Add the descriptive tidal columns (change rate, centred moving
    /// averages, tidal range, tide category) to the feature table
    pub tidal: bool,
    /// Centred moving-average lengths in samples, used when `tidal` is set
    pub smoothing_windows: Vec<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            lags: vec![1, 2, 3, 6, 12, 24],
            windows: vec![6, 12, 24],
            calendar: true,
            lunar: false,
            tidal: false,
            smoothing_windows: vec![6, 24],
        }
    }
}

/// Harmonic decomposition and forecast parameters
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HarmonicConfig {
    /// Constituents to fit, in report order
    pub constituents: Vec<ConstituentKind>,
    /// Independent per-constituent fits (default) or one joint fit
    pub strategy: FitStrategy,
    /// Forecast horizon in hours
    pub horizon_hours: f64,
    /// Forecast spacing in minutes
    pub step_minutes: f64,
}

impl Default for HarmonicConfig {
    fn default() -> Self {
        HarmonicConfig {
            constituents: ConstituentKind::ALL.to_vec(),
            strategy: FitStrategy::Independent,
            horizon_hours: 72.0,
            step_minutes: 15.0,
        }
    }
}

/// Forest regressor and autoregressive forecast parameters
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MlConfig {
    /// Fraction of clean rows held out for metrics
    pub test_fraction: f64,
    /// Seed for the split, bootstrap draws and split candidates
    pub seed: u64,
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Depth limit per tree (unlimited when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Minimum rows a node needs before it may split
    pub min_samples_split: usize,
    /// Minimum rows on each side of a split
    pub min_samples_leaf: usize,
    /// Features considered per split (all when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_features: Option<usize>,
    /// Clean rows required, as a multiple of the largest lag
    pub min_rows_factor: usize,
    /// Number of autoregressive forecast steps
    pub forecast_steps: usize,
    /// Forecast spacing in minutes
    pub step_minutes: f64,
}

impl Default for MlConfig {
    fn default() -> Self {
        MlConfig {
            test_fraction: 0.2,
            seed: 42,
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            min_rows_factor: 2,
            forecast_steps: 72 * 4, // 72 h at 15-minute steps
            step_minutes: 15.0,
        }
    }
}

/// Anomaly screening parameters
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Centred rolling window length in samples
    pub window: usize,
    /// Z-score above which a point is flagged
    pub z_threshold: f64,
    /// Fraction of points the isolation forest flags
    pub contamination: f64,
    /// Number of isolation trees
    pub n_trees: usize,
    /// Subsample size per isolation tree
    pub sample_size: usize,
    /// Seed for subsampling and random splits
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        AnomalyConfig {
            window: 24,
            z_threshold: 2.5,
            contamination: 0.05,
            n_trees: 100,
            sample_size: 256,
            seed: 42,
        }
    }
}

/// Power spectrum parameters
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Number of dominant frequencies reported
    pub top_n: usize,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        SpectrumConfig { top_n: 10 }
    }
}

impl Config {
    /// Load configuration from tide-analytics.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded analysis configuration");
                    config
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "invalid config file format, using defaults"
                    );
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save current configuration to tide-analytics.toml
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to_path(CONFIG_FILE)
    }

    /// Save current configuration to the given path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.extrema.min_distance, 2);
        assert_eq!(config.extrema.min_prominence, 0.3);
        assert_eq!(config.features.lags, vec![1, 2, 3, 6, 12, 24]);
        assert_eq!(config.features.windows, vec![6, 12, 24]);
        assert!(!config.features.tidal);
        assert_eq!(config.features.smoothing_windows, vec![6, 24]);
        assert_eq!(config.harmonic.constituents.len(), 6);
        assert_eq!(config.harmonic.strategy, FitStrategy::Independent);
        assert_eq!(config.ml.test_fraction, 0.2);
        assert_eq!(config.ml.seed, 42);
        assert_eq!(config.anomaly.window, 24);
        assert_eq!(config.anomaly.z_threshold, 2.5);
        assert_eq!(config.anomaly.contamination, 0.05);
        assert_eq!(config.spectrum.top_n, 10);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [anomaly]
            z_threshold = 3.0

            [harmonic]
            strategy = "joint"
            constituents = ["M2", "K1"]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.anomaly.z_threshold, 3.0);
        assert_eq!(parsed.anomaly.window, 24);
        assert_eq!(parsed.harmonic.strategy, FitStrategy::Joint);
        assert_eq!(
            parsed.harmonic.constituents,
            vec![ConstituentKind::M2, ConstituentKind::K1]
        );
        assert_eq!(parsed.extrema, ExtremaConfig::default());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_from_path() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.ml.seed = 7;
        config.ml.max_depth = Some(12);
        config.features.lunar = true;
        config.features.tidal = true;
        config.spectrum.top_n = 4;

        config.save_to_path(temp_file.path()).unwrap();
        let loaded = Config::load_from_path(temp_file.path());
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "extrema = [not toml").unwrap();
        let config = Config::load_from_path(temp_file.path());
        assert_eq!(config, Config::default());
    }
}
