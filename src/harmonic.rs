//! # Harmonic Constituent Fitting and Forecasting
//!
//! Approximates the tide as a mean level plus a sum of fixed-period cosines:
//!
//! ```text
//! h(t) = mean + Σᵢ Aᵢ cos(ωᵢ t + φᵢ),   ωᵢ = 2π / periodᵢ
//! ```
//!
//! with `t` in elapsed hours since the first sample of the fitted series.
//!
//! ## Constituents
//! Six constituents with fixed periods are supported: the semi-diurnal M2,
//! S2 and N2, and the diurnal K1, O1 and P1. Periods are constants of
//! [`ConstituentKind`]; only amplitude and phase are fitted.
//!
//! ## Fit Strategies
//! - [`FitStrategy::Independent`] (default): each constituent is fitted on its
//!   own by a two-column least-squares problem against the mean-removed
//!   heights. Constituents are not orthogonalised against each other, so close
//!   frequencies (S2 at 12.00 h next to M2 at 12.42 h) leak into each other on
//!   short records.
//! - [`FitStrategy::Joint`]: one least-squares problem with an intercept and
//!   every cosine/sine column, solved through the normal equations with a
//!   full-pivot LU. Fails with [`AnalysisError::RankDeficient`] when two
//!   columns cannot be told apart on the sampled record.
//!
//! ## Accuracy Trade-offs
//! - ✅ **Real time axis**: irregular spacing is handled, `t` is never a sample index
//! - ✅ **Deterministic**: forecasting is a pure function of the fit
//! - ❌ **No nodal corrections**: amplitudes and phases are constant in time
//! - ❌ **No shallow-water constituents**: overtides are not modelled

use crate::config::HarmonicConfig;
use crate::{
    grid_point, hours_since, step_duration, validate_series, AnalysisError, ForecastMethod,
    ForecastPoint, Observation, Result,
};
use chrono::{DateTime, Utc};
use faer::linalg::solvers::Solve;
use faer::{Mat, MatRef};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::fmt;
use tracing::{debug, info};

/// Smallest pivot of the joint normal matrix, relative to the largest,
/// still treated as an independent column
const RANK_TOLERANCE: f64 = 1e-12;

/// The supported tidal constituents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstituentKind {
    /// Principal lunar semi-diurnal
    M2,
    /// Principal solar semi-diurnal
    S2,
    /// Larger lunar elliptic semi-diurnal
    N2,
    /// Luni-solar diurnal
    K1,
    /// Principal lunar diurnal
    O1,
    /// Principal solar diurnal
    P1,
}

impl ConstituentKind {
    /// All constituents in report order
    pub const ALL: [ConstituentKind; 6] = [
        ConstituentKind::M2,
        ConstituentKind::S2,
        ConstituentKind::N2,
        ConstituentKind::K1,
        ConstituentKind::O1,
        ConstituentKind::P1,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConstituentKind::M2 => "M2",
            ConstituentKind::S2 => "S2",
            ConstituentKind::N2 => "N2",
            ConstituentKind::K1 => "K1",
            ConstituentKind::O1 => "O1",
            ConstituentKind::P1 => "P1",
        }
    }

    /// Period in hours.
    pub fn period_hours(self) -> f64 {
        match self {
            ConstituentKind::M2 => 12.4206,
            ConstituentKind::S2 => 12.0000,
            ConstituentKind::N2 => 12.6583,
            ConstituentKind::K1 => 23.9345,
            ConstituentKind::O1 => 25.8193,
            ConstituentKind::P1 => 24.0659,
        }
    }

    /// Angular frequency ω = 2π/T in radians per hour.
    pub fn angular_frequency(self) -> f64 {
        TAU / self.period_hours()
    }
}

impl fmt::Display for ConstituentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fitted constituent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constituent {
    #[serde(rename = "name")]
    pub kind: ConstituentKind,
    /// Amplitude in height units, never negative
    pub amplitude: f64,
    /// Phase in radians, in (−π, π]
    pub phase: f64,
}

impl Constituent {
    pub fn new(kind: ConstituentKind, amplitude: f64, phase: f64) -> Self {
        Constituent {
            kind,
            amplitude,
            phase: normalize_phase(phase),
        }
    }

    pub fn period_hours(&self) -> f64 {
        self.kind.period_hours()
    }

    /// Contribution at `t` hours: `A cos(ωt + φ)`.
    pub fn evaluate(&self, t_hours: f64) -> f64 {
        self.amplitude * (self.kind.angular_frequency() * t_hours + self.phase).cos()
    }

    /// Build from least-squares coefficients of `a·cos(ωt) + b·sin(ωt)`.
    ///
    /// `a·cos + b·sin = A·cos(ωt + φ)` with `A = √(a²+b²)` and `φ = atan2(−b, a)`.
    fn from_coefficients(kind: ConstituentKind, a: f64, b: f64) -> Self {
        Constituent::new(kind, a.hypot(b), (-b).atan2(a))
    }
}

/// Map any angle into (−π, π].
pub fn normalize_phase(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// How constituents are fitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitStrategy {
    /// One two-column regression per constituent (reference behaviour)
    #[default]
    Independent,
    /// One regression over every constituent plus an intercept
    Joint,
}

/// Result of a harmonic decomposition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarmonicFit {
    /// Fitted constituents in the requested order
    pub constituents: Vec<Constituent>,
    /// Level the constituents oscillate around (series mean, or the intercept
    /// of a joint fit)
    pub mean_height: f64,
    /// First timestamp of the fitted series, `t = 0`
    pub origin: DateTime<Utc>,
    /// Last timestamp of the fitted series
    pub last_observed: DateTime<Utc>,
    pub strategy: FitStrategy,
}

impl HarmonicFit {
    /// Modelled height at `t` hours after the origin.
    pub fn evaluate(&self, t_hours: f64) -> f64 {
        self.mean_height
            + self
                .constituents
                .iter()
                .map(|c| c.evaluate(t_hours))
                .sum::<f64>()
    }

    /// Modelled height at an instant.
    pub fn evaluate_at(&self, timestamp: DateTime<Utc>) -> f64 {
        self.evaluate(hours_since(self.origin, timestamp))
    }

    pub fn constituent(&self, kind: ConstituentKind) -> Option<&Constituent> {
        self.constituents.iter().find(|c| c.kind == kind)
    }
}

/// Fits constituent amplitudes and phases.
#[derive(Clone, Debug)]
pub struct HarmonicDecomposer {
    constituents: Vec<ConstituentKind>,
    strategy: FitStrategy,
}

impl Default for HarmonicDecomposer {
    fn default() -> Self {
        HarmonicDecomposer::new(ConstituentKind::ALL.to_vec(), FitStrategy::Independent)
    }
}

impl HarmonicDecomposer {
    pub fn new(constituents: Vec<ConstituentKind>, strategy: FitStrategy) -> Self {
        HarmonicDecomposer {
            constituents,
            strategy,
        }
    }

    pub fn from_config(config: &HarmonicConfig) -> Self {
        HarmonicDecomposer::new(config.constituents.clone(), config.strategy)
    }

    /// Fit every configured constituent to the series.
    ///
    /// # Errors
    /// - [`AnalysisError::InvalidParameter`] for an empty or duplicated constituent list
    /// - [`AnalysisError::InsufficientData`] for fewer than two samples per
    ///   constituent (plus one for the joint intercept)
    /// - [`AnalysisError::InsufficientSpan`] when the series is shorter than the
    ///   longest constituent period
    /// - [`AnalysisError::RankDeficient`] when a joint fit cannot separate its columns
    pub fn decompose<O: Observation>(&self, series: &[O]) -> Result<HarmonicFit> {
        self.validate()?;

        let mut required = 2 * self.constituents.len();
        if self.strategy == FitStrategy::Joint {
            required += 1;
        }
        if series.len() < required {
            return Err(AnalysisError::InsufficientData {
                operation: "harmonic decomposition",
                required,
                available: series.len(),
            });
        }
        validate_series(series)?;

        let origin = series[0].timestamp();
        let last_observed = series[series.len() - 1].timestamp();
        let span = hours_since(origin, last_observed);
        let longest = self
            .constituents
            .iter()
            .map(|k| k.period_hours())
            .fold(0.0, f64::max);
        if span < longest {
            return Err(AnalysisError::InsufficientSpan {
                operation: "harmonic decomposition",
                required_hours: longest,
                available_hours: span,
            });
        }

        let t: Vec<f64> = series
            .iter()
            .map(|o| hours_since(origin, o.timestamp()))
            .collect();
        let heights: Vec<f64> = series.iter().map(|o| o.height()).collect();

        let (constituents, mean_height) = match self.strategy {
            FitStrategy::Independent => self.fit_independent(&t, &heights),
            FitStrategy::Joint => self.fit_joint(&t, &heights)?,
        };

        for c in &constituents {
            debug!(
                constituent = %c.kind,
                amplitude = c.amplitude,
                phase = c.phase,
                "fitted constituent"
            );
        }
        info!(
            samples = series.len(),
            span_hours = span,
            strategy = ?self.strategy,
            mean_height,
            "harmonic decomposition complete"
        );

        Ok(HarmonicFit {
            constituents,
            mean_height,
            origin,
            last_observed,
            strategy: self.strategy,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.constituents.is_empty() {
            return Err(AnalysisError::invalid(
                "constituents",
                "at least one constituent is required",
            ));
        }
        for (i, kind) in self.constituents.iter().enumerate() {
            if self.constituents[..i].contains(kind) {
                return Err(AnalysisError::invalid(
                    "constituents",
                    format!("{kind} listed more than once"),
                ));
            }
        }
        Ok(())
    }

    fn fit_independent(&self, t: &[f64], heights: &[f64]) -> (Vec<Constituent>, f64) {
        let mean = heights.iter().sum::<f64>() / heights.len() as f64;
        let constituents = self
            .constituents
            .iter()
            .map(|&kind| {
                let omega = kind.angular_frequency();
                let (mut cc, mut ss, mut cs, mut cy, mut sy) = (0.0, 0.0, 0.0, 0.0, 0.0);
                for (&ti, &hi) in t.iter().zip(heights) {
                    let (s, c) = (omega * ti).sin_cos();
                    let y = hi - mean;
                    cc += c * c;
                    ss += s * s;
                    cs += c * s;
                    cy += c * y;
                    sy += s * y;
                }
                let (a, b) = solve_normal_2x2(cc, cs, ss, cy, sy);
                Constituent::from_coefficients(kind, a, b)
            })
            .collect();
        (constituents, mean)
    }

    fn fit_joint(&self, t: &[f64], heights: &[f64]) -> Result<(Vec<Constituent>, f64)> {
        let n_unknowns = 1 + 2 * self.constituents.len();

        // Design matrix [1, cos(ω₁t), sin(ω₁t), cos(ω₂t), sin(ω₂t), ...]
        let mut design = Mat::<f64>::zeros(t.len(), n_unknowns);
        for (i, &ti) in t.iter().enumerate() {
            design[(i, 0)] = 1.0;
            for (j, kind) in self.constituents.iter().enumerate() {
                let (s, c) = (kind.angular_frequency() * ti).sin_cos();
                design[(i, 1 + 2 * j)] = c;
                design[(i, 2 + 2 * j)] = s;
            }
        }

        // Normal equations AᵀA x = Aᵀy
        let mut normal = Mat::<f64>::zeros(n_unknowns, n_unknowns);
        let mut rhs = Mat::<f64>::zeros(n_unknowns, 1);
        for r in 0..n_unknowns {
            for c in r..n_unknowns {
                let dot: f64 = (0..t.len()).map(|i| design[(i, r)] * design[(i, c)]).sum();
                normal[(r, c)] = dot;
                normal[(c, r)] = dot;
            }
            rhs[(r, 0)] = (0..t.len()).map(|i| design[(i, r)] * heights[i]).sum();
        }

        let lu = normal.as_ref().full_piv_lu();
        if is_rank_deficient(lu.U()) {
            return Err(AnalysisError::RankDeficient {
                operation: "joint harmonic fit",
                columns: n_unknowns,
            });
        }
        let x = lu.solve(&rhs);

        let constituents = self
            .constituents
            .iter()
            .enumerate()
            .map(|(j, &kind)| {
                Constituent::from_coefficients(kind, x[(1 + 2 * j, 0)], x[(2 + 2 * j, 0)])
            })
            .collect();
        Ok((constituents, x[(0, 0)]))
    }
}

/// Full pivoting sorts the pivots by magnitude, so a pivot that is negligible
/// against the first marks columns the fit cannot tell apart.
fn is_rank_deficient(u: MatRef<'_, f64>) -> bool {
    let pivots: Vec<f64> = (0..u.nrows().min(u.ncols())).map(|k| u[(k, k)].abs()).collect();
    let largest = pivots.iter().copied().fold(0.0, f64::max);
    largest == 0.0 || pivots.iter().any(|&p| !(p > largest * RANK_TOLERANCE))
}

/// Minimum-norm solution of the symmetric 2×2 system
/// `[[cc, cs], [cs, ss]] · [a, b] = [cy, sy]`.
///
/// Directions with a negligible eigenvalue (samples aliased onto the
/// constituent period) contribute nothing instead of blowing up.
fn solve_normal_2x2(cc: f64, cs: f64, ss: f64, cy: f64, sy: f64) -> (f64, f64) {
    let half_trace = 0.5 * (cc + ss);
    let radius = (0.25 * (cc - ss).powi(2) + cs * cs).sqrt();
    let eigenvalues = [half_trace + radius, half_trace - radius];
    let tolerance = eigenvalues[0].abs() * 1e-12;

    // Orthonormal eigenvectors of the symmetric matrix
    let (theta_c, theta_s) = if cs == 0.0 && cc >= ss {
        (1.0, 0.0)
    } else if cs == 0.0 {
        (0.0, 1.0)
    } else {
        let (x, y) = (eigenvalues[0] - ss, cs);
        let norm = x.hypot(y);
        (x / norm, y / norm)
    };
    let vectors = [(theta_c, theta_s), (-theta_s, theta_c)];

    let (mut a, mut b) = (0.0, 0.0);
    for (lambda, (vx, vy)) in eigenvalues.iter().zip(vectors) {
        if *lambda > tolerance {
            let weight = (vx * cy + vy * sy) / lambda;
            a += weight * vx;
            b += weight * vy;
        }
    }
    (a, b)
}

/// Reconstructs future heights from a [`HarmonicFit`].
///
/// Pure: the same fit and parameters always give bit-identical points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HarmonicForecaster {
    pub horizon_hours: f64,
    pub step_minutes: f64,
}

impl Default for HarmonicForecaster {
    fn default() -> Self {
        HarmonicForecaster::from_config(&HarmonicConfig::default())
    }
}

impl HarmonicForecaster {
    pub fn new(horizon_hours: f64, step_minutes: f64) -> Self {
        HarmonicForecaster {
            horizon_hours,
            step_minutes,
        }
    }

    pub fn from_config(config: &HarmonicConfig) -> Self {
        HarmonicForecaster::new(config.horizon_hours, config.step_minutes)
    }

    /// Number of points produced: ⌈horizon·60 / step⌉.
    pub fn steps(&self) -> usize {
        (self.horizon_hours * 60.0 / self.step_minutes).ceil() as usize
    }

    /// Forecast from the last observed timestamp of the fit.
    ///
    /// Point `k` (1-based) sits at `last_observed + k·step`.
    pub fn forecast(&self, fit: &HarmonicFit) -> Result<Vec<ForecastPoint>> {
        if !self.horizon_hours.is_finite() || self.horizon_hours <= 0.0 {
            return Err(AnalysisError::invalid(
                "horizon_hours",
                format!("must be positive, got {}", self.horizon_hours),
            ));
        }
        let step = step_duration(self.step_minutes)?;
        let steps = self.steps();
        // The furthest point bounds every earlier one
        grid_point(fit.last_observed, step, steps, "horizon_hours")?;

        (1..=steps)
            .map(|k| {
                let timestamp = grid_point(fit.last_observed, step, k, "horizon_hours")?;
                Ok(ForecastPoint {
                    timestamp,
                    predicted_height: fit.evaluate_at(timestamp),
                    method: ForecastMethod::Harmonic,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sample;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn hourly(n: usize, f: impl Fn(f64) -> f64) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::new(start() + Duration::hours(i as i64), f(i as f64)))
            .collect()
    }

    fn m2(t: f64) -> f64 {
        (TAU * t / 12.4206).cos()
    }

    #[test]
    fn periods_are_fixed_constants() {
        assert_eq!(ConstituentKind::M2.period_hours(), 12.4206);
        assert_eq!(ConstituentKind::S2.period_hours(), 12.0);
        assert_eq!(ConstituentKind::N2.period_hours(), 12.6583);
        assert_eq!(ConstituentKind::K1.period_hours(), 23.9345);
        assert_eq!(ConstituentKind::O1.period_hours(), 25.8193);
        assert_eq!(ConstituentKind::P1.period_hours(), 24.0659);
        assert_eq!(ConstituentKind::K1.to_string(), "K1");
    }

    #[test]
    fn phase_normalisation_range() {
        assert_abs_diff_eq!(normalize_phase(-PI), PI);
        assert_abs_diff_eq!(normalize_phase(PI), PI);
        assert_abs_diff_eq!(normalize_phase(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_phase(0.25), 0.25);
    }

    #[test]
    fn forty_eight_hour_m2_scenario() {
        let series = hourly(48, |t| 1.5 + m2(t));
        let fit = HarmonicDecomposer::default().decompose(&series).unwrap();

        let m2_fit = fit.constituent(ConstituentKind::M2).unwrap();
        assert_abs_diff_eq!(m2_fit.amplitude, 1.0, epsilon = 0.05);
        assert_abs_diff_eq!(m2_fit.phase, 0.0, epsilon = 0.05);
        assert_abs_diff_eq!(fit.mean_height, 1.5, epsilon = 0.05);
        assert_eq!(fit.constituents.len(), 6);
        assert!(fit.constituents.iter().all(|c| c.amplitude >= 0.0));
        assert!(fit.constituents.iter().all(|c| c.phase > -PI && c.phase <= PI));
    }

    #[test]
    fn pure_m2_record_leaves_other_constituents_near_zero() {
        // 661 h puts N2 a whole cycle away from M2
        let series = hourly(661, m2);
        let fit = HarmonicDecomposer::default().decompose(&series).unwrap();

        let m2_fit = fit.constituent(ConstituentKind::M2).unwrap();
        assert!((m2_fit.amplitude - 1.0).abs() <= 0.05);
        for c in fit.constituents.iter().filter(|c| c.kind != ConstituentKind::M2) {
            assert!(c.amplitude < 0.1, "{} leaked amplitude {}", c.kind, c.amplitude);
        }
    }

    #[test]
    fn phase_round_trips_through_forecast() {
        let truth = Constituent::new(ConstituentKind::K1, 0.8, 1.1);
        let series = hourly(400, |t| 2.0 + truth.evaluate(t));
        let decomposer =
            HarmonicDecomposer::new(vec![ConstituentKind::K1], FitStrategy::Independent);
        let fit = decomposer.decompose(&series).unwrap();

        let k1 = fit.constituent(ConstituentKind::K1).unwrap();
        assert_abs_diff_eq!(k1.amplitude, 0.8, epsilon = 0.02);
        assert_abs_diff_eq!(k1.phase, 1.1, epsilon = 0.02);
    }

    #[test]
    fn joint_fit_recovers_exact_signal() {
        let series = hourly(48, |t| 1.5 + m2(t));
        let decomposer = HarmonicDecomposer::new(ConstituentKind::ALL.to_vec(), FitStrategy::Joint);
        let fit = decomposer.decompose(&series).unwrap();

        assert_abs_diff_eq!(fit.mean_height, 1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(
            fit.constituent(ConstituentKind::M2).unwrap().amplitude,
            1.0,
            epsilon = 1e-6
        );
        for c in fit.constituents.iter().filter(|c| c.kind != ConstituentKind::M2) {
            assert!(c.amplitude < 1e-6);
        }

        let points = HarmonicForecaster::new(1.0, 15.0).forecast(&fit).unwrap();
        let t = hours_since(fit.origin, points[0].timestamp);
        assert_abs_diff_eq!(t, 47.25, epsilon = 1e-12);
        assert_abs_diff_eq!(points[0].predicted_height, 1.5 + m2(t), epsilon = 1e-6);
    }

    #[test]
    fn forecaster_reproduces_formula_from_exact_constituents() {
        let origin = start();
        let fit = HarmonicFit {
            constituents: vec![Constituent::new(ConstituentKind::M2, 1.0, 0.0)],
            mean_height: 1.5,
            origin,
            last_observed: origin + Duration::hours(48),
            strategy: FitStrategy::Independent,
        };
        let points = HarmonicForecaster::default().forecast(&fit).unwrap();
        assert_eq!(points.len(), 288);
        assert_eq!(points[0].timestamp, origin + Duration::minutes(48 * 60 + 15));
        assert_abs_diff_eq!(points[0].predicted_height, 1.5 + m2(48.25), epsilon = 1e-6);
        assert!(points.iter().all(|p| p.method == ForecastMethod::Harmonic));
        for pair in points.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::minutes(15));
        }
    }

    #[test]
    fn forecast_is_bit_identical_on_repeat() {
        let series = hourly(96, |t| 1.0 + 0.7 * m2(t) + 0.2 * (TAU * t / 23.9345).sin());
        let fit = HarmonicDecomposer::default().decompose(&series).unwrap();
        let forecaster = HarmonicForecaster::new(24.0, 10.0);
        let a = forecaster.forecast(&fit).unwrap();
        let b = forecaster.forecast(&fit).unwrap();
        assert_eq!(a.len(), 144);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.timestamp, y.timestamp);
            assert_eq!(x.predicted_height.to_bits(), y.predicted_height.to_bits());
        }
    }

    #[test]
    fn partial_horizon_rounds_steps_up() {
        let forecaster = HarmonicForecaster::new(1.1, 15.0);
        assert_eq!(forecaster.steps(), 5);
    }

    #[test]
    fn irregular_spacing_uses_real_time() {
        let offsets = [0i64, 1, 2, 4, 5, 8, 9, 13, 14, 15, 20, 22, 25, 27, 30, 31, 33, 36, 40, 41];
        let series: Vec<Sample> = offsets
            .iter()
            .map(|&h| Sample::new(start() + Duration::hours(h), 0.5 + m2(h as f64)))
            .collect();
        let decomposer = HarmonicDecomposer::new(vec![ConstituentKind::M2], FitStrategy::Joint);
        let fit = decomposer.decompose(&series).unwrap();
        let m2 = fit.constituent(ConstituentKind::M2).unwrap();
        assert_abs_diff_eq!(m2.amplitude, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.mean_height, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn aliased_sampling_does_not_blow_up() {
        // Every 12 h the S2 sine column is identically zero
        let series: Vec<Sample> = (0..10)
            .map(|i| Sample::new(start() + Duration::hours(12 * i), 1.0 + (i % 2) as f64))
            .collect();
        let decomposer =
            HarmonicDecomposer::new(vec![ConstituentKind::S2], FitStrategy::Independent);
        let fit = decomposer.decompose(&series).unwrap();
        let s2 = fit.constituent(ConstituentKind::S2).unwrap();
        assert!(s2.amplitude.is_finite());
        assert!(s2.phase.is_finite());
    }

    #[test]
    fn joint_fit_rejects_aliased_design() {
        // Sampled every 12 h the S2 sine column vanishes
        let series: Vec<Sample> = (0..10)
            .map(|i| Sample::new(start() + Duration::hours(12 * i), 1.0 + (i % 2) as f64))
            .collect();
        let decomposer = HarmonicDecomposer::new(vec![ConstituentKind::S2], FitStrategy::Joint);
        assert!(matches!(
            decomposer.decompose(&series),
            Err(AnalysisError::RankDeficient { columns: 3, .. })
        ));
    }

    #[test]
    fn rejects_short_series() {
        let err = HarmonicDecomposer::default().decompose(&hourly(11, m2)).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData { required: 12, available: 11, .. }
        ));

        // 20 samples but only 19 hours: shorter than O1
        let err = HarmonicDecomposer::default().decompose(&hourly(20, m2)).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientSpan { .. }));
        assert!(err.is_insufficient_data());

        // The same record is long enough for M2 alone
        let m2_only = HarmonicDecomposer::new(vec![ConstituentKind::M2], FitStrategy::Independent);
        assert!(m2_only.decompose(&hourly(20, m2)).is_ok());
    }

    #[test]
    fn rejects_bad_constituent_lists() {
        let empty = HarmonicDecomposer::new(vec![], FitStrategy::Independent);
        assert!(matches!(
            empty.decompose(&hourly(48, m2)),
            Err(AnalysisError::InvalidParameter { .. })
        ));
        let duplicated = HarmonicDecomposer::new(
            vec![ConstituentKind::M2, ConstituentKind::M2],
            FitStrategy::Independent,
        );
        assert!(matches!(
            duplicated.decompose(&hourly(48, m2)),
            Err(AnalysisError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn rejects_bad_forecast_parameters() {
        let fit = HarmonicDecomposer::default().decompose(&hourly(48, m2)).unwrap();
        assert!(HarmonicForecaster::new(0.0, 15.0).forecast(&fit).is_err());
        assert!(HarmonicForecaster::new(24.0, -1.0).forecast(&fit).is_err());
        assert!(HarmonicForecaster::new(24.0, f64::NAN).forecast(&fit).is_err());
    }

    /// Horizons past chrono's calendar range are rejected, not panicked on.
    #[test]
    fn rejects_horizon_beyond_calendar() {
        let fit = HarmonicDecomposer::default().decompose(&hourly(48, m2)).unwrap();

        // Two steps of ~190,000 years
        let err = HarmonicForecaster::new(2e11 / 60.0, 1e11).forecast(&fit).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidParameter { name: "horizon_hours", .. }
        ));

        // A step longer than any chrono duration
        let err = HarmonicForecaster::new(1e20, 1e20).forecast(&fit).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidParameter { name: "step_minutes", .. }
        ));

        // More points than fit in an i32 step counter
        let err = HarmonicForecaster::new(1e9, 0.01).forecast(&fit).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidParameter { name: "horizon_hours", .. }
        ));
    }
}
