//! # Synthetic Tide Series
//!
//! Deterministic series generators for the CLI demo and for tests. Nothing
//! here reads real observations.
//!
//! ## Equilibrium Tide
//! [`equilibrium`] sums two constituents with Portland, ME amplitudes:
//! - **M2** (12.42 h): 1.37 m, phase tied to the clock plus the lunitidal interval
//! - **S2** (12.00 h): 0.21 m, phase advanced by twice the moon's phase angle
//!
//! S2 beats against M2 over the synodic month, so ranges peak around new and
//! full moon (spring tides) and shrink at the quarters (neap tides).

use crate::harmonic::{Constituent, ConstituentKind};
use crate::lunar::LunarState;
use crate::{grid_point, hours_since, step_duration, Result, Sample};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

/// Portland M2 amplitude (4.51 ft)
const A_M2: f64 = 1.375;
/// Portland S2 amplitude (0.68 ft)
const A_S2: f64 = 0.207;
/// Moon transit to local high water, about 3 h 35 min
const LUNITIDAL_OFFSET_HRS: f64 = 3.59;
/// Mean level above chart datum (5 ft)
const MEAN_LEVEL: f64 = 1.524;

/// `count` samples of `mean + Σ constituents` starting at `start`.
pub fn from_constituents(
    start: DateTime<Utc>,
    count: usize,
    step_minutes: f64,
    mean: f64,
    constituents: &[Constituent],
) -> Result<Vec<Sample>> {
    let step = step_duration(step_minutes)?;
    if count > 0 {
        grid_point(start, step, count - 1, "count")?;
    }
    (0..count)
        .map(|k| {
            let timestamp = grid_point(start, step, k, "count")?;
            let t = hours_since(start, timestamp);
            let height = mean + constituents.iter().map(|c| c.evaluate(t)).sum::<f64>();
            Ok(Sample::new(timestamp, height))
        })
        .collect()
}

/// Two-constituent equilibrium tide with a spring/neap envelope.
pub fn equilibrium(start: DateTime<Utc>, count: usize, step_minutes: f64) -> Result<Vec<Sample>> {
    let moon = LunarState::at(start);

    // Real-time phase of M2 at `start`
    let period_secs = ConstituentKind::M2.period_hours() * 3600.0;
    let clock = (start.timestamp() as f64 + LUNITIDAL_OFFSET_HRS * 3600.0).rem_euclid(period_secs);
    let m2_phase = clock / period_secs * TAU;
    let s2_phase = m2_phase + 2.0 * moon.phase_fraction * TAU;

    from_constituents(
        start,
        count,
        step_minutes,
        MEAN_LEVEL,
        &[
            Constituent::new(ConstituentKind::M2, A_M2, m2_phase),
            Constituent::new(ConstituentKind::S2, A_S2, s2_phase),
        ],
    )
}

/// Add uniform noise in `[-amplitude, amplitude]` from a seeded RNG.
pub fn add_noise(samples: &mut [Sample], amplitude: f64, seed: u64) {
    if amplitude <= 0.0 {
        return;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    for s in samples {
        s.height += rng.random_range(-amplitude..=amplitude);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AnalysisError;
    use chrono::{Duration, TimeZone};

    #[test]
    fn grid_and_values() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let m2 = Constituent::new(ConstituentKind::M2, 1.0, 0.0);
        let series = from_constituents(start, 5, 30.0, 2.0, &[m2]).unwrap();

        assert_eq!(series.len(), 5);
        assert_eq!(series[0].height, 3.0);
        assert_eq!(series[4].timestamp, start + Duration::hours(2));
        assert!((series[2].height - (2.0 + m2.evaluate(1.0))).abs() < 1e-15);
    }

    #[test]
    fn equilibrium_is_deterministic_and_bounded() {
        let start = Utc.with_ymd_and_hms(2025, 7, 24, 0, 0, 0).unwrap();
        let a = equilibrium(start, 96, 15.0).unwrap();
        let b = equilibrium(start, 96, 15.0).unwrap();
        assert_eq!(a, b);
        for s in &a {
            assert!((s.height - MEAN_LEVEL).abs() <= A_M2 + A_S2 + 1e-12);
        }
        // A full day always spans at least one neap range
        let hi = a.iter().map(|s| s.height).fold(f64::MIN, f64::max);
        let lo = a.iter().map(|s| s.height).fold(f64::MAX, f64::min);
        assert!(hi - lo > 2.0 * (A_M2 - A_S2) - 0.05);
    }

    #[test]
    fn spring_range_exceeds_neap_range() {
        let range = |start: DateTime<Utc>| {
            let series = equilibrium(start, 25 * 4, 15.0).unwrap();
            let hi = series.iter().map(|s| s.height).fold(f64::MIN, f64::max);
            let lo = series.iter().map(|s| s.height).fold(f64::MAX, f64::min);
            hi - lo
        };
        // Full moon 2024-01-25, first quarter 2024-01-18
        let spring = range(Utc.with_ymd_and_hms(2024, 1, 25, 18, 0, 0).unwrap());
        let neap = range(Utc.with_ymd_and_hms(2024, 1, 18, 4, 0, 0).unwrap());
        assert!(spring > neap + 0.5, "spring {spring} neap {neap}");
    }

    #[test]
    fn noise_is_seeded_and_bounded() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clean = from_constituents(start, 50, 60.0, 1.0, &[]).unwrap();
        let mut a = clean.clone();
        let mut b = clean.clone();
        add_noise(&mut a, 0.1, 5);
        add_noise(&mut b, 0.1, 5);
        assert_eq!(a, b);
        assert!(a.iter().all(|s| (s.height - 1.0).abs() <= 0.1));
        assert!(a.iter().any(|s| s.height != 1.0));
    }

    #[test]
    fn rejects_bad_step() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(from_constituents(start, 3, 0.0, 0.0, &[]).is_err());
        assert!(equilibrium(start, 3, f64::NAN).is_err());
    }

    #[test]
    fn rejects_grid_beyond_calendar() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            from_constituents(start, 3, 1e11, 0.0, &[]),
            Err(AnalysisError::InvalidParameter { name: "count", .. })
        ));
        assert!(matches!(
            equilibrium(start, 2, 1e20),
            Err(AnalysisError::InvalidParameter { name: "step_minutes", .. })
        ));
        assert!(from_constituents(start, 0, 60.0, 0.0, &[]).unwrap().is_empty());
    }
}
