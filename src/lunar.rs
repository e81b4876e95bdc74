//! Moon phase from a low-precision lunar ephemeris (Schaefer 1985/1994)
//!
//! Accuracy: about ±1 day on the phase, which is plenty for spring/neap
//! context features. References: Sky & Telescope BASIC "MOONFX.BAS"
//! (Apr 1994) and the original phase routine (Mar 1985).

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Mean synodic month in days
pub const SYNODIC_MONTH_DAYS: f64 = 29.530_588_2;

/// Days from the JD origin of the March-based calendar to the 1900 reference new moon
const EPOCH_OFFSET_DAYS: f64 = 694_039.09;

/// Eight-way phase naming, starting at new moon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoonPhase {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl MoonPhase {
    const ORDER: [MoonPhase; 8] = [
        MoonPhase::NewMoon,
        MoonPhase::WaxingCrescent,
        MoonPhase::FirstQuarter,
        MoonPhase::WaxingGibbous,
        MoonPhase::FullMoon,
        MoonPhase::WaningGibbous,
        MoonPhase::LastQuarter,
        MoonPhase::WaningCrescent,
    ];

    /// Phase for a fraction of the synodic month (0 = new, 0.5 = full).
    pub fn from_fraction(fraction: f64) -> Self {
        let index = ((fraction * 8.0) + 0.5).floor() as usize & 7;
        Self::ORDER[index]
    }

    pub fn name(self) -> &'static str {
        match self {
            MoonPhase::NewMoon => "New Moon",
            MoonPhase::WaxingCrescent => "Waxing Crescent",
            MoonPhase::FirstQuarter => "First Quarter",
            MoonPhase::WaxingGibbous => "Waxing Gibbous",
            MoonPhase::FullMoon => "Full Moon",
            MoonPhase::WaningGibbous => "Waning Gibbous",
            MoonPhase::LastQuarter => "Last Quarter",
            MoonPhase::WaningCrescent => "Waning Crescent",
        }
    }
}

/// Lunar state at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LunarState {
    /// Fraction of the synodic month elapsed since new moon, in [0, 1)
    pub phase_fraction: f64,
    /// Age of the Moon in days since new
    pub age_days: f64,
    /// Illuminated fraction of the disc, 0 at new and 1 at full
    pub illumination: f64,
    pub phase: MoonPhase,
}

impl LunarState {
    /// Compute the lunar state for a UTC instant.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        let day = timestamp.day() as f64
            + (timestamp.hour() as f64
                + timestamp.minute() as f64 / 60.0
                + timestamp.second() as f64 / 3600.0)
                / 24.0;

        // Jan/Feb count as months 13/14 of the previous year; shift so Mar = 4
        let (mut y, mut m) = (timestamp.year(), timestamp.month() as i32);
        if m < 3 {
            y -= 1;
            m += 12;
        }
        m += 1;

        let days =
            (365.25 * y as f64).floor() + (30.6 * m as f64).floor() + day - EPOCH_OFFSET_DAYS;
        let cycles = days / SYNODIC_MONTH_DAYS;
        let phase_fraction = cycles - cycles.floor();

        LunarState {
            phase_fraction,
            age_days: phase_fraction * SYNODIC_MONTH_DAYS,
            illumination: (1.0 - (TAU * phase_fraction).cos()) / 2.0,
            phase: MoonPhase::from_fraction(phase_fraction),
        }
    }

    /// Within a tenth of a cycle of new or full moon: the sun and moon pull
    /// in line and the tidal range peaks.
    pub fn is_spring_tide(&self) -> bool {
        let f = self.phase_fraction;
        f < 0.1 || f > 0.9 || (f > 0.4 && f < 0.6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn known_new_and_full_moons() {
        // New moon 2024-01-11 11:57 UTC
        let new = LunarState::at(Utc.with_ymd_and_hms(2024, 1, 11, 12, 0, 0).unwrap());
        let distance = new.phase_fraction.min(1.0 - new.phase_fraction);
        assert!(distance < 0.05, "phase {}", new.phase_fraction);
        assert_eq!(new.phase, MoonPhase::NewMoon);
        assert!(new.illumination < 0.05);
        assert!(new.is_spring_tide());

        // Full moon 2024-01-25 17:54 UTC
        let full = LunarState::at(Utc.with_ymd_and_hms(2024, 1, 25, 18, 0, 0).unwrap());
        assert!((full.phase_fraction - 0.5).abs() < 0.05);
        assert_eq!(full.phase, MoonPhase::FullMoon);
        assert!(full.illumination > 0.95);
        assert!(full.is_spring_tide());
    }

    #[test]
    fn quarter_moon_is_neap() {
        // First quarter 2024-01-18 03:53 UTC
        let quarter = LunarState::at(Utc.with_ymd_and_hms(2024, 1, 18, 4, 0, 0).unwrap());
        assert_eq!(quarter.phase, MoonPhase::FirstQuarter);
        assert!(!quarter.is_spring_tide());
    }

    #[test]
    fn age_tracks_fraction() {
        let state = LunarState::at(Utc.with_ymd_and_hms(2025, 7, 24, 0, 0, 0).unwrap());
        assert!((0.0..1.0).contains(&state.phase_fraction));
        assert!((state.age_days - state.phase_fraction * SYNODIC_MONTH_DAYS).abs() < 1e-12);
    }

    #[test]
    fn phase_names_wrap_around() {
        assert_eq!(MoonPhase::from_fraction(0.97), MoonPhase::NewMoon);
        assert_eq!(MoonPhase::from_fraction(0.26), MoonPhase::FirstQuarter);
        assert_eq!(MoonPhase::from_fraction(0.75), MoonPhase::LastQuarter);
        assert_eq!(MoonPhase::WaningGibbous.name(), "Waning Gibbous");
    }
}
