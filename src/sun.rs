//! Day/night determination from sun position
//!
//! No charging surplus can exist without production, so the control loop
//! gates charger interaction on whether the sun is up at the configured
//! coordinates. The computation is the standard NOAA solar-position
//! approximation, good to a fraction of a degree, which is far more than
//! the gating needs.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Clock/astronomy collaborator seam
pub trait DayNightOracle: Send {
    /// Whether the sun is below the horizon at the given place and time
    fn is_night(&self, now: DateTime<Utc>, latitude: f64, longitude: f64) -> bool;
}

/// Sun-position based day/night oracle
#[derive(Debug, Clone, Copy, Default)]
pub struct SolarCalculator;

impl SolarCalculator {
    /// Apparent solar elevation in degrees at `now` for the given
    /// coordinates (latitude north positive, longitude east positive).
    pub fn solar_elevation_deg(now: DateTime<Utc>, latitude: f64, longitude: f64) -> f64 {
        let day_of_year = now.ordinal() as f64;
        let hour_utc = now.hour() as f64
            + now.minute() as f64 / 60.0
            + now.second() as f64 / 3600.0;

        // Fractional year in radians
        let gamma =
            2.0 * std::f64::consts::PI / 365.0 * (day_of_year - 1.0 + (hour_utc - 12.0) / 24.0);

        // Equation of time in minutes
        let eqtime = 229.18
            * (0.000075 + 0.001868 * gamma.cos()
                - 0.032077 * gamma.sin()
                - 0.014615 * (2.0 * gamma).cos()
                - 0.040849 * (2.0 * gamma).sin());

        // Solar declination in radians
        let decl = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
            - 0.006758 * (2.0 * gamma).cos()
            + 0.000907 * (2.0 * gamma).sin()
            - 0.002697 * (3.0 * gamma).cos()
            + 0.00148 * (3.0 * gamma).sin();

        // True solar time in minutes; longitude east positive, 4 minutes
        // per degree
        let time_offset = eqtime + 4.0 * longitude;
        let true_solar_minutes = hour_utc * 60.0 + time_offset;

        // Hour angle in radians, zero at solar noon
        let hour_angle = (true_solar_minutes / 4.0 - 180.0).to_radians();

        let lat = latitude.to_radians();
        let cos_zenith =
            lat.sin() * decl.sin() + lat.cos() * decl.cos() * hour_angle.cos();
        let zenith = cos_zenith.clamp(-1.0, 1.0).acos();

        90.0 - zenith.to_degrees()
    }
}

impl DayNightOracle for SolarCalculator {
    fn is_night(&self, now: DateTime<Utc>, latitude: f64, longitude: f64) -> bool {
        Self::solar_elevation_deg(now, latitude, longitude) < 0.0
    }
}
