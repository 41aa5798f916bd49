//! Great-circle helpers on latitude/longitude pairs.

use crate::error::MissionError;
use serde::Serialize;
use std::fmt;

/// Mean Earth radius used by the haversine distance.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in degrees.
///
/// Always within `[-90, 90]` x `[-180, 180]`; construct through [`GeoPoint::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    latitude_deg: f64,
    longitude_deg: f64,
}

impl GeoPoint {
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Result<Self, MissionError> {
        if !latitude_deg.is_finite() || !(-90.0..=90.0).contains(&latitude_deg) {
            return Err(MissionError::InvalidConfig(format!(
                "latitude {latitude_deg} is outside [-90, 90]"
            )));
        }
        if !longitude_deg.is_finite() || !(-180.0..=180.0).contains(&longitude_deg) {
            return Err(MissionError::InvalidConfig(format!(
                "longitude {longitude_deg} is outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude_deg,
            longitude_deg,
        })
    }

    /// Clamps into range instead of rejecting. Only for values derived from
    /// points that were already valid.
    fn clamped(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            latitude_deg: latitude_deg.clamp(-90.0, 90.0),
            longitude_deg: longitude_deg.clamp(-180.0, 180.0),
        }
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude_deg
    }

    pub fn longitude_deg(&self) -> f64 {
        self.longitude_deg
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude_deg, self.longitude_deg)
    }
}

/// Initial great-circle bearing from `from` to `to`, in `[0, 360)` degrees.
/// Coincident points have no defined bearing; 0 is returned.
pub fn bearing_degrees(from: GeoPoint, to: GeoPoint) -> f64 {
    if from == to {
        return 0.0;
    }
    let phi1 = from.latitude_deg.to_radians();
    let phi2 = to.latitude_deg.to_radians();
    let delta_lambda = (to.longitude_deg - from.longitude_deg).to_radians();

    let east = delta_lambda.sin() * phi2.cos();
    let north = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    if east == 0.0 && north == 0.0 {
        return 0.0;
    }

    let bearing = east.atan2(north).to_degrees().rem_euclid(360.0);
    // rem_euclid of a tiny negative rounds up to exactly 360
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Haversine distance in meters.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude_deg.to_radians();
    let phi2 = b.latitude_deg.to_radians();
    let delta_phi = (b.latitude_deg - a.latitude_deg).to_radians();
    let delta_lambda = (b.longitude_deg - a.longitude_deg).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().clamp(-1.0, 1.0).asin()
}

/// Linear interpolation of latitude and longitude independently.
///
/// Only accurate over short spans; scan lines are local.
pub fn interpolate(a: GeoPoint, b: GeoPoint, t: f64) -> GeoPoint {
    let t = t.clamp(0.0, 1.0);
    GeoPoint::clamped(
        a.latitude_deg + t * (b.latitude_deg - a.latitude_deg),
        a.longitude_deg + t * (b.longitude_deg - a.longitude_deg),
    )
}
