use crate::error::MissionError;
use crate::geo::{distance_meters, interpolate, GeoPoint};
use serde::Serialize;

pub const SCAN_LINE_LABEL: &str = "Scan line";

/// Upper bound on generated waypoints, so a tiny spacing over a large area is
/// rejected instead of producing an unflyable sequence.
pub const MAX_WAYPOINTS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waypoint {
    pub label: String,
    pub point: GeoPoint,
}

/// Survey area given by its two opposite corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rectangle {
    southwest: GeoPoint,
    southeast: GeoPoint,
    northeast: GeoPoint,
    northwest: GeoPoint,
}

impl Rectangle {
    /// Builds the four corners from the northwest and southeast corners.
    ///
    /// Inverted corners would produce a mirrored pattern, so they are
    /// rejected. A zero-width or zero-height area is accepted.
    pub fn from_corners(northwest: GeoPoint, southeast: GeoPoint) -> Result<Self, MissionError> {
        if northwest.latitude_deg() < southeast.latitude_deg() {
            return Err(MissionError::InvalidConfig(format!(
                "northwest corner ({northwest}) is south of southeast corner ({southeast})"
            )));
        }
        if southeast.longitude_deg() < northwest.longitude_deg() {
            return Err(MissionError::InvalidConfig(format!(
                "southeast corner ({southeast}) is west of northwest corner ({northwest})"
            )));
        }
        Ok(Self::from_corners_unchecked(northwest, southeast))
    }

    fn from_corners_unchecked(northwest: GeoPoint, southeast: GeoPoint) -> Self {
        // Both inputs are valid points, so their coordinate combinations are too.
        let corner = |lat: f64, lon: f64| GeoPoint::new(lat, lon).unwrap_or(northwest);
        Self {
            southwest: corner(southeast.latitude_deg(), northwest.longitude_deg()),
            southeast,
            northeast: corner(northwest.latitude_deg(), southeast.longitude_deg()),
            northwest,
        }
    }

    pub fn southwest(&self) -> GeoPoint {
        self.southwest
    }

    pub fn southeast(&self) -> GeoPoint {
        self.southeast
    }

    pub fn northeast(&self) -> GeoPoint {
        self.northeast
    }

    pub fn northwest(&self) -> GeoPoint {
        self.northwest
    }

    /// East-west extent along the southern edge.
    pub fn width_m(&self) -> f64 {
        distance_meters(self.southwest, self.southeast)
    }
}

/// Ordered boustrophedon waypoint sequence over a [`Rectangle`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoveragePattern {
    steps: usize,
    waypoints: Vec<Waypoint>,
}

impl CoveragePattern {
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Waypoint> {
        self.waypoints.iter()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Number of north-south scan lines (`steps + 1`).
    pub fn line_count(&self) -> usize {
        self.steps + 1
    }

    /// Sum of the leg lengths between consecutive waypoints.
    pub fn path_length_m(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|pair| distance_meters(pair[0].point, pair[1].point))
            .sum()
    }
}

impl<'a> IntoIterator for &'a CoveragePattern {
    type Item = &'a Waypoint;
    type IntoIter = std::slice::Iter<'a, Waypoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.waypoints.iter()
    }
}

/// Number of waypoints [`generate_pattern`] would produce, without building
/// them. Fails for non-positive spacing or more than [`MAX_WAYPOINTS`].
pub fn waypoint_count(rect: &Rectangle, spacing_m: f64) -> Result<usize, MissionError> {
    Ok(2 * (scan_steps(rect, spacing_m)? + 1))
}

fn scan_steps(rect: &Rectangle, spacing_m: f64) -> Result<usize, MissionError> {
    if !spacing_m.is_finite() || spacing_m <= 0.0 {
        return Err(MissionError::InvalidConfig(format!(
            "line spacing must be positive, got {spacing_m}"
        )));
    }

    let lines = (rect.width_m() / spacing_m).ceil();
    if lines * 2.0 + 2.0 > MAX_WAYPOINTS as f64 {
        return Err(MissionError::InvalidConfig(format!(
            "line spacing {spacing_m} m yields more than {MAX_WAYPOINTS} waypoints"
        )));
    }
    Ok((lines as usize).max(1))
}

/// Generates the lawnmower pattern: scan lines run north-south, spaced
/// `spacing_m` apart along the southern edge, alternating direction so the
/// vehicle never doubles back. Even lines fly north to south, odd lines
/// south to north.
pub fn generate_pattern(
    rect: &Rectangle,
    spacing_m: f64,
) -> Result<CoveragePattern, MissionError> {
    let steps = scan_steps(rect, spacing_m)?;

    let mut waypoints = Vec::with_capacity(2 * (steps + 1));
    for k in 0..=steps {
        let t = (k as f64 / steps as f64).min(1.0);
        let south = interpolate(rect.southwest, rect.southeast, t);
        let north = interpolate(rect.northwest, rect.northeast, t);
        let (first, second) = if k % 2 == 0 {
            (north, south)
        } else {
            (south, north)
        };
        for point in [first, second] {
            waypoints.push(Waypoint {
                label: SCAN_LINE_LABEL.to_string(),
                point,
            });
        }
    }

    Ok(CoveragePattern { steps, waypoints })
}
