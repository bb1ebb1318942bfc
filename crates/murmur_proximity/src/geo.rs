//! Geographic primitives and the great-circle distance metric.

use crate::error::ProximityError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Radius of the sphere used for all distance computations, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Opaque client identifier.
///
/// Either supplied by the client in an event or assigned by the transport
/// from the connection identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A point on the globe in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    /// Creates a position without range checks.
    ///
    /// Use [`Position::try_new`] for values that come off the wire.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Creates a position, rejecting non-finite values and values outside
    /// latitude [-90, 90] / longitude [-180, 180].
    pub fn try_new(lat: f64, lon: f64) -> Result<Self, ProximityError> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if valid {
            Ok(Self { lat, lon })
        } else {
            Err(ProximityError::InvalidPosition { lat, lon })
        }
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance(&self, other: Position) -> f64 {
        distance(*self, other)
    }

    /// Projects onto a sphere of [`EARTH_RADIUS_M`] centered at the origin.
    ///
    /// Returns `[x, y, z]` in meters with z pointing at the north pole.
    pub fn to_cartesian(&self) -> [f64; 3] {
        let lat = self.lat.to_radians();
        let lon = self.lon.to_radians();
        [
            EARTH_RADIUS_M * lat.cos() * lon.cos(),
            EARTH_RADIUS_M * lat.cos() * lon.sin(),
            EARTH_RADIUS_M * lat.sin(),
        ]
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Haversine distance between two positions in meters.
///
/// The square-root argument is clamped to [0, 1] so rounding at coincident or
/// antipodal points never pushes `asin` out of its domain.
pub fn distance(p1: Position, p2: Position) -> f64 {
    let lat1 = p1.lat.to_radians();
    let lat2 = p2.lat.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (p2.lon - p1.lon).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.clamp(0.0, 1.0).sqrt().asin()
}

/// Straight-line (chord) length through the sphere for a surface distance.
///
/// Monotonic in `meters`, so a Euclidean ball of this radius around a
/// projected point contains exactly the points within `meters` on the surface.
pub fn chord_length(meters: f64) -> f64 {
    let half_angle = (meters / (2.0 * EARTH_RADIUS_M)).min(std::f64::consts::FRAC_PI_2);
    2.0 * EARTH_RADIUS_M * half_angle.sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        for &(lat, lon) in &[(0.0, 0.0), (89.9, 179.9), (-45.5, -120.25), (90.0, 0.0)] {
            let p = Position::new(lat, lon);
            assert_eq!(distance(p, p), 0.0);
        }
    }

    #[test]
    fn test_distance_symmetry() {
        let a = Position::new(51.5074, -0.1278);
        let b = Position::new(40.7128, -74.0060);
        assert_eq!(distance(a, b), distance(b, a));
    }

    #[test]
    fn test_known_distances() {
        let origin = Position::new(0.0, 0.0);

        let near = distance(origin, Position::new(0.0, 0.001));
        assert!((near - 111.19).abs() < 0.1, "got {near}");

        let quarter = distance(origin, Position::new(0.0, 90.0));
        assert!((quarter - 10_007_543.0).abs() < 1.0, "got {quarter}");
    }

    #[test]
    fn test_antipodal_points_do_not_produce_nan() {
        let d = distance(Position::new(0.0, 0.0), Position::new(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0);

        let poles = distance(Position::new(90.0, 0.0), Position::new(-90.0, 0.0));
        assert!(poles.is_finite());
    }

    #[test]
    fn test_try_new_rejects_out_of_range() {
        assert!(Position::try_new(90.0, 180.0).is_ok());
        assert!(Position::try_new(90.1, 0.0).is_err());
        assert!(Position::try_new(0.0, -180.5).is_err());
        assert!(Position::try_new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_chord_matches_projection() {
        let a = Position::new(10.0, 20.0);
        let b = Position::new(10.5, 20.5);
        let [ax, ay, az] = a.to_cartesian();
        let [bx, by, bz] = b.to_cartesian();
        let euclid = ((ax - bx).powi(2) + (ay - by).powi(2) + (az - bz).powi(2)).sqrt();
        assert!((chord_length(distance(a, b)) - euclid).abs() < 1e-3);
    }
}
