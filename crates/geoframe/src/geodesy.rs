//! Coordinate conversion utilities.
//!
//! Provides conversions between ECEF (Earth-Centered, Earth-Fixed) coordinates
//! and geographic coordinates (latitude, longitude, altitude) on the WGS84
//! ellipsoid, plus great-circle distance and bearing on a spherical Earth.
//!
//! All arithmetic here is `f64`. Narrowing to `f32` happens only when a point
//! is expressed relative to a [`CoordinateFrame`](crate::CoordinateFrame).

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// WGS84 semi-major (equatorial) axis in meters.
pub const WGS84_SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_FLATTENING: f64 = 1.0 / 298.257_223_563;
/// WGS84 semi-minor (polar) axis in meters.
pub const WGS84_SEMI_MINOR_AXIS: f64 = WGS84_SEMI_MAJOR_AXIS * (1.0 - WGS84_FLATTENING);
/// WGS84 first eccentricity squared.
pub const WGS84_ECCENTRICITY_SQ: f64 = WGS84_FLATTENING * (2.0 - WGS84_FLATTENING);

/// Radius of the sphere used for globe-view environment flattening.
pub const EARTH_RADIUS: f64 = WGS84_SEMI_MAJOR_AXIS;
/// Mean Earth radius for great-circle calculations.
pub const MEAN_EARTH_RADIUS: f64 = 6_371_000.0;

fn validate_latitude(latitude: f64) -> Result<()> {
    if (-90.0..=90.0).contains(&latitude) {
        Ok(())
    } else {
        Err(Error::LatitudeOutOfRange { latitude })
    }
}

fn validate_longitude(longitude: f64) -> Result<()> {
    if (-180.0..=180.0).contains(&longitude) {
        Ok(())
    } else {
        Err(Error::LongitudeOutOfRange { longitude })
    }
}

/// Unvalidated wire form of [`LatLong`].
#[derive(Deserialize)]
struct RawLatLong {
    latitude_degrees: f64,
    longitude_degrees: f64,
}

impl TryFrom<RawLatLong> for LatLong {
    type Error = Error;

    fn try_from(raw: RawLatLong) -> Result<Self> {
        Self::new(raw.latitude_degrees, raw.longitude_degrees)
    }
}

/// Unvalidated wire form of [`GeographicPoint`].
#[derive(Deserialize)]
struct RawGeographicPoint {
    latitude_degrees: f64,
    longitude_degrees: f64,
    altitude_meters: f64,
}

impl TryFrom<RawGeographicPoint> for GeographicPoint {
    type Error = Error;

    fn try_from(raw: RawGeographicPoint) -> Result<Self> {
        Self::new(raw.latitude_degrees, raw.longitude_degrees, raw.altitude_meters)
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLatLong")]
pub struct LatLong {
    latitude_degrees: f64,
    longitude_degrees: f64,
}

impl LatLong {
    /// Create a validated latitude/longitude.
    pub fn new(latitude_degrees: f64, longitude_degrees: f64) -> Result<Self> {
        validate_latitude(latitude_degrees)?;
        validate_longitude(longitude_degrees)?;
        Ok(Self {
            latitude_degrees,
            longitude_degrees,
        })
    }

    #[must_use]
    pub fn latitude_degrees(&self) -> f64 {
        self.latitude_degrees
    }

    #[must_use]
    pub fn longitude_degrees(&self) -> f64 {
        self.longitude_degrees
    }

    /// Clamp latitude and wrap longitude into range.
    ///
    /// For values produced internally (interpolation, dead reckoning); user
    /// input goes through [`LatLong::new`].
    pub(crate) fn wrapped(latitude_degrees: f64, longitude_degrees: f64) -> Self {
        Self {
            latitude_degrees: latitude_degrees.clamp(-90.0, 90.0),
            longitude_degrees: (longitude_degrees + 180.0).rem_euclid(360.0) - 180.0,
        }
    }

    /// Attach an altitude to this latitude/longitude.
    #[must_use]
    pub fn with_altitude(self, altitude_meters: f64) -> GeographicPoint {
        GeographicPoint {
            latitude_degrees: self.latitude_degrees,
            longitude_degrees: self.longitude_degrees,
            altitude_meters,
        }
    }
}

/// A geographic position: latitude and longitude in degrees, altitude in
/// meters above the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeographicPoint")]
pub struct GeographicPoint {
    latitude_degrees: f64,
    longitude_degrees: f64,
    altitude_meters: f64,
}

impl GeographicPoint {
    /// Create a validated geographic point.
    pub fn new(latitude_degrees: f64, longitude_degrees: f64, altitude_meters: f64) -> Result<Self> {
        Ok(LatLong::new(latitude_degrees, longitude_degrees)?.with_altitude(altitude_meters))
    }

    #[must_use]
    pub fn latitude_degrees(&self) -> f64 {
        self.latitude_degrees
    }

    #[must_use]
    pub fn longitude_degrees(&self) -> f64 {
        self.longitude_degrees
    }

    #[must_use]
    pub fn altitude_meters(&self) -> f64 {
        self.altitude_meters
    }

    /// The latitude/longitude part of this point.
    #[must_use]
    pub fn lat_long(&self) -> LatLong {
        LatLong {
            latitude_degrees: self.latitude_degrees,
            longitude_degrees: self.longitude_degrees,
        }
    }

    /// Convert to ECEF coordinates (meters).
    #[must_use]
    pub fn to_ecef(&self) -> DVec3 {
        let lat_rad = self.latitude_degrees.to_radians();
        let lon_rad = self.longitude_degrees.to_radians();
        let (sin_lat, cos_lat) = lat_rad.sin_cos();
        let (sin_lon, cos_lon) = lon_rad.sin_cos();

        // Radius of curvature in the prime vertical.
        let n = WGS84_SEMI_MAJOR_AXIS / (1.0 - WGS84_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
        let h = self.altitude_meters;

        DVec3::new(
            (n + h) * cos_lat * cos_lon,
            (n + h) * cos_lat * sin_lon,
            (n * (1.0 - WGS84_ECCENTRICITY_SQ) + h) * sin_lat,
        )
    }

    /// Convert from ECEF coordinates (meters).
    ///
    /// Iterates the geodetic latitude to convergence; longitude is reported in
    /// `[-180, 180]`. At the poles longitude is reported as zero.
    #[must_use]
    pub fn from_ecef(position: DVec3) -> Self {
        let p = position.x.hypot(position.y);

        if p < 1e-9 {
            let latitude_degrees = if position.z >= 0.0 { 90.0 } else { -90.0 };
            return Self {
                latitude_degrees,
                longitude_degrees: 0.0,
                altitude_meters: position.z.abs() - WGS84_SEMI_MINOR_AXIS,
            };
        }

        let lon_rad = position.y.atan2(position.x);
        let mut lat_rad = position.z.atan2(p * (1.0 - WGS84_ECCENTRICITY_SQ));
        for _ in 0..10 {
            let sin_lat = lat_rad.sin();
            let n = WGS84_SEMI_MAJOR_AXIS / (1.0 - WGS84_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
            let h = altitude_for_latitude(position, p, lat_rad);
            let next = position.z.atan2(p * (1.0 - WGS84_ECCENTRICITY_SQ * n / (n + h)));
            let converged = (next - lat_rad).abs() < 1e-15;
            lat_rad = next;
            if converged {
                break;
            }
        }

        Self {
            latitude_degrees: lat_rad.to_degrees(),
            longitude_degrees: lon_rad.to_degrees(),
            altitude_meters: altitude_for_latitude(position, p, lat_rad),
        }
    }
}

/// Height above the ellipsoid for a point at geodetic latitude `lat_rad`.
///
/// Stable at all latitudes, unlike `p / cos(lat) - N`.
fn altitude_for_latitude(position: DVec3, p: f64, lat_rad: f64) -> f64 {
    let (sin_lat, cos_lat) = lat_rad.sin_cos();
    p * cos_lat + position.z * sin_lat
        - WGS84_SEMI_MAJOR_AXIS * (1.0 - WGS84_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt()
}

/// Unit vector from Earth center through `position`.
///
/// Returns zero for the Earth center itself.
#[must_use]
pub fn surface_up(position: DVec3) -> DVec3 {
    position.normalize_or_zero()
}

/// Great-circle distance in meters between two points (haversine, spherical
/// Earth, altitude ignored).
#[must_use]
pub fn great_circle_distance(a: LatLong, b: LatLong) -> f64 {
    let lat_a = a.latitude_degrees.to_radians();
    let lat_b = b.latitude_degrees.to_radians();
    let d_lat = lat_b - lat_a;
    let d_lon = (b.longitude_degrees - a.longitude_degrees).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS * h.sqrt().min(1.0).asin()
}

/// Initial bearing in degrees `[0, 360)` from `from` towards `to`, clockwise
/// from true north.
#[must_use]
pub fn bearing(from: LatLong, to: LatLong) -> f64 {
    let lat_a = from.latitude_degrees.to_radians();
    let lat_b = to.latitude_degrees.to_radians();
    let d_lon = (to.longitude_degrees - from.longitude_degrees).to_radians();

    let y = d_lon.sin() * lat_b.cos();
    let x = lat_a.cos() * lat_b.sin() - lat_a.sin() * lat_b.cos() * d_lon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// The point `distance` meters from `from` along the initial `bearing_degrees`
/// (spherical Earth).
#[must_use]
pub fn destination(from: LatLong, bearing_degrees: f64, distance: f64) -> LatLong {
    let lat = from.latitude_degrees.to_radians();
    let lon = from.longitude_degrees.to_radians();
    let bearing = bearing_degrees.to_radians();
    let angular = distance / MEAN_EARTH_RADIUS;

    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_ang, cos_ang) = angular.sin_cos();
    let dest_lat = (sin_lat * cos_ang + cos_lat * sin_ang * bearing.cos())
        .clamp(-1.0, 1.0)
        .asin();
    let dest_lon =
        lon + (bearing.sin() * sin_ang * cos_lat).atan2(cos_ang - sin_lat * dest_lat.sin());

    LatLong::wrapped(dest_lat.to_degrees(), dest_lon.to_degrees())
}
