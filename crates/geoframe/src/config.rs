//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geodesy::LatLong;
use crate::strategy::CoordinateSystem;

/// Closest allowed starting distance to the interest point, in meters.
pub const MIN_DISTANCE_TO_INTEREST: f64 = 300.0;
/// Farthest allowed starting distance to the interest point, in meters.
pub const MAX_DISTANCE_TO_INTEREST: f64 = 7_000_000.0;

/// Settings fixed at session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub coordinate_system: CoordinateSystem,
    pub latitude_degrees: f64,
    pub longitude_degrees: f64,
    pub distance_to_interest: f64,
    pub heading_degrees: f64,
    /// Initial environment flattening, `1.0` being true scale.
    pub environment_flattening_scale: f64,
    /// In local-world mode, re-centre the frame once the camera's ground
    /// point is this many meters from it. Zero disables.
    pub recenter_distance: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            coordinate_system: CoordinateSystem::default(),
            latitude_degrees: 40.440_624,
            longitude_degrees: -79.995_888,
            distance_to_interest: 4_781.0,
            heading_degrees: 0.0,
            environment_flattening_scale: 1.0,
            recenter_distance: 10_000.0,
        }
    }
}

impl MapConfig {
    /// Check every field, reporting the first one out of range.
    pub fn validate(&self) -> Result<()> {
        self.start_location().map_err(|err| Error::InvalidConfig {
            context: "start location",
            detail: err.to_string(),
        })?;

        if !(MIN_DISTANCE_TO_INTEREST..=MAX_DISTANCE_TO_INTEREST).contains(&self.distance_to_interest)
        {
            return Err(Error::InvalidConfig {
                context: "distance_to_interest",
                detail: format!(
                    "{} is outside [{MIN_DISTANCE_TO_INTEREST}, {MAX_DISTANCE_TO_INTEREST}]",
                    self.distance_to_interest
                ),
            });
        }

        if !(0.0..=360.0).contains(&self.heading_degrees) {
            return Err(Error::InvalidConfig {
                context: "heading_degrees",
                detail: format!("{} is outside [0, 360]", self.heading_degrees),
            });
        }

        if !(0.0..=1.0).contains(&self.environment_flattening_scale) {
            return Err(Error::InvalidConfig {
                context: "environment_flattening_scale",
                detail: format!("{} is outside [0, 1]", self.environment_flattening_scale),
            });
        }

        if !(self.recenter_distance >= 0.0 && self.recenter_distance.is_finite()) {
            return Err(Error::InvalidConfig {
                context: "recenter_distance",
                detail: format!("{} must be a non-negative distance", self.recenter_distance),
            });
        }

        Ok(())
    }

    /// The starting interest point.
    pub fn start_location(&self) -> Result<LatLong> {
        LatLong::new(self.latitude_degrees, self.longitude_degrees)
    }
}
