//! Error types for the geoframe crate.

use std::fmt;

/// Result type for geoframe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in geoframe operations.
///
/// Setup bugs (non-uniform root scale, flattening scale outside `[0, 1]`) are
/// assertions rather than variants here, and queries that cannot be resolved
/// yet return `Option`/`bool`.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Latitude outside `[-90, 90]` degrees.
    LatitudeOutOfRange {
        /// The rejected latitude in degrees.
        latitude: f64,
    },
    /// Longitude outside `[-180, 180]` degrees.
    LongitudeOutOfRange {
        /// The rejected longitude in degrees.
        longitude: f64,
    },
    /// A configuration value was rejected.
    InvalidConfig {
        /// The configuration field.
        context: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
    /// A camera command was issued with no controlled viewer attached.
    NoControlledViewer,
    /// A camera cannot produce a usable render state.
    InvalidCamera {
        /// Description of what was invalid.
        detail: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LatitudeOutOfRange { latitude } => {
                write!(f, "latitude {latitude} is outside [-90, 90] degrees")
            }
            Error::LongitudeOutOfRange { longitude } => {
                write!(f, "longitude {longitude} is outside [-180, 180] degrees")
            }
            Error::InvalidConfig { context, detail } => {
                write!(f, "invalid {context}: {detail}")
            }
            Error::NoControlledViewer => {
                write!(f, "a controlled viewer must be attached before moving the camera")
            }
            Error::InvalidCamera { detail } => write!(f, "invalid camera: {detail}"),
        }
    }
}

impl std::error::Error for Error {}
