//! Launch parameter parsing for the viewer.
//!
//! On native, parameters are parsed from command-line arguments using clap.
//! On WASM, defaults are used (CLI argument parsing is not available).

use geoframe::{CoordinateSystem, MapConfig};

/// Launch parameters for the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchParams {
    /// Starting latitude in degrees.
    pub lat: f64,
    /// Starting longitude in degrees.
    pub lon: f64,
    /// Starting distance from the camera to the interest point in meters.
    pub distance: f64,
    /// Starting heading in degrees clockwise from north.
    pub heading: f64,
    pub coordinate_system: CoordinateSystem,
    /// Initial environment flattening scale (1 is true scale).
    pub flattening: f64,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self::from(&MapConfig::default())
    }
}

impl From<&MapConfig> for LaunchParams {
    fn from(config: &MapConfig) -> Self {
        Self {
            lat: config.latitude_degrees,
            lon: config.longitude_degrees,
            distance: config.distance_to_interest,
            heading: config.heading_degrees,
            coordinate_system: config.coordinate_system,
            flattening: config.environment_flattening_scale,
        }
    }
}

impl LaunchParams {
    /// Session configuration for these parameters. Validated by the session.
    pub fn map_config(&self) -> MapConfig {
        MapConfig {
            coordinate_system: self.coordinate_system,
            latitude_degrees: self.lat,
            longitude_degrees: self.lon,
            distance_to_interest: self.distance,
            heading_degrees: self.heading,
            environment_flattening_scale: self.flattening,
            ..MapConfig::default()
        }
    }
}

#[cfg(not(target_family = "wasm"))]
mod native {
    use clap::Parser;

    use super::*;

    fn parse_coordinate_system(s: &str) -> Result<CoordinateSystem, String> {
        s.parse().map_err(|e: geoframe::Error| e.to_string())
    }

    #[derive(Parser)]
    #[command(about = "Globe viewer driven by the geoframe camera core")]
    struct CliArgs {
        /// Starting latitude in degrees.
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Starting longitude in degrees.
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Starting distance to the interest point in meters.
        #[arg(long)]
        distance: Option<f64>,

        /// Starting heading in degrees clockwise from north.
        #[arg(long)]
        heading: Option<f64>,

        /// Render-space layout: `ecef` or `local-world`.
        #[arg(long, value_parser = parse_coordinate_system)]
        coordinate_system: Option<CoordinateSystem>,

        /// Environment flattening scale in [0, 1].
        #[arg(long)]
        flattening: Option<f64>,
    }

    pub fn parse() -> LaunchParams {
        let args = CliArgs::parse();
        let defaults = LaunchParams::default();
        LaunchParams {
            lat: args.lat.unwrap_or(defaults.lat),
            lon: args.lon.unwrap_or(defaults.lon),
            distance: args.distance.unwrap_or(defaults.distance),
            heading: args.heading.unwrap_or(defaults.heading),
            coordinate_system: args.coordinate_system.unwrap_or(defaults.coordinate_system),
            flattening: args.flattening.unwrap_or(defaults.flattening),
        }
    }
}

/// Parse launch parameters from CLI args (native) or use defaults (WASM).
pub fn parse() -> LaunchParams {
    #[cfg(not(target_family = "wasm"))]
    {
        native::parse()
    }
    #[cfg(target_family = "wasm")]
    {
        LaunchParams::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_map_config() {
        let params = LaunchParams::default();
        assert_eq!(params.map_config(), MapConfig::default());
    }

    #[test]
    fn test_map_config_carries_overrides() {
        let params = LaunchParams {
            lat: -33.86,
            lon: 151.21,
            coordinate_system: CoordinateSystem::Ecef,
            flattening: 0.5,
            ..LaunchParams::default()
        };
        let config = params.map_config();
        assert_eq!(config.latitude_degrees, -33.86);
        assert_eq!(config.coordinate_system, CoordinateSystem::Ecef);
        assert_eq!(config.environment_flattening_scale, 0.5);
        assert!(config.validate().is_ok());
    }
}
