//! Planet-scale map core: geodesy, render origins and camera synchronization.
//!
//! This crate keeps a host renderer's `f32` world stable while the camera
//! roams a WGS84 globe. A streaming engine (the [`MapBackend`]) owns the
//! authoritative camera; each frame a [`MapSession`] reads it, places the
//! host [`Viewer`] in render space and moves the render origin so that
//! visible geometry stays close to zero.
//!
//! # Coordinate systems
//!
//! - **ECEF**: render space has ECEF axes and is re-centred on the camera
//!   every frame. The viewer stays on the [`RenderRoot`].
//! - **Local world**: render space is a [`CoordinateFrame`] tangent to the
//!   globe at a reference point (+Y up, +Z north). The reference point moves
//!   only when asked to, or when the camera drifts far enough away.
//!
//! # Example
//!
//! ```
//! use geoframe::{GlobeBackend, MapConfig, MapSession, Viewer};
//!
//! let mut session = MapSession::new(MapConfig::default(), GlobeBackend::default())?;
//! session.set_controlled_viewer(Viewer::default());
//! session.update(1.0 / 60.0);
//!
//! let viewer = session.controlled_viewer().expect("viewer was attached");
//! let here = session.world_to_geographic_point(viewer.translation);
//! assert!(here.altitude_meters() > 0.0);
//! # Ok::<(), geoframe::Error>(())
//! ```

mod backend;
mod camera;
mod config;
mod error;
mod frame;
mod geodesy;
pub mod globe;
mod interest;
mod positioner;
mod session;
mod spaces;
mod strategy;
pub mod synchronizer;
mod viewer;

pub use backend::MapBackend;
pub use camera::{
    AnimationOptions, CameraSnapshot, CameraState, CameraUpdate, LookAt, TransitionEvent,
    calculate_look_at, tilt_heading_distance,
};
pub use config::{MAX_DISTANCE_TO_INTEREST, MIN_DISTANCE_TO_INTEREST, MapConfig};
pub use error::{Error, Result};
pub use frame::CoordinateFrame;
pub use geodesy::{
    EARTH_RADIUS, GeographicPoint, LatLong, MEAN_EARTH_RADIUS, WGS84_ECCENTRICITY_SQ,
    WGS84_FLATTENING, WGS84_SEMI_MAJOR_AXIS, WGS84_SEMI_MINOR_AXIS, bearing, destination,
    great_circle_distance, surface_up,
};
pub use globe::GlobeBackend;
pub use interest::InterestPointProvider;
pub use positioner::{
    ElevationMode, IndoorMapTarget, Positioner, PositionerId, PositionerOptions,
    PositionerRegistry,
};
pub use session::{FrameOutcome, MapSession};
pub use spaces::RenderSpace;
pub use strategy::{
    ActiveFrame, CoordinateSystem, EnvironmentFlattening, FixedFrameStrategy,
    FloatingOriginStrategy, TransformUpdateStrategy, scale_point_with_flattening,
};
pub use viewer::{RenderRoot, Viewer, look_rotation};
