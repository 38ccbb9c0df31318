//! Active-origin strategies for expressing ECEF content in render space.
//!
//! Two strategies exist, chosen once per session by [`CoordinateSystem`]:
//!
//! - **Fixed frame** (ECEF mode): the origin follows the camera every frame,
//!   so the camera always sits at render-space zero and render space keeps
//!   the ECEF axes.
//! - **Floating origin** (local-world mode): the origin is the
//!   [`CoordinateFrame`]'s reference point. It only moves when the session
//!   reassigns the frame's central point.

use std::fmt;
use std::str::FromStr;

use glam::{DVec3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::frame::CoordinateFrame;
use crate::geodesy::{EARTH_RADIUS, surface_up};

/// Which origin strategy a session uses. Fixed for the session's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoordinateSystem {
    /// Render space has ECEF axes and is re-centred on the camera each frame.
    Ecef,
    /// Render space is a tangent frame at a fixed geographic point.
    #[default]
    LocalWorld,
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSystem::Ecef => write!(f, "ecef"),
            CoordinateSystem::LocalWorld => write!(f, "local-world"),
        }
    }
}

impl FromStr for CoordinateSystem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ecef" => Ok(CoordinateSystem::Ecef),
            "local-world" => Ok(CoordinateSystem::LocalWorld),
            other => Err(Error::InvalidConfig {
                context: "coordinate_system",
                detail: format!("expected 'ecef' or 'local-world', got '{other}'"),
            }),
        }
    }
}

/// Blend `point` between its projection on the globe sphere (`scale = 0`)
/// and itself (`scale = 1`).
///
/// # Panics
///
/// Panics if `scale` is outside `[0, 1]`.
#[must_use]
pub fn scale_point_with_flattening(point: DVec3, scale: f64) -> DVec3 {
    assert!(
        (0.0..=1.0).contains(&scale),
        "environment flattening scale must be within [0, 1], got {scale}"
    );
    let on_sphere = surface_up(point) * EARTH_RADIUS;
    // Written so that both endpoints are reproduced exactly.
    on_sphere * (1.0 - scale) + point * scale
}

/// The per-frame environment flattening input.
///
/// How the scale is chosen (e.g. from camera altitude) is up to the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentFlattening {
    scale: f64,
}

impl Default for EnvironmentFlattening {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl EnvironmentFlattening {
    /// # Panics
    ///
    /// Panics if `scale` is outside `[0, 1]`.
    #[must_use]
    pub fn new(scale: f64) -> Self {
        let mut flattening = Self::default();
        flattening.set_scale(scale);
        flattening
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// # Panics
    ///
    /// Panics if `scale` is outside `[0, 1]`.
    pub fn set_scale(&mut self, scale: f64) {
        assert!(
            (0.0..=1.0).contains(&scale),
            "environment flattening scale must be within [0, 1], got {scale}"
        );
        self.scale = scale;
    }
}

/// What a strategy reports to dependents after its per-frame update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveFrame {
    /// Render-space zero, in ECEF.
    pub origin_ecef: DVec3,
    /// Up direction at the origin, in render space.
    pub local_up: Vec3,
    /// Flattening scale in effect for this frame; 1 while indoors.
    pub flattening_scale: f64,
}

/// Re-centres render space on the camera every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedFrameStrategy {
    origin_ecef: DVec3,
    up: Vec3,
    flattening_scale: f64,
}

impl FixedFrameStrategy {
    #[must_use]
    pub fn new(camera_position_ecef: DVec3, flattening_scale: f64) -> Self {
        let mut strategy = Self {
            origin_ecef: camera_position_ecef,
            up: Vec3::Y,
            flattening_scale: 1.0,
        };
        strategy.update(camera_position_ecef, flattening_scale);
        strategy
    }

    fn update(&mut self, camera_position_ecef: DVec3, flattening_scale: f64) -> ActiveFrame {
        self.origin_ecef = camera_position_ecef;
        self.up = surface_up(camera_position_ecef).as_vec3();
        self.flattening_scale = flattening_scale;
        self.active_frame()
    }

    fn active_frame(&self) -> ActiveFrame {
        ActiveFrame {
            origin_ecef: self.origin_ecef,
            local_up: self.up,
            flattening_scale: self.flattening_scale,
        }
    }
}

/// Keeps render space anchored to a coordinate frame's reference point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatingOriginStrategy {
    frame: CoordinateFrame,
    up: Vec3,
    flattening_scale: f64,
}

impl FloatingOriginStrategy {
    #[must_use]
    pub fn new(frame: CoordinateFrame, flattening_scale: f64) -> Self {
        let mut strategy = Self {
            frame,
            up: Vec3::Y,
            flattening_scale: 1.0,
        };
        strategy.update(frame.origin_ecef(), flattening_scale);
        strategy
    }

    #[must_use]
    pub fn frame(&self) -> &CoordinateFrame {
        &self.frame
    }

    /// Reassign the frame. Origin moves only through this call.
    pub fn set_frame(&mut self, frame: CoordinateFrame) {
        self.frame = frame;
    }

    fn update(&mut self, reference_ecef: DVec3, flattening_scale: f64) -> ActiveFrame {
        self.flattening_scale = flattening_scale;
        self.up = self.up_at(reference_ecef);
        self.active_frame()
    }

    /// At full scale the frame's own up is kept (flat local view); towards
    /// globe view the radial up at `position_ecef` takes over.
    fn up_at(&self, position_ecef: DVec3) -> Vec3 {
        let radial = self.frame.ecef_to_local_direction(surface_up(position_ecef));
        #[allow(clippy::cast_possible_truncation)]
        let t = (1.0 - self.flattening_scale) as f32;
        Vec3::Y.lerp(radial, t).try_normalize().unwrap_or(Vec3::Y)
    }

    fn active_frame(&self) -> ActiveFrame {
        ActiveFrame {
            origin_ecef: self.frame.origin_ecef(),
            local_up: self.up,
            flattening_scale: self.flattening_scale,
        }
    }
}

/// The session's origin strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformUpdateStrategy {
    FixedFrame(FixedFrameStrategy),
    FloatingOrigin(FloatingOriginStrategy),
}

impl TransformUpdateStrategy {
    #[must_use]
    pub fn coordinate_system(&self) -> CoordinateSystem {
        match self {
            TransformUpdateStrategy::FixedFrame(_) => CoordinateSystem::Ecef,
            TransformUpdateStrategy::FloatingOrigin(_) => CoordinateSystem::LocalWorld,
        }
    }

    /// Per-frame update.
    ///
    /// `current_origin_ecef` is the session's ECEF origin: the camera position
    /// in ECEF mode, the frame reference point otherwise.
    ///
    /// # Panics
    ///
    /// Panics if `flattening_scale` is outside `[0, 1]`.
    pub fn update(&mut self, current_origin_ecef: DVec3, flattening_scale: f64) -> ActiveFrame {
        assert!(
            (0.0..=1.0).contains(&flattening_scale),
            "environment flattening scale must be within [0, 1], got {flattening_scale}"
        );
        match self {
            TransformUpdateStrategy::FixedFrame(s) => s.update(current_origin_ecef, flattening_scale),
            TransformUpdateStrategy::FloatingOrigin(s) => {
                s.update(current_origin_ecef, flattening_scale)
            }
        }
    }

    #[must_use]
    pub fn active_frame(&self) -> ActiveFrame {
        match self {
            TransformUpdateStrategy::FixedFrame(s) => s.active_frame(),
            TransformUpdateStrategy::FloatingOrigin(s) => s.active_frame(),
        }
    }

    /// Place streamed ECEF content in render space, with flattening applied.
    #[must_use]
    pub fn ecef_to_render(&self, position: DVec3) -> Vec3 {
        match self {
            TransformUpdateStrategy::FixedFrame(s) => {
                (scale_point_with_flattening(position, s.flattening_scale) - s.origin_ecef)
                    .as_vec3()
            }
            TransformUpdateStrategy::FloatingOrigin(s) => s
                .frame
                .ecef_to_local(scale_point_with_flattening(position, s.flattening_scale)),
        }
    }

    /// Render-space up for content placed at `position_ecef`.
    ///
    /// Radial in ECEF mode. In local-world mode it is blended with the
    /// frame's up by the flattening scale, as for [`ActiveFrame::local_up`].
    #[must_use]
    pub fn up_at(&self, position_ecef: DVec3) -> Vec3 {
        match self {
            TransformUpdateStrategy::FixedFrame(_) => {
                surface_up(position_ecef).as_vec3().try_normalize().unwrap_or(Vec3::Y)
            }
            TransformUpdateStrategy::FloatingOrigin(s) => s.up_at(position_ecef),
        }
    }

    /// Rotation standing content at `position_ecef` upright in render space.
    #[must_use]
    pub fn upright_rotation_at(&self, position_ecef: DVec3) -> Quat {
        Quat::from_rotation_arc(Vec3::Y, self.up_at(position_ecef))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::GeographicPoint;

    #[test]
    fn test_flattening_endpoints() {
        let point = GeographicPoint::new(35.0, 139.0, 2_500.0).unwrap().to_ecef();

        let globe = scale_point_with_flattening(point, 0.0);
        assert!((globe.length() - EARTH_RADIUS).abs() < 1e-6);
        assert!((globe.normalize() - point.normalize()).length() < 1e-12);

        assert_eq!(scale_point_with_flattening(point, 1.0), point);
    }

    #[test]
    fn test_flattening_midpoint() {
        let point = DVec3::new(EARTH_RADIUS + 1_000.0, 0.0, 0.0);
        let half = scale_point_with_flattening(point, 0.5);
        assert!((half.x - (EARTH_RADIUS + 500.0)).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "flattening scale")]
    fn test_flattening_out_of_range_panics() {
        let _ = scale_point_with_flattening(DVec3::X, 1.5);
    }

    #[test]
    #[should_panic(expected = "flattening scale")]
    fn test_environment_flattening_rejects_negative() {
        let _ = EnvironmentFlattening::new(-0.1);
    }

    #[test]
    fn test_coordinate_system_parse() {
        assert_eq!("ecef".parse::<CoordinateSystem>(), Ok(CoordinateSystem::Ecef));
        assert_eq!(
            "local-world".parse::<CoordinateSystem>(),
            Ok(CoordinateSystem::LocalWorld)
        );
        assert!("unity".parse::<CoordinateSystem>().is_err());
        assert_eq!(CoordinateSystem::LocalWorld.to_string(), "local-world");
    }

    #[test]
    fn test_fixed_frame_follows_camera() {
        let start = GeographicPoint::new(0.0, 0.0, 1_000.0).unwrap().to_ecef();
        let mut strategy = TransformUpdateStrategy::FixedFrame(FixedFrameStrategy::new(start, 1.0));
        assert_eq!(strategy.ecef_to_render(start), Vec3::ZERO);

        let moved = start + DVec3::new(0.0, 5_000.0, 0.0);
        let active = strategy.update(moved, 1.0);
        assert_eq!(active.origin_ecef, moved);
        assert_eq!(strategy.ecef_to_render(moved), Vec3::ZERO);
        assert_eq!(strategy.ecef_to_render(start), Vec3::new(0.0, -5_000.0, 0.0));
        assert!((active.local_up - moved.normalize().as_vec3()).length() < 1e-6);
    }

    #[test]
    fn test_floating_origin_stays_put() {
        let point = GeographicPoint::new(51.5, -0.12, 0.0).unwrap();
        let frame = CoordinateFrame::new(point);
        let mut strategy =
            TransformUpdateStrategy::FloatingOrigin(FloatingOriginStrategy::new(frame, 1.0));

        let active = strategy.update(frame.origin_ecef(), 1.0);
        assert_eq!(active.origin_ecef, frame.origin_ecef());
        assert!((active.local_up - Vec3::Y).length() < 1e-6);

        // Updating with a far-away reference neither moves the origin nor
        // bends the up vector at full scale.
        let elsewhere = GeographicPoint::new(48.85, 2.35, 0.0).unwrap().to_ecef();
        let active = strategy.update(elsewhere, 1.0);
        assert_eq!(active.origin_ecef, frame.origin_ecef());
        assert!((active.local_up - Vec3::Y).length() < 1e-6);

        // In globe view the up vector follows the radial direction.
        let active = strategy.update(elsewhere, 0.0);
        let radial = frame.ecef_to_local_direction(elsewhere.normalize());
        assert!((active.local_up - radial).length() < 1e-5);
    }

    #[test]
    fn test_floating_origin_render_matches_frame() {
        let frame = CoordinateFrame::new(GeographicPoint::new(-33.9, 151.2, 0.0).unwrap());
        let strategy =
            TransformUpdateStrategy::FloatingOrigin(FloatingOriginStrategy::new(frame, 1.0));
        let target = GeographicPoint::new(-33.91, 151.21, 30.0).unwrap().to_ecef();
        assert_eq!(strategy.ecef_to_render(target), frame.ecef_to_local(target));
        assert_eq!(strategy.coordinate_system(), CoordinateSystem::LocalWorld);
    }

    #[test]
    fn test_up_at_follows_flattening() {
        let frame = CoordinateFrame::new(GeographicPoint::new(0.0, 0.0, 0.0).unwrap());
        let mut strategy =
            TransformUpdateStrategy::FloatingOrigin(FloatingOriginStrategy::new(frame, 1.0));
        let east = GeographicPoint::new(0.0, 10.0, 0.0).unwrap().to_ecef();
        let radial = frame.ecef_to_local_direction(east.normalize());

        // Flat local view: everything stands parallel to the frame's up.
        assert!((strategy.up_at(east) - Vec3::Y).length() < 1e-6);

        strategy.update(frame.origin_ecef(), 0.0);
        assert!((strategy.up_at(east) - radial).length() < 1e-5);
        let upright = strategy.upright_rotation_at(east) * Vec3::Y;
        assert!((upright - radial).length() < 1e-5);

        // Halfway the up leans part of the way over.
        strategy.update(frame.origin_ecef(), 0.5);
        let half = strategy.up_at(east);
        assert!(half.dot(Vec3::Y) < 1.0 - 1e-4);
        assert!(half.dot(radial) < 1.0 - 1e-4);

        let fixed = TransformUpdateStrategy::FixedFrame(FixedFrameStrategy::new(east, 1.0));
        assert!((fixed.up_at(east) - east.normalize().as_vec3()).length() < 1e-6);
    }
}
