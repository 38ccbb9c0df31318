//! Camera state exchanged with the map backend.

use glam::{DVec3, Mat4};

use crate::geodesy::{GeographicPoint, LatLong, bearing, great_circle_distance, surface_up};

/// The backend's authoritative camera, produced once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSnapshot {
    pub position_ecef: DVec3,
    pub interest_point_ecef: DVec3,
    /// Horizontal viewing direction at the interest point.
    pub interest_basis_forward_ecef: DVec3,
    /// Angle of the view direction below the horizon.
    pub pitch_degrees: f64,
    pub distance_to_interest: f64,
    pub field_of_view_degrees: f32,
    pub near_clip: f32,
    pub far_clip: f32,
}

/// A camera placement derived from an interest point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAt {
    pub position_ecef: DVec3,
    pub forward: DVec3,
    pub up: DVec3,
}

/// Place a camera `distance` meters from `interest_point_ecef`, looking along
/// `basis_forward_ecef` tipped `pitch_radians` below the horizon.
///
/// `basis_forward_ecef` need not be exactly tangent; it is projected onto the
/// tangent plane at the interest point first.
#[must_use]
pub fn calculate_look_at(
    interest_point_ecef: DVec3,
    basis_forward_ecef: DVec3,
    pitch_radians: f64,
    distance: f64,
) -> LookAt {
    let interest_up = surface_up(interest_point_ecef).try_normalize().unwrap_or(DVec3::Z);
    let horizontal = (basis_forward_ecef - interest_up * basis_forward_ecef.dot(interest_up))
        .try_normalize()
        .unwrap_or_else(|| interest_up.any_orthonormal_vector());
    let right = horizontal.cross(interest_up);

    let (sin_pitch, cos_pitch) = pitch_radians.sin_cos();
    let forward = horizontal * cos_pitch - interest_up * sin_pitch;
    let up = right.cross(forward);

    LookAt {
        position_ecef: interest_point_ecef - forward * distance,
        forward,
        up,
    }
}

/// Orbit parameters that put a camera at `camera` while looking at
/// `interest`.
///
/// Returns `(tilt_degrees, heading_degrees, distance)`. Tilt is zero when
/// looking straight down.
#[must_use]
pub fn tilt_heading_distance(interest: LatLong, camera: GeographicPoint) -> (f64, f64, f64) {
    let ground = great_circle_distance(interest, camera.lat_long());
    let altitude = camera.altitude_meters();
    let distance = ground.hypot(altitude);
    let heading = bearing(camera.lat_long(), interest);
    let tilt = (std::f64::consts::FRAC_PI_2 - altitude.atan2(ground)).to_degrees();
    (tilt, heading, distance)
}

/// A camera move. Fields left unset keep their current value.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CameraUpdate {
    target: Option<LatLong>,
    distance: Option<f64>,
    heading_degrees: Option<f64>,
    tilt_degrees: Option<f64>,
}

impl CameraUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn target(mut self, target: LatLong) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub fn distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    #[must_use]
    pub fn heading(mut self, heading_degrees: f64) -> Self {
        self.heading_degrees = Some(heading_degrees);
        self
    }

    #[must_use]
    pub fn tilt(mut self, tilt_degrees: f64) -> Self {
        self.tilt_degrees = Some(tilt_degrees);
        self
    }

    #[must_use]
    pub fn target_value(&self) -> Option<LatLong> {
        self.target
    }

    #[must_use]
    pub fn distance_value(&self) -> Option<f64> {
        self.distance
    }

    #[must_use]
    pub fn heading_value(&self) -> Option<f64> {
        self.heading_degrees
    }

    #[must_use]
    pub fn tilt_value(&self) -> Option<f64> {
        self.tilt_degrees
    }
}

/// How an animated camera move behaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationOptions {
    /// Transition length; the backend picks one when unset.
    pub duration_seconds: Option<f64>,
    /// Whether user input may cut the transition short.
    pub interruptible: bool,
    /// Jump instead of animating when the target is far away.
    pub snap_if_far: bool,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            duration_seconds: None,
            interruptible: true,
            snap_if_far: true,
        }
    }
}

impl AnimationOptions {
    #[must_use]
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn interruptible(mut self, interruptible: bool) -> Self {
        self.interruptible = interruptible;
        self
    }

    #[must_use]
    pub fn snap_if_far(mut self, snap: bool) -> Self {
        self.snap_if_far = snap;
        self
    }
}

/// A change in whether the backend camera is animating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    Started,
    /// Finished, cancelled or interrupted.
    Ended,
}

/// One-shot state for a camera the session does not control.
///
/// `view_matrix` maps ECEF directions relative to `origin_ecef` into camera
/// space; it carries no translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub origin_ecef: DVec3,
    pub interest_point_ecef: DVec3,
    pub view_matrix: Mat4,
    pub projection: Mat4,
}
