//! Tracking of the ground point the camera is focused on.

use glam::DVec3;

use crate::geodesy::{WGS84_SEMI_MAJOR_AXIS, WGS84_SEMI_MINOR_AXIS, surface_up};

/// Holds the last known ECEF interest point.
///
/// The primary camera's value comes from the backend every frame. Custom
/// cameras have no authoritative value, so one is estimated by intersecting
/// the view ray with the ellipsoid, falling back to the last known point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterestPointProvider {
    interest_point_ecef: DVec3,
}

impl InterestPointProvider {
    #[must_use]
    pub fn new(initial_interest_point_ecef: DVec3) -> Self {
        Self {
            interest_point_ecef: initial_interest_point_ecef,
        }
    }

    /// Record the backend-authoritative interest point for this frame.
    pub fn update_from_native(&mut self, interest_point_ecef: DVec3) {
        self.interest_point_ecef = interest_point_ecef;
    }

    #[must_use]
    pub fn interest_point_ecef(&self) -> DVec3 {
        self.interest_point_ecef
    }

    /// Tangent-plane up at the interest point.
    #[must_use]
    pub fn up(&self) -> DVec3 {
        let up = surface_up(self.interest_point_ecef);
        if up == DVec3::ZERO { DVec3::Z } else { up }
    }

    /// Estimate the interest point for a camera at `origin_ecef` looking along
    /// `forward_ecef`.
    ///
    /// Returns the nearest ray/ellipsoid intersection in front of the camera,
    /// or the last known interest point when the ray misses.
    #[must_use]
    pub fn calculate_interest_point(&self, origin_ecef: DVec3, forward_ecef: DVec3) -> DVec3 {
        forward_ecef
            .try_normalize()
            .and_then(|direction| intersect_ellipsoid(origin_ecef, direction))
            .unwrap_or(self.interest_point_ecef)
    }
}

/// Nearest non-negative hit of a ray against the WGS84 ellipsoid.
///
/// The ellipsoid is mapped onto a sphere of the semi-major radius by
/// stretching Z, where a plain ray/sphere test applies.
fn intersect_ellipsoid(origin: DVec3, direction: DVec3) -> Option<DVec3> {
    let stretch = DVec3::new(1.0, 1.0, WGS84_SEMI_MAJOR_AXIS / WGS84_SEMI_MINOR_AXIS);
    let o = origin * stretch;
    let d = direction * stretch;

    let a = d.length_squared();
    let b = 2.0 * o.dot(d);
    let c = o.length_squared() - WGS84_SEMI_MAJOR_AXIS * WGS84_SEMI_MAJOR_AXIS;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_disc = discriminant.sqrt();
    let near = (-b - sqrt_disc) / (2.0 * a);
    let far = (-b + sqrt_disc) / (2.0 * a);
    let t = if near >= 0.0 {
        near
    } else if far >= 0.0 {
        far
    } else {
        return None;
    };

    Some(origin + direction * t)
}
