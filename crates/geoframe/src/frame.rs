//! Local tangent frames anchored at a geographic point.
//!
//! A [`CoordinateFrame`] maps ECEF (`f64`) positions into a small, `f32`
//! local space centred on its origin. Local +Y is the radial up direction at
//! the origin, +Z points to true north along the tangent plane and
//! +X = Y × Z completes a right-handed basis (pointing west).

use glam::{DMat3, DQuat, DVec3, Quat, Vec3};

use crate::geodesy::{GeographicPoint, surface_up};

/// A rotation + translation anchor defined by a reference geographic point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateFrame {
    central_point: GeographicPoint,
    origin_ecef: DVec3,
    local_to_ecef: DQuat,
    ecef_to_local: DQuat,
}

impl CoordinateFrame {
    /// Build the tangent frame at `central_point`.
    #[must_use]
    pub fn new(central_point: GeographicPoint) -> Self {
        let origin_ecef = central_point.to_ecef();
        let local_to_ecef = tangent_basis(origin_ecef);
        Self {
            central_point,
            origin_ecef,
            local_to_ecef,
            ecef_to_local: local_to_ecef.inverse(),
        }
    }

    /// Replace the origin and rotation.
    ///
    /// Any local vectors computed against the previous frame are stale.
    pub fn set_central_point(&mut self, central_point: GeographicPoint) {
        *self = Self::new(central_point);
    }

    #[must_use]
    pub fn central_point(&self) -> GeographicPoint {
        self.central_point
    }

    #[must_use]
    pub fn origin_ecef(&self) -> DVec3 {
        self.origin_ecef
    }

    /// Express an ECEF position in local space.
    ///
    /// The subtraction and rotation happen in `f64`; only the result is
    /// narrowed.
    #[must_use]
    pub fn ecef_to_local(&self, position: DVec3) -> Vec3 {
        (self.ecef_to_local * (position - self.origin_ecef)).as_vec3()
    }

    /// Express a local position in ECEF.
    #[must_use]
    pub fn local_to_ecef(&self, local: Vec3) -> DVec3 {
        self.origin_ecef + self.local_to_ecef * local.as_dvec3()
    }

    /// Rotate an ECEF direction into local space.
    #[must_use]
    pub fn ecef_to_local_direction(&self, direction: DVec3) -> Vec3 {
        (self.ecef_to_local * direction).as_vec3()
    }

    /// Convert a local position straight to geographic coordinates.
    #[must_use]
    pub fn local_to_geographic(&self, local: Vec3) -> GeographicPoint {
        GeographicPoint::from_ecef(self.local_to_ecef(local))
    }

    /// Rotation taking local directions into ECEF.
    #[must_use]
    pub fn local_to_ecef_rotation(&self) -> Quat {
        self.local_to_ecef.as_quat()
    }
}

/// Rotation whose columns are the local X (west), Y (up) and Z (north) axes
/// expressed in ECEF.
fn tangent_basis(origin_ecef: DVec3) -> DQuat {
    let up = surface_up(origin_ecef);
    if up == DVec3::ZERO {
        return DQuat::IDENTITY;
    }

    // Project the ECEF pole axis onto the tangent plane.
    let north = DVec3::Z - up * DVec3::Z.dot(up);
    let north = if north.length_squared() < 1e-12 {
        // At the poles north is undefined; pick a stable tangent.
        DVec3::X - up * DVec3::X.dot(up)
    } else {
        north
    }
    .normalize();

    let west = up.cross(north);
    DQuat::from_mat3(&DMat3::from_cols(west, up, north))
}
