//! Conversions between geographic positions and host world space.
//!
//! Map space is the render root's local space. Depending on the session's
//! [`CoordinateSystem`](crate::CoordinateSystem) it is either ECEF offset by
//! the current origin, or the local tangent space of a [`CoordinateFrame`].

use glam::{DVec3, Quat, Vec3};

use crate::frame::CoordinateFrame;
use crate::geodesy::GeographicPoint;
use crate::viewer::{RenderRoot, Viewer};

/// The map space in effect for the current frame.
#[derive(Debug, Clone, Copy)]
pub enum RenderSpace<'a> {
    /// ECEF axes, translated so that `origin_ecef` is zero.
    Ecef { origin_ecef: DVec3 },
    /// The tangent space of a coordinate frame.
    LocalWorld(&'a CoordinateFrame),
}

impl RenderSpace<'_> {
    #[must_use]
    pub fn ecef_to_map(&self, position: DVec3) -> Vec3 {
        match self {
            RenderSpace::Ecef { origin_ecef } => (position - *origin_ecef).as_vec3(),
            RenderSpace::LocalWorld(frame) => frame.ecef_to_local(position),
        }
    }

    #[must_use]
    pub fn map_to_ecef(&self, point: Vec3) -> DVec3 {
        match self {
            RenderSpace::Ecef { origin_ecef } => *origin_ecef + point.as_dvec3(),
            RenderSpace::LocalWorld(frame) => frame.local_to_ecef(point),
        }
    }

    #[must_use]
    pub fn ecef_to_map_direction(&self, direction: DVec3) -> Vec3 {
        match self {
            RenderSpace::Ecef { .. } => direction.as_vec3(),
            RenderSpace::LocalWorld(frame) => frame.ecef_to_local_direction(direction),
        }
    }

    /// Rotation taking map-space directions into ECEF.
    #[must_use]
    pub fn map_to_ecef_rotation(&self) -> Quat {
        match self {
            RenderSpace::Ecef { .. } => Quat::IDENTITY,
            RenderSpace::LocalWorld(frame) => frame.local_to_ecef_rotation(),
        }
    }

    #[must_use]
    pub fn geographic_to_world_point(&self, root: &RenderRoot, point: GeographicPoint) -> Vec3 {
        root.transform_point(self.ecef_to_map(point.to_ecef()))
    }

    #[must_use]
    pub fn world_to_geographic_point(&self, root: &RenderRoot, world: Vec3) -> GeographicPoint {
        GeographicPoint::from_ecef(self.map_to_ecef(root.inverse_transform_point(world)))
    }

    /// Viewport position of a geographic point (`x`/`y` in `[0, 1]` from the
    /// bottom-left, `z` the distance in front of the viewer).
    #[must_use]
    pub fn geographic_to_viewport_point(
        &self,
        root: &RenderRoot,
        viewer: &Viewer,
        point: GeographicPoint,
    ) -> Vec3 {
        viewer.world_to_viewport_point(self.geographic_to_world_point(root, point))
    }

    #[must_use]
    pub fn viewport_to_geographic_point(
        &self,
        root: &RenderRoot,
        viewer: &Viewer,
        viewport: Vec3,
    ) -> GeographicPoint {
        self.world_to_geographic_point(root, viewer.viewport_to_world_point(viewport))
    }

    #[must_use]
    pub fn geographic_to_screen_point(
        &self,
        root: &RenderRoot,
        viewer: &Viewer,
        point: GeographicPoint,
    ) -> Vec3 {
        viewer.viewport_to_screen_point(self.geographic_to_viewport_point(root, viewer, point))
    }

    #[must_use]
    pub fn screen_to_geographic_point(
        &self,
        root: &RenderRoot,
        viewer: &Viewer,
        screen: Vec3,
    ) -> GeographicPoint {
        self.viewport_to_geographic_point(root, viewer, viewer.screen_to_viewport_point(screen))
    }
}
