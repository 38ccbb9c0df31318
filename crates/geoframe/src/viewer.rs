//! The host-side render root and viewer camera.
//!
//! Both live in the host scene graph's single-precision world space. The core
//! reads and writes them once per frame; it never holds onto host objects.
//! Cameras look down local −Z with +Y up (right-handed).

use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4Swizzles};

/// The scene node all map content is parented to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRoot {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for RenderRoot {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl RenderRoot {
    /// Map-space point to host world space.
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (self.scale * point)
    }

    /// Host world-space point to map space.
    #[must_use]
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        (self.rotation.inverse() * (point - self.translation)) / self.scale
    }

    /// The root's scale factor.
    ///
    /// # Panics
    ///
    /// Panics if the scale differs between axes: camera clip planes and
    /// origin re-centring are only defined for uniform scale.
    #[must_use]
    pub fn uniform_scale(&self) -> f32 {
        let Vec3 { x, y, z } = self.scale;
        assert!(
            approximately(x, y) && approximately(x, z),
            "the render root must have a uniform scale (identical along all axes), got {:?}",
            self.scale
        );
        x
    }
}

fn approximately(a: f32, b: f32) -> bool {
    (a - b).abs() <= (1e-6 * a.abs().max(b.abs())).max(f32::EPSILON * 8.0)
}

/// Build a rotation whose −Z axis points along `forward` and whose +Y axis is
/// as close to `up` as possible.
#[must_use]
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let Some(back) = (-forward).try_normalize() else {
        return Quat::IDENTITY;
    };
    let right = up
        .cross(back)
        .try_normalize()
        .unwrap_or_else(|| back.any_orthonormal_vector());
    let up = back.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, back))
}

/// The camera driven by the map, in host world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewer {
    pub translation: Vec3,
    pub rotation: Quat,
    /// Vertical field of view.
    pub field_of_view_degrees: f32,
    pub near_clip: f32,
    pub far_clip: f32,
    /// Viewport size in pixels.
    pub viewport_size: Vec2,
}

impl Default for Viewer {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            field_of_view_degrees: 45.0,
            near_clip: 1.0,
            far_clip: 100_000_000.0,
            viewport_size: Vec2::new(1920.0, 1080.0),
        }
    }
}

impl Viewer {
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        if self.viewport_size.y > 0.0 {
            self.viewport_size.x / self.viewport_size.y
        } else {
            1.0
        }
    }

    /// World-to-camera matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation).inverse()
    }

    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.field_of_view_degrees.to_radians(),
            self.aspect_ratio(),
            self.near_clip,
            self.far_clip,
        )
    }

    /// Project a world point into viewport space.
    ///
    /// `x`/`y` are in `[0, 1]` from the bottom-left corner when on screen; `z`
    /// is the distance in front of the camera (negative when behind it).
    #[must_use]
    pub fn world_to_viewport_point(&self, world: Vec3) -> Vec3 {
        let view = self.view_matrix().transform_point3(world);
        let clip = self.projection_matrix() * view.extend(1.0);
        let ndc = clip.xy() / clip.w;
        Vec3::new((ndc.x + 1.0) * 0.5, (ndc.y + 1.0) * 0.5, -view.z)
    }

    /// Inverse of [`Self::world_to_viewport_point`]: the world point `z`
    /// units in front of the camera under viewport position `x`/`y`.
    #[must_use]
    pub fn viewport_to_world_point(&self, viewport: Vec3) -> Vec3 {
        let tan_half_fov = (self.field_of_view_degrees.to_radians() * 0.5).tan();
        let depth = viewport.z;
        let local = Vec3::new(
            (viewport.x * 2.0 - 1.0) * tan_half_fov * self.aspect_ratio() * depth,
            (viewport.y * 2.0 - 1.0) * tan_half_fov * depth,
            -depth,
        );
        self.translation + self.rotation * local
    }

    /// Viewport position to pixels (bottom-left origin).
    #[must_use]
    pub fn viewport_to_screen_point(&self, viewport: Vec3) -> Vec3 {
        Vec3::new(
            viewport.x * self.viewport_size.x,
            viewport.y * self.viewport_size.y,
            viewport.z,
        )
    }

    /// Pixels (bottom-left origin) to viewport position.
    #[must_use]
    pub fn screen_to_viewport_point(&self, screen: Vec3) -> Vec3 {
        Vec3::new(
            screen.x / self.viewport_size.x.max(1.0),
            screen.y / self.viewport_size.y.max(1.0),
            screen.z,
        )
    }
}
