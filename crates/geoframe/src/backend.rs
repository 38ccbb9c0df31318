//! The contract with the streaming/rendering engine.

use glam::{DVec3, Vec2, Vec3};

use crate::camera::{AnimationOptions, CameraSnapshot, CameraState, CameraUpdate};
use crate::geodesy::{GeographicPoint, LatLong};
use crate::positioner::{ElevationMode, IndoorMapTarget, Positioner, PositionerId};
use crate::strategy::ActiveFrame;

/// The map engine as seen by a [`MapSession`](crate::MapSession).
///
/// All calls happen on the session's thread, once per frame at most for the
/// per-frame hooks. Queries return `None`/`false` while a value cannot be
/// resolved yet; callers retry on a later frame.
pub trait MapBackend {
    /// Whether the engine has enough state for a frame to be synchronized.
    fn is_ready(&self) -> bool;

    /// Advance the engine's own state (camera transitions, streaming).
    fn update(&mut self, dt: f32);

    /// The authoritative camera for the current frame.
    fn camera_snapshot(&self) -> CameraSnapshot;

    /// Receive the render origin chosen for this frame.
    fn set_render_origin(&mut self, frame: &ActiveFrame);

    /// Receive the host viewport size in pixels.
    fn set_viewport_size(&mut self, size: Vec2);

    /// The indoor map the camera is currently inside, if any.
    fn active_indoor_map(&self) -> Option<&str>;

    fn move_camera(&mut self, update: &CameraUpdate);
    fn animate_camera(&mut self, update: &CameraUpdate, options: &AnimationOptions);
    fn is_transitioning(&self) -> bool;

    /// Render from a camera the session does not control.
    fn set_custom_render_camera(&mut self, state: &CameraState);
    fn clear_custom_render_camera(&mut self);
    /// Stream content visible from a secondary camera.
    fn stream_resources_for_camera(&mut self, state: &CameraState);

    fn create_positioner(&mut self, positioner: &Positioner);
    fn destroy_positioner(&mut self, id: PositionerId);
    fn set_positioner_location(&mut self, id: PositionerId, location: LatLong);
    fn set_positioner_elevation(&mut self, id: PositionerId, elevation: f64);
    fn set_positioner_elevation_mode(&mut self, id: PositionerId, elevation_mode: ElevationMode);
    fn set_positioner_indoor_map(&mut self, id: PositionerId, indoor_map: Option<&IndoorMapTarget>);

    /// Resolved position with environment flattening applied.
    fn try_fetch_positioner_ecef(&self, id: PositionerId) -> Option<DVec3>;
    /// Pixels from the top-left corner, `z` being depth.
    fn try_fetch_positioner_screen_point(&self, id: PositionerId) -> Option<Vec3>;
    fn try_fetch_positioner_geographic(&self, id: PositionerId) -> Option<GeographicPoint>;
    fn is_positioner_behind_globe_horizon(&self, id: PositionerId) -> bool;
}
