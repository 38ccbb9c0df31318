//! A self-contained [`MapBackend`]: an orbit camera over the WGS84 ellipsoid.
//!
//! No geometry is streamed. Terrain heights come from a [`TerrainHeights`]
//! source, and indoor maps exist once they have been loaded. That is enough to
//! drive a session end to end and to resolve positioners the way a streaming
//! engine would.

use std::collections::HashMap;

use glam::{DVec3, Vec2, Vec3};

use crate::backend::MapBackend;
use crate::camera::{
    AnimationOptions, CameraSnapshot, CameraState, CameraUpdate, LookAt, calculate_look_at,
};
use crate::geodesy::{
    GeographicPoint, LatLong, WGS84_SEMI_MAJOR_AXIS, WGS84_SEMI_MINOR_AXIS, destination,
    great_circle_distance, surface_up,
};
use crate::positioner::{ElevationMode, IndoorMapTarget, Positioner, PositionerId};
use crate::strategy::{ActiveFrame, scale_point_with_flattening};

/// Closest the camera may get to its interest point, in meters.
pub const MIN_DISTANCE: f64 = 1.0;
/// Farthest the camera may get from its interest point, in meters.
pub const MAX_DISTANCE: f64 = 20_000_000.0;
/// Steepest tilt away from looking straight down, in degrees.
pub const MAX_TILT_DEGREES: f64 = 89.0;
/// Animated moves farther than this jump instead, when allowed to.
pub const SNAP_DISTANCE: f64 = 1_000_000.0;
const DEFAULT_TRANSITION_SECONDS: f64 = 2.0;

/// Source of ground heights above the ellipsoid.
pub trait TerrainHeights {
    /// Height in meters, or `None` if that area has not streamed in yet.
    fn height_at(&self, location: LatLong) -> Option<f64>;
}

/// Terrain at a constant height everywhere.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FlatTerrain {
    pub height: f64,
}

impl TerrainHeights for FlatTerrain {
    fn height_at(&self, _location: LatLong) -> Option<f64> {
        Some(self.height)
    }
}

/// A loaded indoor map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndoorMap {
    /// Altitude of floor zero.
    pub base_altitude: f64,
    pub floor_height: f64,
}

impl IndoorMap {
    fn floor_altitude(&self, floor_id: Option<i32>) -> f64 {
        self.base_altitude + f64::from(floor_id.unwrap_or(0)) * self.floor_height
    }
}

/// Camera orbiting an interest point on the ground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub interest: LatLong,
    pub distance: f64,
    /// Clockwise from north.
    pub heading_degrees: f64,
    /// Zero looks straight down.
    pub tilt_degrees: f64,
    pub field_of_view_degrees: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            interest: LatLong::wrapped(40.440_624, -79.995_888),
            distance: 4_781.0,
            heading_degrees: 0.0,
            tilt_degrees: 45.0,
            field_of_view_degrees: 45.0,
        }
    }
}

impl OrbitCamera {
    #[must_use]
    pub fn new(interest: LatLong, distance: f64) -> Self {
        Self {
            interest,
            distance,
            ..Self::default()
        }
        .clamped()
    }

    fn with_update(mut self, update: &CameraUpdate) -> Self {
        if let Some(target) = update.target_value() {
            self.interest = target;
        }
        if let Some(distance) = update.distance_value() {
            self.distance = distance;
        }
        if let Some(heading) = update.heading_value() {
            self.heading_degrees = heading;
        }
        if let Some(tilt) = update.tilt_value() {
            self.tilt_degrees = tilt;
        }
        self.clamped()
    }

    fn clamped(mut self) -> Self {
        self.distance = self.distance.clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.heading_degrees = self.heading_degrees.rem_euclid(360.0);
        self.tilt_degrees = self.tilt_degrees.clamp(0.0, MAX_TILT_DEGREES);
        self
    }

    fn interpolate(&self, to: &Self, t: f64) -> Self {
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        // Shortest way round for the angular quantities.
        let wrap = |delta: f64| (delta + 180.0).rem_euclid(360.0) - 180.0;

        let lon_delta = wrap(to.interest.longitude_degrees() - self.interest.longitude_degrees());
        let heading_delta = wrap(to.heading_degrees - self.heading_degrees);
        Self {
            interest: LatLong::wrapped(
                lerp(self.interest.latitude_degrees(), to.interest.latitude_degrees()),
                self.interest.longitude_degrees() + lon_delta * t,
            ),
            // Zoom feels uniform in log space.
            distance: (lerp(self.distance.ln(), to.distance.ln())).exp(),
            heading_degrees: (self.heading_degrees + heading_delta * t).rem_euclid(360.0),
            tilt_degrees: lerp(self.tilt_degrees, to.tilt_degrees),
            field_of_view_degrees: to.field_of_view_degrees,
        }
    }

    /// Horizontal view direction at `interest_point_ecef`.
    fn basis_forward(&self, interest_point_ecef: DVec3) -> DVec3 {
        let up = surface_up(interest_point_ecef);
        let north = (DVec3::Z - up * up.z)
            .try_normalize()
            .unwrap_or_else(|| (DVec3::X - up * up.x).normalize_or_zero());
        let east = north.cross(up);
        let (sin_h, cos_h) = self.heading_degrees.to_radians().sin_cos();
        north * cos_h + east * sin_h
    }

    fn pitch_degrees(&self) -> f64 {
        90.0 - self.tilt_degrees
    }
}

/// Relative user input for one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct OrbitInput {
    /// Meters to move the interest point along the heading.
    pub pan_forward: f64,
    /// Meters to move the interest point to the right of the heading.
    pub pan_right: f64,
    pub rotate_degrees: f64,
    pub tilt_degrees: f64,
    /// Multiplies the distance; values below one zoom in.
    pub zoom_factor: f64,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: OrbitCamera,
    to: OrbitCamera,
    elapsed: f64,
    duration: f64,
    interruptible: bool,
}

#[derive(Debug, Clone)]
struct PositionerRecord {
    location: LatLong,
    elevation: f64,
    elevation_mode: ElevationMode,
    indoor_map: Option<IndoorMapTarget>,
}

/// Reference backend driven by an [`OrbitCamera`].
#[derive(Debug)]
pub struct GlobeBackend<T = FlatTerrain> {
    terrain: T,
    camera: OrbitCamera,
    transition: Option<Transition>,
    viewport_size: Vec2,
    render_origin: Option<ActiveFrame>,
    custom_render_camera: Option<CameraState>,
    last_streamed_camera: Option<CameraState>,
    indoor_maps: HashMap<String, IndoorMap>,
    active_indoor_map: Option<String>,
    positioners: HashMap<PositionerId, PositionerRecord>,
}

impl Default for GlobeBackend {
    fn default() -> Self {
        Self::new(OrbitCamera::default(), FlatTerrain::default())
    }
}

impl<T: TerrainHeights> GlobeBackend<T> {
    #[must_use]
    pub fn new(camera: OrbitCamera, terrain: T) -> Self {
        Self {
            terrain,
            camera: camera.clamped(),
            transition: None,
            viewport_size: Vec2::new(1920.0, 1080.0),
            render_origin: None,
            custom_render_camera: None,
            last_streamed_camera: None,
            indoor_maps: HashMap::new(),
            active_indoor_map: None,
            positioners: HashMap::new(),
        }
    }

    #[must_use]
    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    #[must_use]
    pub fn terrain(&self) -> &T {
        &self.terrain
    }

    pub fn terrain_mut(&mut self) -> &mut T {
        &mut self.terrain
    }

    /// The origin most recently broadcast by the session.
    #[must_use]
    pub fn render_origin(&self) -> Option<&ActiveFrame> {
        self.render_origin.as_ref()
    }

    #[must_use]
    pub fn custom_render_camera(&self) -> Option<&CameraState> {
        self.custom_render_camera.as_ref()
    }

    #[must_use]
    pub fn last_streamed_camera(&self) -> Option<&CameraState> {
        self.last_streamed_camera.as_ref()
    }

    /// Apply one frame of user input.
    ///
    /// Cuts short an interruptible transition; returns `false` if the input
    /// was ignored because the running transition may not be interrupted.
    pub fn apply_input(&mut self, input: &OrbitInput) -> bool {
        if let Some(transition) = &self.transition {
            if !transition.interruptible {
                return false;
            }
            tracing::debug!("camera transition interrupted by input");
            self.transition = None;
        }

        let mut camera = self.camera;
        camera.heading_degrees += input.rotate_degrees;
        camera.tilt_degrees += input.tilt_degrees;
        if input.zoom_factor > 0.0 {
            camera.distance *= input.zoom_factor;
        }
        if input.pan_forward != 0.0 {
            camera.interest = destination(camera.interest, camera.heading_degrees, input.pan_forward);
        }
        if input.pan_right != 0.0 {
            camera.interest =
                destination(camera.interest, camera.heading_degrees + 90.0, input.pan_right);
        }
        self.camera = camera.clamped();
        true
    }

    pub fn load_indoor_map(&mut self, map_id: impl Into<String>, indoor_map: IndoorMap) {
        let map_id = map_id.into();
        tracing::info!(%map_id, "indoor map loaded");
        self.indoor_maps.insert(map_id, indoor_map);
    }

    pub fn unload_indoor_map(&mut self, map_id: &str) {
        if self.indoor_maps.remove(map_id).is_some() {
            tracing::info!(%map_id, "indoor map unloaded");
        }
        if self.active_indoor_map.as_deref() == Some(map_id) {
            self.active_indoor_map = None;
        }
    }

    /// Make a loaded indoor map the active one.
    pub fn enter_indoor_map(&mut self, map_id: &str) -> bool {
        if !self.indoor_maps.contains_key(map_id) {
            return false;
        }
        self.active_indoor_map = Some(map_id.to_string());
        true
    }

    pub fn exit_indoor_map(&mut self) {
        self.active_indoor_map = None;
    }

    fn flattening_scale(&self) -> f64 {
        if self.active_indoor_map.is_some() {
            return 1.0;
        }
        self.render_origin
            .as_ref()
            .map_or(1.0, |frame| frame.flattening_scale)
    }

    fn interest_point_ecef(&self) -> DVec3 {
        let height = self.terrain.height_at(self.camera.interest).unwrap_or(0.0);
        self.camera.interest.with_altitude(height).to_ecef()
    }

    fn look_at(&self, interest_point_ecef: DVec3) -> LookAt {
        calculate_look_at(
            interest_point_ecef,
            self.camera.basis_forward(interest_point_ecef),
            self.camera.pitch_degrees().to_radians(),
            self.camera.distance,
        )
    }

    /// The camera as rendered, i.e. with flattening applied.
    fn rendered_look_at(&self) -> LookAt {
        let interest = scale_point_with_flattening(self.interest_point_ecef(), self.flattening_scale());
        self.look_at(interest)
    }

    fn resolve_geographic(&self, record: &PositionerRecord) -> Option<GeographicPoint> {
        // Indoor positioners only exist once their map has loaded.
        let altitude = match &record.indoor_map {
            Some(target) => {
                let indoor_map = self.indoor_maps.get(&target.map_id)?;
                match record.elevation_mode {
                    ElevationMode::AboveGround => {
                        indoor_map.floor_altitude(target.floor_id) + record.elevation
                    }
                    ElevationMode::AboveSeaLevel => record.elevation,
                }
            }
            None => match record.elevation_mode {
                ElevationMode::AboveGround => {
                    self.terrain.height_at(record.location)? + record.elevation
                }
                ElevationMode::AboveSeaLevel => record.elevation,
            },
        };
        Some(record.location.with_altitude(altitude))
    }

    fn resolve_ecef(&self, id: PositionerId) -> Option<DVec3> {
        let record = self.positioners.get(&id)?;
        let point = self.resolve_geographic(record)?;
        Some(scale_point_with_flattening(point.to_ecef(), self.flattening_scale()))
    }

    fn record_mut(&mut self, id: PositionerId) -> Option<&mut PositionerRecord> {
        self.positioners.get_mut(&id)
    }
}

/// Easing with zero first and second derivative at both ends.
fn smootherstep(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Whether the ellipsoid hides `point` from `camera`.
///
/// Works in the space where the ellipsoid is the unit sphere; the camera's
/// visible cap is bounded by its tangent cone there.
#[must_use]
pub fn is_occluded_by_ellipsoid(camera_ecef: DVec3, point_ecef: DVec3) -> bool {
    let radii = DVec3::new(WGS84_SEMI_MAJOR_AXIS, WGS84_SEMI_MAJOR_AXIS, WGS84_SEMI_MINOR_AXIS);
    let camera = camera_ecef / radii;
    let point = point_ecef / radii;

    let horizon_sq = camera.length_squared() - 1.0;
    if horizon_sq <= 0.0 {
        // Camera below the surface.
        return false;
    }

    let to_point = point - camera;
    let towards_center = -to_point.dot(camera);
    towards_center > horizon_sq
        && towards_center * towards_center / to_point.length_squared() > horizon_sq
}

impl<T: TerrainHeights> MapBackend for GlobeBackend<T> {
    fn is_ready(&self) -> bool {
        self.terrain.height_at(self.camera.interest).is_some()
    }

    fn update(&mut self, dt: f32) {
        let Some(transition) = &mut self.transition else {
            return;
        };

        transition.elapsed += f64::from(dt);
        let t = (transition.elapsed / transition.duration).clamp(0.0, 1.0);
        self.camera = transition.from.interpolate(&transition.to, smootherstep(t));

        if t >= 1.0 {
            self.camera = transition.to;
            self.transition = None;
            tracing::debug!("camera transition finished");
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn camera_snapshot(&self) -> CameraSnapshot {
        let interest_point_ecef = self.interest_point_ecef();
        let look_at = self.look_at(interest_point_ecef);

        let distance = self.camera.distance;
        let camera_radius = look_at.position_ecef.length();
        let horizon = (camera_radius * camera_radius - WGS84_SEMI_MAJOR_AXIS * WGS84_SEMI_MAJOR_AXIS)
            .max(0.0)
            .sqrt();
        let near_clip = (distance * 0.01).clamp(0.1, 1_000.0);
        let far_clip = (horizon.max(distance) * 1.5).max(1_000.0);

        CameraSnapshot {
            position_ecef: look_at.position_ecef,
            interest_point_ecef,
            interest_basis_forward_ecef: self.camera.basis_forward(interest_point_ecef),
            pitch_degrees: self.camera.pitch_degrees(),
            distance_to_interest: distance,
            field_of_view_degrees: self.camera.field_of_view_degrees,
            near_clip: near_clip as f32,
            far_clip: far_clip as f32,
        }
    }

    fn set_render_origin(&mut self, frame: &ActiveFrame) {
        self.render_origin = Some(*frame);
    }

    fn set_viewport_size(&mut self, size: Vec2) {
        self.viewport_size = size;
    }

    fn active_indoor_map(&self) -> Option<&str> {
        self.active_indoor_map.as_deref()
    }

    fn move_camera(&mut self, update: &CameraUpdate) {
        self.transition = None;
        self.camera = self.camera.with_update(update);
    }

    fn animate_camera(&mut self, update: &CameraUpdate, options: &AnimationOptions) {
        let target = self.camera.with_update(update);
        let far = great_circle_distance(self.camera.interest, target.interest) > SNAP_DISTANCE;
        let duration = options.duration_seconds.unwrap_or(DEFAULT_TRANSITION_SECONDS);

        if (far && options.snap_if_far) || duration <= 0.0 {
            self.transition = None;
            self.camera = target;
            return;
        }

        self.transition = Some(Transition {
            from: self.camera,
            to: target,
            elapsed: 0.0,
            duration,
            interruptible: options.interruptible,
        });
    }

    fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    fn set_custom_render_camera(&mut self, state: &CameraState) {
        self.custom_render_camera = Some(*state);
    }

    fn clear_custom_render_camera(&mut self) {
        self.custom_render_camera = None;
    }

    fn stream_resources_for_camera(&mut self, state: &CameraState) {
        self.last_streamed_camera = Some(*state);
    }

    fn create_positioner(&mut self, positioner: &Positioner) {
        self.positioners.insert(
            positioner.id(),
            PositionerRecord {
                location: positioner.location(),
                elevation: positioner.elevation(),
                elevation_mode: positioner.elevation_mode(),
                indoor_map: positioner.indoor_map().cloned(),
            },
        );
    }

    fn destroy_positioner(&mut self, id: PositionerId) {
        self.positioners.remove(&id);
    }

    fn set_positioner_location(&mut self, id: PositionerId, location: LatLong) {
        if let Some(record) = self.record_mut(id) {
            record.location = location;
        }
    }

    fn set_positioner_elevation(&mut self, id: PositionerId, elevation: f64) {
        if let Some(record) = self.record_mut(id) {
            record.elevation = elevation;
        }
    }

    fn set_positioner_elevation_mode(&mut self, id: PositionerId, elevation_mode: ElevationMode) {
        if let Some(record) = self.record_mut(id) {
            record.elevation_mode = elevation_mode;
        }
    }

    fn set_positioner_indoor_map(&mut self, id: PositionerId, indoor_map: Option<&IndoorMapTarget>) {
        if let Some(record) = self.record_mut(id) {
            record.indoor_map = indoor_map.cloned();
        }
    }

    fn try_fetch_positioner_ecef(&self, id: PositionerId) -> Option<DVec3> {
        self.resolve_ecef(id)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn try_fetch_positioner_screen_point(&self, id: PositionerId) -> Option<Vec3> {
        let point = self.resolve_ecef(id)?;
        let look_at = self.rendered_look_at();

        let relative = point - look_at.position_ecef;
        let depth = relative.dot(look_at.forward);
        if depth <= 0.0 {
            return None;
        }

        let right = look_at.forward.cross(look_at.up);
        let width = f64::from(self.viewport_size.x);
        let height = f64::from(self.viewport_size.y.max(1.0));
        let tan_half_fov = (f64::from(self.camera.field_of_view_degrees).to_radians() * 0.5).tan();
        let ndc_x = relative.dot(right) / (depth * tan_half_fov * width / height);
        let ndc_y = relative.dot(look_at.up) / (depth * tan_half_fov);

        Some(Vec3::new(
            ((ndc_x + 1.0) * 0.5 * width) as f32,
            ((1.0 - ndc_y) * 0.5 * height) as f32,
            depth as f32,
        ))
    }

    fn try_fetch_positioner_geographic(&self, id: PositionerId) -> Option<GeographicPoint> {
        let record = self.positioners.get(&id)?;
        self.resolve_geographic(record)
    }

    fn is_positioner_behind_globe_horizon(&self, id: PositionerId) -> bool {
        self.resolve_ecef(id).is_some_and(|point| {
            is_occluded_by_ellipsoid(self.rendered_look_at().position_ecef, point)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positioner::{PositionerOptions, PositionerRegistry};

    /// Terrain that has not streamed anywhere yet.
    struct Unstreamed;

    impl TerrainHeights for Unstreamed {
        fn height_at(&self, _location: LatLong) -> Option<f64> {
            None
        }
    }

    fn lat_long(lat: f64, lon: f64) -> LatLong {
        LatLong::new(lat, lon).unwrap()
    }

    #[test]
    fn test_snapshot_is_consistent() {
        let backend = GlobeBackend::default();
        let snapshot = backend.camera_snapshot();

        let offset = snapshot.position_ecef - snapshot.interest_point_ecef;
        assert!((offset.length() - snapshot.distance_to_interest).abs() < 1e-6);
        assert!((snapshot.pitch_degrees - 45.0).abs() < 1e-12);
        assert!(snapshot.near_clip > 0.0 && snapshot.near_clip < snapshot.far_clip);
        assert!(
            snapshot
                .interest_basis_forward_ecef
                .dot(surface_up(snapshot.interest_point_ecef))
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn test_heading_turns_basis_clockwise() {
        let mut backend = GlobeBackend::new(OrbitCamera::new(lat_long(0.0, 0.0), 1_000.0), FlatTerrain::default());
        backend.move_camera(&CameraUpdate::new().heading(90.0));
        let snapshot = backend.camera_snapshot();
        // East at lat 0, lon 0 is ECEF +Y.
        assert!((snapshot.interest_basis_forward_ecef - DVec3::Y).length() < 1e-9);
    }

    #[test]
    fn test_readiness_follows_terrain() {
        let backend = GlobeBackend::new(OrbitCamera::default(), Unstreamed);
        assert!(!backend.is_ready());
        assert!(GlobeBackend::default().is_ready());
    }

    #[test]
    fn test_move_camera_clamps() {
        let mut backend = GlobeBackend::default();
        backend.move_camera(&CameraUpdate::new().distance(1e9).tilt(120.0).heading(-90.0));
        let camera = backend.camera();
        assert_eq!(camera.distance, MAX_DISTANCE);
        assert_eq!(camera.tilt_degrees, MAX_TILT_DEGREES);
        assert_eq!(camera.heading_degrees, 270.0);
    }

    #[test]
    fn test_animation_runs_to_completion() {
        let mut backend = GlobeBackend::default();
        let target = lat_long(40.45, -80.0);
        backend.animate_camera(
            &CameraUpdate::new().target(target).distance(1_000.0),
            &AnimationOptions::default().duration(1.0),
        );
        assert!(backend.is_transitioning());

        backend.update(0.5);
        assert!(backend.is_transitioning());
        let midway = backend.camera().distance;
        assert!(midway < 4_781.0 && midway > 1_000.0);

        backend.update(0.6);
        assert!(!backend.is_transitioning());
        assert_eq!(backend.camera().interest, target);
        assert_eq!(backend.camera().distance, 1_000.0);
    }

    #[test]
    fn test_far_animation_snaps() {
        let mut backend = GlobeBackend::default();
        let target = lat_long(-33.86, 151.2);
        backend.animate_camera(&CameraUpdate::new().target(target), &AnimationOptions::default());
        assert!(!backend.is_transitioning());
        assert_eq!(backend.camera().interest, target);

        backend.animate_camera(
            &CameraUpdate::new().target(lat_long(40.0, -80.0)),
            &AnimationOptions::default().snap_if_far(false),
        );
        assert!(backend.is_transitioning());
    }

    #[test]
    fn test_input_respects_interruptible() {
        let mut backend = GlobeBackend::default();
        let input = OrbitInput {
            rotate_degrees: 10.0,
            ..OrbitInput::default()
        };

        backend.animate_camera(
            &CameraUpdate::new().distance(500.0),
            &AnimationOptions::default().interruptible(false),
        );
        assert!(!backend.apply_input(&input));
        assert!(backend.is_transitioning());

        backend.animate_camera(&CameraUpdate::new().distance(500.0), &AnimationOptions::default());
        assert!(backend.apply_input(&input));
        assert!(!backend.is_transitioning());
    }

    #[test]
    fn test_pan_moves_along_heading() {
        let mut backend = GlobeBackend::new(OrbitCamera::new(lat_long(0.0, 0.0), 1_000.0), FlatTerrain::default());
        backend.apply_input(&OrbitInput {
            pan_forward: 1_000.0,
            ..OrbitInput::default()
        });
        let interest = backend.camera().interest;
        assert!(interest.latitude_degrees() > 0.0);
        assert!(interest.longitude_degrees().abs() < 1e-9);
    }

    #[test]
    fn test_positioner_elevation_modes() {
        let mut backend = GlobeBackend::new(OrbitCamera::default(), FlatTerrain { height: 100.0 });
        let mut registry = PositionerRegistry::new();

        let ground = registry
            .create(
                &mut backend,
                PositionerOptions::new()
                    .latitude_degrees(10.0)
                    .longitude_degrees(10.0)
                    .elevation_above_ground(5.0),
            )
            .unwrap();
        let sea = registry
            .create(
                &mut backend,
                PositionerOptions::new()
                    .latitude_degrees(10.0)
                    .longitude_degrees(10.0)
                    .elevation_above_sea_level(5.0),
            )
            .unwrap();

        let ground_point = registry.try_fetch_geographic_position(&backend, ground).unwrap();
        let sea_point = registry.try_fetch_geographic_position(&backend, sea).unwrap();
        assert_eq!(ground_point.altitude_meters(), 105.0);
        assert_eq!(sea_point.altitude_meters(), 5.0);
    }

    #[test]
    fn test_unstreamed_terrain_is_unresolvable() {
        let mut backend = GlobeBackend::new(OrbitCamera::default(), Unstreamed);
        let mut registry = PositionerRegistry::new();
        let id = registry
            .create(&mut backend, PositionerOptions::new().latitude_degrees(1.0))
            .unwrap();

        assert!(registry.try_fetch_ecef_location(&backend, id).is_none());
        assert!(registry.try_fetch_screen_point(&backend, id).is_none());
        assert!(!registry.is_behind_globe_horizon(&backend, id));

        // Sea-level positioners do not need terrain.
        registry.set_elevation_mode(&mut backend, id, ElevationMode::AboveSeaLevel);
        assert!(registry.try_fetch_ecef_location(&backend, id).is_some());
    }

    #[test]
    fn test_indoor_positioner_needs_loaded_map() {
        let mut backend = GlobeBackend::default();
        let mut registry = PositionerRegistry::new();
        let id = registry
            .create(
                &mut backend,
                PositionerOptions::new()
                    .latitude_degrees(40.44)
                    .longitude_degrees(-79.99)
                    .elevation_above_ground(1.0)
                    .indoor_map_with_floor_id("mall", 2),
            )
            .unwrap();
        assert!(registry.try_fetch_geographic_position(&backend, id).is_none());

        backend.load_indoor_map(
            "mall",
            IndoorMap {
                base_altitude: 250.0,
                floor_height: 4.0,
            },
        );
        let point = registry.try_fetch_geographic_position(&backend, id).unwrap();
        assert_eq!(point.altitude_meters(), 259.0);

        assert!(backend.enter_indoor_map("mall"));
        assert_eq!(backend.active_indoor_map(), Some("mall"));
        backend.unload_indoor_map("mall");
        assert_eq!(backend.active_indoor_map(), None);
        assert!(registry.try_fetch_geographic_position(&backend, id).is_none());
    }

    #[test]
    fn test_positioner_in_view_projects_to_screen_centre() {
        let interest = lat_long(51.5, -0.12);
        let mut backend = GlobeBackend::new(OrbitCamera::new(interest, 2_000.0), FlatTerrain::default());
        let mut registry = PositionerRegistry::new();
        let id = registry
            .create(
                &mut backend,
                PositionerOptions::new().latitude_degrees(51.5).longitude_degrees(-0.12),
            )
            .unwrap();

        let screen = registry.try_fetch_screen_point(&backend, id).unwrap();
        assert!((screen.x - 960.0).abs() < 0.01);
        assert!((screen.y - 540.0).abs() < 0.01);
        assert!((screen.z - 2_000.0).abs() < 0.01);

        // A point north of the interest appears above the centre.
        let north = registry
            .create(
                &mut backend,
                PositionerOptions::new().latitude_degrees(51.505).longitude_degrees(-0.12),
            )
            .unwrap();
        let screen = registry.try_fetch_screen_point(&backend, north).unwrap();
        assert!(screen.y < 540.0);
    }

    #[test]
    fn test_horizon_antipode_and_nearby() {
        let camera_point = lat_long(40.44, -79.99);
        let mut backend = GlobeBackend::new(
            OrbitCamera::new(camera_point, 7_000_000.0),
            FlatTerrain::default(),
        );
        backend.move_camera(&CameraUpdate::new().tilt(0.0));
        let mut registry = PositionerRegistry::new();
        let antipode = registry
            .create(
                &mut backend,
                PositionerOptions::new()
                    .latitude_degrees(-40.44)
                    .longitude_degrees(100.01),
            )
            .unwrap();
        assert!(registry.is_behind_globe_horizon(&backend, antipode));

        backend.move_camera(
            &CameraUpdate::new()
                .target(lat_long(-40.44, 100.01))
                .distance(300.0)
                .tilt(45.0),
        );
        assert!(!registry.is_behind_globe_horizon(&backend, antipode));
    }

    #[test]
    fn test_occlusion_inside_ellipsoid_is_never_occluded() {
        assert!(!is_occluded_by_ellipsoid(DVec3::ZERO, DVec3::X * 1.0e7));
    }

    #[test]
    fn test_render_origin_and_custom_camera_are_recorded() {
        let mut backend = GlobeBackend::default();
        let frame = ActiveFrame {
            origin_ecef: DVec3::X,
            local_up: Vec3::Y,
            flattening_scale: 0.5,
        };
        backend.set_render_origin(&frame);
        assert_eq!(backend.render_origin(), Some(&frame));
        assert!((backend.flattening_scale() - 0.5).abs() < f64::EPSILON);

        let state = CameraState {
            origin_ecef: DVec3::X,
            interest_point_ecef: DVec3::Y,
            view_matrix: glam::Mat4::IDENTITY,
            projection: glam::Mat4::IDENTITY,
        };
        backend.set_custom_render_camera(&state);
        backend.stream_resources_for_camera(&state);
        assert_eq!(backend.custom_render_camera(), Some(&state));
        assert_eq!(backend.last_streamed_camera(), Some(&state));
        backend.clear_custom_render_camera();
        assert!(backend.custom_render_camera().is_none());
    }
}
