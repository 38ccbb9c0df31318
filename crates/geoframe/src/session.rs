//! The per-frame map session.
//!
//! A [`MapSession`] owns the render origin, the origin strategy, the
//! positioner registry and the backend. The host calls
//! [`MapSession::update`] once per rendered frame and reads the controlled
//! [`Viewer`] back afterwards.

use glam::{DVec3, Mat4, Quat, Vec3};

use crate::backend::MapBackend;
use crate::camera::{
    AnimationOptions, CameraSnapshot, CameraState, CameraUpdate, TransitionEvent,
    tilt_heading_distance,
};
use crate::config::MapConfig;
use crate::error::{Error, Result};
use crate::frame::CoordinateFrame;
use crate::geodesy::{GeographicPoint, LatLong, great_circle_distance};
use crate::interest::InterestPointProvider;
use crate::positioner::{
    ElevationMode, IndoorMapTarget, PositionerId, PositionerOptions, PositionerRegistry,
};
use crate::spaces::RenderSpace;
use crate::strategy::{
    ActiveFrame, CoordinateSystem, EnvironmentFlattening, FixedFrameStrategy,
    FloatingOriginStrategy, TransformUpdateStrategy,
};
use crate::synchronizer::{apply_native_camera_state, calculate_camera_parameters, recenter_on_viewer};
use crate::viewer::{RenderRoot, Viewer};

/// What [`MapSession::update`] did this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The backend was not ready; nothing ran.
    NotReady,
    /// No controlled viewer; only the origin was refreshed.
    NoViewer,
    /// The viewer was synchronized with the backend camera.
    Synchronized,
}

/// A running map.
#[derive(Debug)]
pub struct MapSession<B> {
    config: MapConfig,
    origin_ecef: DVec3,
    strategy: TransformUpdateStrategy,
    interest: InterestPointProvider,
    flattening: EnvironmentFlattening,
    positioners: PositionerRegistry,
    root: RenderRoot,
    viewer: Option<Viewer>,
    last_snapshot: Option<CameraSnapshot>,
    last_active_frame: Option<ActiveFrame>,
    transitioning: bool,
    transition_events: Vec<TransitionEvent>,
    backend: B,
}

fn render_space(strategy: &TransformUpdateStrategy, origin_ecef: DVec3) -> RenderSpace<'_> {
    match strategy {
        TransformUpdateStrategy::FixedFrame(_) => RenderSpace::Ecef { origin_ecef },
        TransformUpdateStrategy::FloatingOrigin(floating) => RenderSpace::LocalWorld(floating.frame()),
    }
}

fn validate_camera(viewer: &Viewer) -> Result<()> {
    let fov = viewer.field_of_view_degrees;
    if !(fov > 0.0 && fov < 180.0) {
        return Err(Error::InvalidCamera {
            detail: format!("field of view {fov} is outside (0, 180) degrees"),
        });
    }
    if !(viewer.near_clip > 0.0 && viewer.far_clip > viewer.near_clip) {
        return Err(Error::InvalidCamera {
            detail: format!(
                "clip planes must satisfy 0 < near < far, got near {} and far {}",
                viewer.near_clip, viewer.far_clip
            ),
        });
    }
    if viewer.viewport_size.min_element() <= 0.0 {
        return Err(Error::InvalidCamera {
            detail: "viewport has zero size".to_string(),
        });
    }
    Ok(())
}

impl<B: MapBackend> MapSession<B> {
    /// Start a session at the configured location.
    pub fn new(config: MapConfig, mut backend: B) -> Result<Self> {
        config.validate()?;
        let start = config.start_location()?;

        let coordinate_system = config.coordinate_system;
        let start_point = match coordinate_system {
            CoordinateSystem::Ecef => start.with_altitude(config.distance_to_interest),
            CoordinateSystem::LocalWorld => start.with_altitude(0.0),
        };
        let origin_ecef = start_point.to_ecef();
        let flattening = EnvironmentFlattening::new(config.environment_flattening_scale);

        let strategy = match coordinate_system {
            CoordinateSystem::Ecef => TransformUpdateStrategy::FixedFrame(FixedFrameStrategy::new(
                origin_ecef,
                flattening.scale(),
            )),
            CoordinateSystem::LocalWorld => {
                TransformUpdateStrategy::FloatingOrigin(FloatingOriginStrategy::new(
                    CoordinateFrame::new(start_point),
                    flattening.scale(),
                ))
            }
        };

        backend.move_camera(
            &CameraUpdate::new()
                .target(start)
                .distance(config.distance_to_interest)
                .heading(config.heading_degrees),
        );
        backend.set_render_origin(&strategy.active_frame());

        tracing::info!(
            %coordinate_system,
            latitude = start.latitude_degrees(),
            longitude = start.longitude_degrees(),
            distance = config.distance_to_interest,
            "created map session"
        );

        Ok(Self {
            config,
            origin_ecef,
            strategy,
            interest: InterestPointProvider::new(start.with_altitude(0.0).to_ecef()),
            flattening,
            positioners: PositionerRegistry::new(),
            root: RenderRoot::default(),
            viewer: None,
            last_snapshot: None,
            last_active_frame: None,
            transitioning: false,
            transition_events: Vec::new(),
            backend,
        })
    }

    /// Run one frame: backend tick, camera synchronization, origin update.
    ///
    /// # Panics
    ///
    /// Panics if a viewer is attached and the render root's scale is not
    /// uniform.
    pub fn update(&mut self, dt: f32) -> FrameOutcome {
        if !self.backend.is_ready() {
            tracing::trace!("map backend not ready, deferring frame");
            return FrameOutcome::NotReady;
        }

        self.backend.update(dt);
        self.track_transition();

        let outcome = if self.viewer.is_some() {
            self.synchronize_camera();
            FrameOutcome::Synchronized
        } else {
            FrameOutcome::NoViewer
        };

        self.update_transforms();
        outcome
    }

    fn synchronize_camera(&mut self) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };

        self.backend.set_viewport_size(viewer.viewport_size);
        let snapshot = self.backend.camera_snapshot();
        let indoor_map_active = self.backend.active_indoor_map().is_some();
        let flattening_scale = self.flattening.scale();

        if let TransformUpdateStrategy::FloatingOrigin(floating) = &mut self.strategy
            && self.config.recenter_distance > 0.0
        {
            let (look_at, _) =
                calculate_camera_parameters(&snapshot, flattening_scale, indoor_map_active);
            let ground = GeographicPoint::from_ecef(look_at.position_ecef).lat_long();
            let central = floating.frame().central_point().lat_long();
            let drift = great_circle_distance(central, ground);

            if drift > self.config.recenter_distance {
                let point = ground.with_altitude(0.0);
                floating.set_frame(CoordinateFrame::new(point));
                self.origin_ecef = point.to_ecef();
                tracing::info!(
                    drift,
                    latitude = point.latitude_degrees(),
                    longitude = point.longitude_degrees(),
                    "re-centred local frame under camera"
                );
            }
        }

        let space = render_space(&self.strategy, self.origin_ecef);
        apply_native_camera_state(
            &snapshot,
            flattening_scale,
            indoor_map_active,
            space,
            &self.root,
            viewer,
            &mut self.interest,
        );

        if matches!(self.strategy, TransformUpdateStrategy::FixedFrame(_)) {
            recenter_on_viewer(&mut self.origin_ecef, &self.root, viewer);
        }

        if self.last_snapshot.replace(snapshot) != Some(snapshot) {
            self.positioners.mark_projections_changed();
        }
    }

    fn effective_flattening_scale(&self) -> f64 {
        if self.backend.active_indoor_map().is_some() {
            1.0
        } else {
            self.flattening.scale()
        }
    }

    fn track_transition(&mut self) {
        let transitioning = self.backend.is_transitioning();
        if transitioning == self.transitioning {
            return;
        }
        self.transitioning = transitioning;
        let event = if transitioning {
            TransitionEvent::Started
        } else {
            TransitionEvent::Ended
        };
        tracing::debug!(?event, "camera transition");
        self.transition_events.push(event);
    }

    fn update_transforms(&mut self) {
        let scale = self.effective_flattening_scale();
        let active = self.strategy.update(self.origin_ecef, scale);
        self.backend.set_render_origin(&active);
        if self.last_active_frame.replace(active) != Some(active) {
            self.positioners.mark_projections_changed();
        }
    }

    /// Move the render origin to `point`.
    ///
    /// In ECEF mode with a controlled viewer this moves the camera there; the
    /// origin follows on the next frame. In local-world mode the coordinate
    /// frame is replaced, which invalidates any previously computed world
    /// positions.
    pub fn set_origin_point(&mut self, point: GeographicPoint) {
        self.origin_ecef = point.to_ecef();
        tracing::info!(
            latitude = point.latitude_degrees(),
            longitude = point.longitude_degrees(),
            altitude = point.altitude_meters(),
            "setting origin point"
        );

        match &mut self.strategy {
            TransformUpdateStrategy::FixedFrame(_) => {
                if self.viewer.is_some() {
                    self.backend
                        .move_camera(&CameraUpdate::new().target(point.lat_long()));
                    self.track_transition();
                    return;
                }
            }
            TransformUpdateStrategy::FloatingOrigin(floating) => {
                floating.set_frame(CoordinateFrame::new(point));
            }
        }
        self.update_transforms();
    }

    #[must_use]
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    #[must_use]
    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.strategy.coordinate_system()
    }

    /// Render-space zero in ECEF, as of the last update.
    #[must_use]
    pub fn origin_ecef(&self) -> DVec3 {
        self.origin_ecef
    }

    #[must_use]
    pub fn active_frame(&self) -> ActiveFrame {
        self.strategy.active_frame()
    }

    #[must_use]
    pub fn strategy(&self) -> &TransformUpdateStrategy {
        &self.strategy
    }

    #[must_use]
    pub fn interest_point_ecef(&self) -> DVec3 {
        self.interest.interest_point_ecef()
    }

    /// Tangent-plane up at the interest point.
    #[must_use]
    pub fn interest_up(&self) -> DVec3 {
        self.interest.up()
    }

    #[must_use]
    pub fn environment_flattening_scale(&self) -> f64 {
        self.flattening.scale()
    }

    /// # Panics
    ///
    /// Panics if `scale` is outside `[0, 1]`.
    pub fn set_environment_flattening_scale(&mut self, scale: f64) {
        self.flattening.set_scale(scale);
    }

    #[must_use]
    pub fn render_root(&self) -> &RenderRoot {
        &self.root
    }

    pub fn set_render_root(&mut self, root: RenderRoot) {
        self.root = root;
    }

    pub fn set_controlled_viewer(&mut self, viewer: Viewer) {
        self.viewer = Some(viewer);
    }

    /// Detach the controlled viewer, returning its last state.
    pub fn clear_controlled_viewer(&mut self) -> Option<Viewer> {
        self.viewer.take()
    }

    #[must_use]
    pub fn controlled_viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    pub fn controlled_viewer_mut(&mut self) -> Option<&mut Viewer> {
        self.viewer.as_mut()
    }

    fn require_viewer(&self) -> Result<&Viewer> {
        self.viewer.as_ref().ok_or(Error::NoControlledViewer)
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn move_to(&mut self, update: &CameraUpdate) -> Result<()> {
        self.require_viewer()?;
        self.backend.move_camera(update);
        self.track_transition();
        Ok(())
    }

    pub fn animate_to(&mut self, update: &CameraUpdate, options: &AnimationOptions) -> Result<()> {
        self.require_viewer()?;
        self.backend.animate_camera(update, options);
        self.track_transition();
        Ok(())
    }

    /// Place the camera at `camera` looking at `interest`.
    pub fn move_to_camera_position(
        &mut self,
        interest: LatLong,
        camera: GeographicPoint,
    ) -> Result<()> {
        self.move_to(&camera_position_update(interest, camera))
    }

    pub fn animate_to_camera_position(
        &mut self,
        interest: LatLong,
        camera: GeographicPoint,
        options: &AnimationOptions,
    ) -> Result<()> {
        self.animate_to(&camera_position_update(interest, camera), options)
    }

    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.backend.is_transitioning()
    }

    /// Transition starts and ends seen since the last call, oldest first.
    pub fn take_transition_events(&mut self) -> Vec<TransitionEvent> {
        std::mem::take(&mut self.transition_events)
    }

    /// The map space in effect for the current frame.
    #[must_use]
    pub fn render_space(&self) -> RenderSpace<'_> {
        render_space(&self.strategy, self.origin_ecef)
    }

    #[must_use]
    pub fn geographic_to_world_point(&self, point: GeographicPoint) -> Vec3 {
        self.render_space().geographic_to_world_point(&self.root, point)
    }

    #[must_use]
    pub fn world_to_geographic_point(&self, world: Vec3) -> GeographicPoint {
        self.render_space().world_to_geographic_point(&self.root, world)
    }

    /// Host world position for content pinned at `point`.
    ///
    /// Unlike [`Self::geographic_to_world_point`] this follows environment
    /// flattening, so anchored objects line up with streamed geometry and
    /// positioners. Takes effect from the next [`Self::update`].
    #[must_use]
    pub fn anchor_world_point(&self, point: GeographicPoint) -> Vec3 {
        self.root
            .transform_point(self.strategy.ecef_to_render(point.to_ecef()))
    }

    /// Host world rotation standing content at `point` upright.
    #[must_use]
    pub fn anchor_world_rotation(&self, point: GeographicPoint) -> Quat {
        self.root.rotation * self.strategy.upright_rotation_at(point.to_ecef())
    }

    /// Host world position of an ECEF point, e.g. a resolved positioner.
    #[must_use]
    pub fn ecef_to_world_point(&self, position: DVec3) -> Vec3 {
        self.root.transform_point(self.render_space().ecef_to_map(position))
    }

    pub fn geographic_to_viewport_point(&self, point: GeographicPoint) -> Result<Vec3> {
        let viewer = self.require_viewer()?;
        Ok(self
            .render_space()
            .geographic_to_viewport_point(&self.root, viewer, point))
    }

    pub fn viewport_to_geographic_point(&self, viewport: Vec3) -> Result<GeographicPoint> {
        let viewer = self.require_viewer()?;
        Ok(self
            .render_space()
            .viewport_to_geographic_point(&self.root, viewer, viewport))
    }

    pub fn geographic_to_screen_point(&self, point: GeographicPoint) -> Result<Vec3> {
        let viewer = self.require_viewer()?;
        Ok(self
            .render_space()
            .geographic_to_screen_point(&self.root, viewer, point))
    }

    pub fn screen_to_geographic_point(&self, screen: Vec3) -> Result<GeographicPoint> {
        let viewer = self.require_viewer()?;
        Ok(self
            .render_space()
            .screen_to_geographic_point(&self.root, viewer, screen))
    }

    /// Camera state for a viewer the session does not control.
    ///
    /// Does not touch the controlled viewer or the render origin.
    pub fn state_for_custom_camera(&self, viewer: &Viewer) -> Result<CameraState> {
        validate_camera(viewer)?;

        let space = self.render_space();
        let map_space_position = self.root.inverse_transform_point(viewer.translation);
        let origin_ecef = space.map_to_ecef(map_space_position);

        let ecef_rotation =
            space.map_to_ecef_rotation() * self.root.rotation.inverse() * viewer.rotation;
        let forward_ecef = (ecef_rotation * Vec3::NEG_Z).as_dvec3();
        let interest_point_ecef = self
            .interest
            .calculate_interest_point(origin_ecef, forward_ecef);

        Ok(CameraState {
            origin_ecef,
            interest_point_ecef,
            view_matrix: Mat4::from_quat(ecef_rotation.inverse()),
            projection: viewer.projection_matrix(),
        })
    }

    pub fn set_custom_render_camera(&mut self, viewer: &Viewer) -> Result<()> {
        let state = self.state_for_custom_camera(viewer).inspect_err(|err| {
            tracing::error!(%err, "rejected custom render camera");
        })?;
        self.backend.set_custom_render_camera(&state);
        Ok(())
    }

    pub fn clear_custom_render_camera(&mut self) {
        self.backend.clear_custom_render_camera();
    }

    /// Ask the backend to stream what `viewer` can see.
    pub fn stream_resources_for_camera(&mut self, viewer: &Viewer) -> Result<()> {
        let state = self.state_for_custom_camera(viewer).inspect_err(|err| {
            tracing::error!(%err, "rejected streaming camera");
        })?;
        self.backend.stream_resources_for_camera(&state);
        Ok(())
    }

    #[must_use]
    pub fn positioners(&self) -> &PositionerRegistry {
        &self.positioners
    }

    pub fn create_positioner(&mut self, options: PositionerOptions) -> Result<PositionerId> {
        self.positioners.create(&mut self.backend, options)
    }

    /// Destroy a positioner and reset `id` to [`PositionerId::INVALID`].
    pub fn destroy_positioner(&mut self, id: &mut PositionerId) -> bool {
        self.positioners.destroy(&mut self.backend, id)
    }

    pub fn set_positioner_location(&mut self, id: PositionerId, location: LatLong) {
        self.positioners.set_location(&mut self.backend, id, location);
    }

    pub fn set_positioner_elevation(&mut self, id: PositionerId, elevation: f64) {
        self.positioners.set_elevation(&mut self.backend, id, elevation);
    }

    pub fn set_positioner_elevation_mode(&mut self, id: PositionerId, elevation_mode: ElevationMode) {
        self.positioners
            .set_elevation_mode(&mut self.backend, id, elevation_mode);
    }

    pub fn set_positioner_indoor_map(&mut self, id: PositionerId, indoor_map: Option<IndoorMapTarget>) {
        self.positioners
            .set_indoor_map(&mut self.backend, id, indoor_map);
    }

    #[must_use]
    pub fn try_fetch_positioner_ecef(&self, id: PositionerId) -> Option<DVec3> {
        self.positioners.try_fetch_ecef_location(&self.backend, id)
    }

    #[must_use]
    pub fn try_fetch_positioner_screen_point(&self, id: PositionerId) -> Option<Vec3> {
        self.positioners.try_fetch_screen_point(&self.backend, id)
    }

    #[must_use]
    pub fn try_fetch_positioner_geographic(&self, id: PositionerId) -> Option<GeographicPoint> {
        self.positioners
            .try_fetch_geographic_position(&self.backend, id)
    }

    /// Host world position of a positioner this frame.
    #[must_use]
    pub fn try_fetch_positioner_world_point(&self, id: PositionerId) -> Option<Vec3> {
        self.try_fetch_positioner_ecef(id)
            .map(|position| self.ecef_to_world_point(position))
    }

    #[must_use]
    pub fn is_positioner_behind_globe_horizon(&self, id: PositionerId) -> bool {
        self.positioners.is_behind_globe_horizon(&self.backend, id)
    }

    /// Whether positioner projections may have moved since the last call.
    pub fn take_positioner_projections_changed(&mut self) -> bool {
        self.positioners.take_projections_changed()
    }
}

fn camera_position_update(interest: LatLong, camera: GeographicPoint) -> CameraUpdate {
    let (tilt, heading, distance) = tilt_heading_distance(interest, camera);
    CameraUpdate::new()
        .target(interest)
        .distance(distance)
        .heading(heading)
        .tilt(tilt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globe::{FlatTerrain, GlobeBackend, IndoorMap, OrbitCamera, OrbitInput, TerrainHeights};

    struct Unstreamed;

    impl TerrainHeights for Unstreamed {
        fn height_at(&self, _location: LatLong) -> Option<f64> {
            None
        }
    }

    fn session(coordinate_system: CoordinateSystem) -> MapSession<GlobeBackend> {
        // Surfaces session logs in failing test output.
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let config = MapConfig {
            coordinate_system,
            ..MapConfig::default()
        };
        MapSession::new(config, GlobeBackend::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = MapConfig {
            distance_to_interest: 1.0,
            ..MapConfig::default()
        };
        assert!(MapSession::new(config, GlobeBackend::default()).is_err());
    }

    #[test]
    fn test_new_moves_backend_to_start() {
        let config = MapConfig {
            latitude_degrees: 51.5,
            longitude_degrees: -0.12,
            distance_to_interest: 2_000.0,
            heading_degrees: 90.0,
            ..MapConfig::default()
        };
        let session = MapSession::new(config, GlobeBackend::default()).unwrap();
        let camera = session.backend().camera();
        assert_eq!(camera.interest, LatLong::new(51.5, -0.12).unwrap());
        assert_eq!(camera.distance, 2_000.0);
        assert_eq!(camera.heading_degrees, 90.0);
        assert!(session.backend().render_origin().is_some());
    }

    #[test]
    fn test_not_ready_defers_everything() {
        let mut session = MapSession::new(
            MapConfig::default(),
            GlobeBackend::new(OrbitCamera::default(), Unstreamed),
        )
        .unwrap();
        session.set_controlled_viewer(Viewer::default());

        assert_eq!(session.update(0.016), FrameOutcome::NotReady);
        assert_eq!(session.controlled_viewer(), Some(&Viewer::default()));
    }

    #[test]
    fn test_missing_viewer_is_not_an_error() {
        let mut session = session(CoordinateSystem::LocalWorld);
        assert_eq!(session.update(0.016), FrameOutcome::NoViewer);
        assert_eq!(
            session.backend().render_origin().map(|frame| frame.origin_ecef),
            Some(session.origin_ecef())
        );

        session.set_controlled_viewer(Viewer::default());
        assert_eq!(session.update(0.016), FrameOutcome::Synchronized);
    }

    #[test]
    fn test_local_world_viewer_looks_at_interest() {
        let mut session = session(CoordinateSystem::LocalWorld);
        session.set_controlled_viewer(Viewer::default());
        session.update(0.016);

        let viewer = session.controlled_viewer().unwrap();
        let interest_world = session.ecef_to_world_point(session.interest_point_ecef());
        let to_interest = (interest_world - viewer.translation).normalize();
        assert!((viewer.forward() - to_interest).length() < 1e-4);
        assert!(((interest_world - viewer.translation).length() - 4_781.0).abs() < 0.05);

        let snapshot = session.backend().camera_snapshot();
        assert!((viewer.near_clip - snapshot.near_clip).abs() < f32::EPSILON);
        assert!((viewer.far_clip - snapshot.far_clip).abs() < 1.0);
    }

    #[test]
    fn test_ecef_mode_keeps_camera_at_root() {
        let mut session = session(CoordinateSystem::Ecef);
        session.set_render_root(RenderRoot {
            translation: Vec3::new(10.0, -4.0, 3.0),
            rotation: Quat::from_rotation_x(0.3),
            scale: Vec3::ONE,
        });
        session.set_controlled_viewer(Viewer::default());

        // Camera flies north-east at 50 m per frame for a long time.
        session.backend_mut().move_camera(&CameraUpdate::new().heading(45.0));
        let input = OrbitInput {
            pan_forward: 50.0,
            ..OrbitInput::default()
        };

        session.update(1.0 / 60.0);
        for frame in 0..20_000 {
            session.backend_mut().apply_input(&input);
            assert_eq!(session.update(1.0 / 60.0), FrameOutcome::Synchronized);

            let viewer = session.controlled_viewer().unwrap();
            assert_eq!(viewer.translation, session.render_root().translation);

            let camera_ecef = session.backend().camera_snapshot().position_ecef;
            let error = (session.origin_ecef() - camera_ecef).length();
            assert!(error < 1e-3, "frame {frame}: origin is {error} m from camera");
            assert_eq!(session.active_frame().origin_ecef, session.origin_ecef());
        }

        // Roughly 1000 km travelled.
        let start = LatLong::new(40.440_624, -79.995_888).unwrap();
        let here = session.backend().camera().interest;
        assert!(great_circle_distance(start, here) > 900_000.0);
    }

    #[test]
    fn test_local_world_recentres_after_long_move() {
        let mut session = session(CoordinateSystem::LocalWorld);
        session.set_controlled_viewer(Viewer::default());
        session.update(0.016);
        let before = session.origin_ecef();

        let far = LatLong::new(40.9, -79.995_888).unwrap();
        session.move_to(&CameraUpdate::new().target(far)).unwrap();
        session.update(0.016);

        assert_ne!(session.origin_ecef(), before);
        let TransformUpdateStrategy::FloatingOrigin(floating) = session.strategy() else {
            panic!("expected a floating origin");
        };
        let central = floating.frame().central_point().lat_long();
        assert!(great_circle_distance(central, far) < 10_000.0);

        // The viewer stays within a few kilometres of render-space zero.
        let viewer = session.controlled_viewer().unwrap();
        assert!(viewer.translation.length() < 10_000.0);
    }

    #[test]
    fn test_recentring_can_be_disabled() {
        let config = MapConfig {
            recenter_distance: 0.0,
            ..MapConfig::default()
        };
        let mut session = MapSession::new(config, GlobeBackend::default()).unwrap();
        session.set_controlled_viewer(Viewer::default());
        let before = session.origin_ecef();

        let far = LatLong::new(41.5, -79.995_888).unwrap();
        session.move_to(&CameraUpdate::new().target(far)).unwrap();
        session.update(0.016);
        assert_eq!(session.origin_ecef(), before);
    }

    #[test]
    fn test_set_origin_point_local_world() {
        let mut session = session(CoordinateSystem::LocalWorld);
        let point = GeographicPoint::new(48.85, 2.35, 0.0).unwrap();
        session.set_origin_point(point);

        assert_eq!(session.origin_ecef(), point.to_ecef());
        assert_eq!(session.active_frame().origin_ecef, point.to_ecef());
        assert_eq!(
            session.backend().render_origin().map(|frame| frame.origin_ecef),
            Some(point.to_ecef())
        );
        let world = session.geographic_to_world_point(point);
        assert!(world.length() < 1e-3);
    }

    #[test]
    fn test_set_origin_point_ecef_moves_camera() {
        let mut session = session(CoordinateSystem::Ecef);
        let point = GeographicPoint::new(48.85, 2.35, 500.0).unwrap();

        // Without a viewer the origin just moves.
        session.set_origin_point(point);
        assert_eq!(session.active_frame().origin_ecef, point.to_ecef());

        session.set_controlled_viewer(Viewer::default());
        let other = GeographicPoint::new(35.0, 139.0, 0.0).unwrap();
        session.set_origin_point(other);
        assert_eq!(session.backend().camera().interest, other.lat_long());
    }

    #[test]
    fn test_camera_commands_require_viewer() {
        let mut session = session(CoordinateSystem::LocalWorld);
        let update = CameraUpdate::new().distance(1_000.0);
        assert_eq!(session.move_to(&update), Err(Error::NoControlledViewer));
        assert_eq!(
            session.animate_to(&update, &AnimationOptions::default()),
            Err(Error::NoControlledViewer)
        );
        let point = GeographicPoint::new(0.0, 0.0, 0.0).unwrap();
        assert_eq!(
            session.geographic_to_viewport_point(point),
            Err(Error::NoControlledViewer)
        );

        session.set_controlled_viewer(Viewer::default());
        assert!(session.move_to(&update).is_ok());
        assert_eq!(session.backend().camera().distance, 1_000.0);
        assert!(session.clear_controlled_viewer().is_some());
        assert!(session.controlled_viewer().is_none());
    }

    #[test]
    fn test_move_to_camera_position() {
        let mut session = session(CoordinateSystem::LocalWorld);
        session.set_controlled_viewer(Viewer::default());

        let interest = LatLong::new(0.0, 0.0).unwrap();
        let camera = GeographicPoint::new(0.0, 0.0, 800.0).unwrap();
        session.move_to_camera_position(interest, camera).unwrap();

        let orbit = session.backend().camera();
        assert_eq!(orbit.interest, interest);
        assert!((orbit.distance - 800.0).abs() < 1e-9);
        assert!(orbit.tilt_degrees.abs() < 1e-9);

        session
            .animate_to_camera_position(
                LatLong::new(0.001, 0.0).unwrap(),
                camera,
                &AnimationOptions::default().duration(1.0),
            )
            .unwrap();
        assert!(session.is_transitioning());
    }

    #[test]
    fn test_flattening_is_bypassed_indoors() {
        let config = MapConfig {
            environment_flattening_scale: 0.0,
            ..MapConfig::default()
        };
        let mut backend = GlobeBackend::new(OrbitCamera::default(), FlatTerrain { height: 300.0 });
        backend.load_indoor_map(
            "mall",
            IndoorMap {
                base_altitude: 300.0,
                floor_height: 4.0,
            },
        );
        let mut session = MapSession::new(config, backend).unwrap();
        session.set_controlled_viewer(Viewer::default());

        session.update(0.016);
        let raw = session.backend().camera_snapshot().interest_point_ecef;
        assert!((session.interest_point_ecef().length() - crate::EARTH_RADIUS).abs() < 1e-6);

        assert!(session.backend_mut().enter_indoor_map("mall"));
        session.update(0.016);
        assert_eq!(session.interest_point_ecef(), raw);
    }

    #[test]
    #[should_panic(expected = "uniform scale")]
    fn test_non_uniform_root_panics() {
        let mut session = session(CoordinateSystem::LocalWorld);
        session.set_render_root(RenderRoot {
            scale: Vec3::new(2.0, 1.0, 1.0),
            ..RenderRoot::default()
        });
        session.set_controlled_viewer(Viewer::default());
        session.update(0.016);
    }

    #[test]
    fn test_custom_camera_state() {
        let session = session(CoordinateSystem::LocalWorld);
        let TransformUpdateStrategy::FloatingOrigin(floating) = session.strategy() else {
            panic!("expected a floating origin");
        };
        let frame = *floating.frame();

        // 1 km above the frame origin, looking straight down.
        let viewer = Viewer {
            translation: Vec3::new(0.0, 1_000.0, 0.0),
            rotation: crate::look_rotation(Vec3::NEG_Y, Vec3::Z),
            ..Viewer::default()
        };
        let state = session.state_for_custom_camera(&viewer).unwrap();

        assert!((state.origin_ecef - frame.local_to_ecef(viewer.translation)).length() < 1e-6);
        assert!((state.interest_point_ecef - frame.origin_ecef()).length() < 1.0);

        // The view matrix turns the ECEF view direction into camera -Z.
        let down_ecef = frame.local_to_ecef_rotation() * Vec3::NEG_Y;
        let in_camera = state.view_matrix.transform_vector3(down_ecef);
        assert!((in_camera - Vec3::NEG_Z).length() < 1e-4);
        assert_eq!(state.projection, viewer.projection_matrix());
    }

    #[test]
    fn test_custom_camera_is_forwarded_and_validated() {
        let mut session = session(CoordinateSystem::Ecef);
        let viewer = Viewer::default();
        session.set_custom_render_camera(&viewer).unwrap();
        session.stream_resources_for_camera(&viewer).unwrap();
        assert!(session.backend().custom_render_camera().is_some());
        assert!(session.backend().last_streamed_camera().is_some());
        session.clear_custom_render_camera();
        assert!(session.backend().custom_render_camera().is_none());

        let degenerate = Viewer {
            near_clip: 0.0,
            ..Viewer::default()
        };
        assert!(matches!(
            session.set_custom_render_camera(&degenerate),
            Err(Error::InvalidCamera { .. })
        ));
        let flat = Viewer {
            field_of_view_degrees: 0.0,
            ..Viewer::default()
        };
        assert!(session.stream_resources_for_camera(&flat).is_err());
    }

    #[test]
    fn test_positioner_world_point_and_projection_signal() {
        let mut session = session(CoordinateSystem::LocalWorld);
        session.set_controlled_viewer(Viewer::default());
        session.update(0.016);
        assert!(session.take_positioner_projections_changed());

        // A still camera does not signal again.
        session.update(0.016);
        assert!(!session.take_positioner_projections_changed());

        let mut id = session
            .create_positioner(
                PositionerOptions::new()
                    .latitude_degrees(40.440_624)
                    .longitude_degrees(-79.995_888)
                    .elevation_above_ground(10.0),
            )
            .unwrap();
        assert!(session.take_positioner_projections_changed());

        // Altitude follows the ellipsoid normal, local up the radial.
        let world = session.try_fetch_positioner_world_point(id).unwrap();
        assert!((world - Vec3::new(0.0, 10.0, 0.0)).length() < 0.1);
        assert!(!session.is_positioner_behind_globe_horizon(id));
        assert!(session.try_fetch_positioner_screen_point(id).is_some());

        session.set_positioner_elevation(id, 20.0);
        let point = session.try_fetch_positioner_geographic(id).unwrap();
        assert!((point.altitude_meters() - 20.0).abs() < 1e-9);

        assert!(session.destroy_positioner(&mut id));
        assert!(session.try_fetch_positioner_world_point(id).is_none());
        assert!(!session.destroy_positioner(&mut id));
    }

    #[test]
    fn test_anchors_line_up_with_flattened_positioners() {
        let point = GeographicPoint::new(40.45, -79.99, 0.0).unwrap();
        for coordinate_system in [CoordinateSystem::LocalWorld, CoordinateSystem::Ecef] {
            let config = MapConfig {
                coordinate_system,
                environment_flattening_scale: 0.25,
                ..MapConfig::default()
            };
            let mut session = MapSession::new(config, GlobeBackend::default()).unwrap();
            session.set_controlled_viewer(Viewer::default());
            let id = session
                .create_positioner(
                    PositionerOptions::new()
                        .latitude_degrees(40.45)
                        .longitude_degrees(-79.99)
                        .elevation_above_sea_level(0.0),
                )
                .unwrap();
            session.update(0.016);

            let positioner = session.try_fetch_positioner_world_point(id).unwrap();
            let anchor = session.anchor_world_point(point);
            assert!(
                (positioner - anchor).length() < 1e-3,
                "{coordinate_system}: positioner {positioner} vs anchor {anchor}"
            );
            // Flattening lifts the point kilometres off the true ellipsoid.
            let unflattened = session.geographic_to_world_point(point);
            assert!((anchor - unflattened).length() > 1_000.0);
        }
    }

    #[test]
    fn test_anchors_ignore_flattening_indoors() {
        let config = MapConfig {
            environment_flattening_scale: 0.25,
            ..MapConfig::default()
        };
        let mut backend = GlobeBackend::default();
        backend.load_indoor_map(
            "mall",
            IndoorMap {
                base_altitude: 0.0,
                floor_height: 4.0,
            },
        );
        let mut session = MapSession::new(config, backend).unwrap();
        session.set_controlled_viewer(Viewer::default());
        assert!(session.backend_mut().enter_indoor_map("mall"));
        session.update(0.016);

        assert_eq!(session.active_frame().flattening_scale, 1.0);
        let point = GeographicPoint::new(40.45, -79.99, 12.0).unwrap();
        assert_eq!(
            session.anchor_world_point(point),
            session.geographic_to_world_point(point)
        );
    }

    #[test]
    fn test_anchor_rotation_follows_root_and_globe() {
        let config = MapConfig {
            environment_flattening_scale: 0.0,
            ..MapConfig::default()
        };
        let mut session = MapSession::new(config, GlobeBackend::default()).unwrap();
        let root_rotation = Quat::from_rotation_z(0.5);
        session.set_render_root(RenderRoot {
            rotation: root_rotation,
            ..RenderRoot::default()
        });
        session.update(0.016);

        let TransformUpdateStrategy::FloatingOrigin(floating) = session.strategy() else {
            panic!("expected a floating origin");
        };
        let frame = *floating.frame();

        // At the frame origin upright is the frame's own up.
        let here = frame.central_point();
        let up = session.anchor_world_rotation(here) * Vec3::Y;
        assert!((up - root_rotation * Vec3::Y).length() < 1e-5);

        // In globe view distant content leans with the curvature.
        let far = GeographicPoint::new(45.0, -79.995_888, 0.0).unwrap();
        let radial = frame.ecef_to_local_direction(far.to_ecef().normalize());
        let up = session.anchor_world_rotation(far) * Vec3::Y;
        assert!((up - root_rotation * radial).length() < 1e-4);
    }

    #[test]
    fn test_transition_events() {
        let mut session = session(CoordinateSystem::LocalWorld);
        session.set_controlled_viewer(Viewer::default());
        let animated = AnimationOptions::default().duration(1.0);

        session
            .animate_to(&CameraUpdate::new().distance(1_000.0), &animated)
            .unwrap();
        assert_eq!(session.take_transition_events(), vec![TransitionEvent::Started]);
        assert!(session.take_transition_events().is_empty());

        session.update(0.6);
        assert!(session.take_transition_events().is_empty());
        session.update(0.6);
        assert_eq!(session.take_transition_events(), vec![TransitionEvent::Ended]);

        // A jump cuts a running animation short.
        session
            .animate_to(&CameraUpdate::new().distance(3_000.0), &animated)
            .unwrap();
        session.move_to(&CameraUpdate::new().distance(2_000.0)).unwrap();
        assert_eq!(
            session.take_transition_events(),
            vec![TransitionEvent::Started, TransitionEvent::Ended]
        );
    }
}
