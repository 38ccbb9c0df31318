//! Drives a [`MapSession`] from the ECS.
//!
//! The session owns the camera: input is forwarded to the backend, the
//! session runs once per frame and the resulting viewer is written onto the
//! Bevy camera. Anchored entities are then placed in the new render space.

use bevy::ecs::message::MessageReader;
use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::transform::TransformSystems;
use bevy::window::PrimaryWindow;
use geoframe::globe::OrbitInput;
use geoframe::{
    AnimationOptions, CameraUpdate, FrameOutcome, GeographicPoint, GlobeBackend, MapSession,
    PositionerId, PositionerOptions, RenderRoot, Viewer,
};

/// Plugin for the map session and everything placed by it.
pub struct MapPlugin;

impl Plugin for MapPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OrbitSettings>()
            .add_systems(Startup, (setup_map, spawn_markers).chain())
            .add_systems(
                Update,
                (
                    orbit_input,
                    toggle_flattening,
                    return_to_start,
                    sync_map_camera,
                    follow_local_up,
                )
                    .chain(),
            )
            .add_systems(
                PostUpdate,
                (place_geographic_anchors, place_positioner_markers)
                    .before(TransformSystems::Propagate),
            );
    }
}

/// The running map.
#[derive(Resource)]
pub struct Map {
    pub session: MapSession<GlobeBackend>,
    /// Where [`return_to_start`] flies back to.
    pub start: CameraUpdate,
}

impl Map {
    pub fn new(session: MapSession<GlobeBackend>) -> Self {
        let camera = session.backend().camera();
        let start = CameraUpdate::new()
            .target(camera.interest)
            .distance(camera.distance)
            .heading(camera.heading_degrees)
            .tilt(camera.tilt_degrees);
        Self { session, start }
    }
}

/// Input tuning for the orbit camera.
#[derive(Resource)]
pub struct OrbitSettings {
    /// Pan speed as a fraction of the distance to the interest point, per second.
    pub pan_speed: f64,
    /// Degrees per second.
    pub rotate_speed: f64,
    /// Degrees per second.
    pub tilt_speed: f64,
    /// Distance multiplier per scroll line.
    pub zoom_step: f64,
    /// Flattening scale used when flattening is toggled on.
    pub flattened_scale: f64,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            pan_speed: 0.5,
            rotate_speed: 60.0,
            tilt_speed: 30.0,
            zoom_step: 0.9,
            flattened_scale: 0.25,
        }
    }
}

/// Root of the map's render space.
#[derive(Component)]
pub struct MapRoot;

/// The Bevy camera controlled by the session.
#[derive(Component)]
pub struct MapCamera;

/// The scene's directional light, kept overhead in map space.
#[derive(Component)]
pub struct Sun;

/// Keeps an entity at a fixed geographic point, upright on the globe.
#[derive(Component, Clone, Debug)]
pub struct GeographicAnchor {
    pub point: GeographicPoint,
}

/// Keeps an entity on a backend-resolved positioner.
#[derive(Component, Clone, Copy, Debug)]
pub struct PositionerMarker {
    pub id: PositionerId,
}

/// Spawn the render root, the camera and a light.
fn setup_map(mut commands: Commands, mut map: ResMut<Map>) {
    commands.spawn((MapRoot, Transform::IDENTITY));

    commands.spawn((
        Camera3d::default(),
        Camera {
            clear_color: bevy::camera::ClearColorConfig::Custom(Color::BLACK),
            ..default()
        },
        Transform::default(),
        Projection::Perspective(PerspectiveProjection::default()),
        MapCamera,
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 10_000.0,
            ..default()
        },
        Transform::default(),
        Sun,
    ));

    map.session.set_controlled_viewer(Viewer::default());

    tracing::info!(
        coordinate_system = %map.session.coordinate_system(),
        "Map setup complete - WASD to pan, Q/E to rotate, R/F to tilt, scroll to zoom"
    );
}

/// Spawn a pillar anchored at the start point and a ring of positioners
/// around it.
fn spawn_markers(
    mut commands: Commands,
    mut map: ResMut<Map>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let Some(start) = map.start.target_value() else {
        return;
    };

    let anchor_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.9, 0.6, 0.1),
        unlit: true,
        ..default()
    });
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(20.0, 20.0, 20.0))),
        MeshMaterial3d(anchor_material),
        Transform::default(),
        GeographicAnchor {
            point: start.with_altitude(0.0),
        },
    ));

    let marker_mesh = meshes.add(Sphere::new(15.0));
    let marker_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.2, 0.7, 1.0),
        unlit: true,
        ..default()
    });

    for step in 0..8_u32 {
        let bearing = f64::from(step) * 45.0;
        let location = geoframe::destination(start, bearing, 1_000.0);
        let options = PositionerOptions::new()
            .latitude_degrees(location.latitude_degrees())
            .longitude_degrees(location.longitude_degrees())
            .elevation_above_ground(50.0);

        match map.session.create_positioner(options) {
            Ok(id) => {
                commands.spawn((
                    Mesh3d(marker_mesh.clone()),
                    MeshMaterial3d(marker_material.clone()),
                    Transform::default(),
                    Visibility::Hidden,
                    PositionerMarker { id },
                ));
            }
            Err(err) => tracing::warn!(%err, bearing, "failed to create positioner"),
        }
    }
}

/// Turn keyboard and scroll input into an orbit step for the backend.
fn orbit_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut scroll_events: MessageReader<MouseWheel>,
    time: Res<Time>,
    settings: Res<OrbitSettings>,
    mut map: ResMut<Map>,
) {
    let dt = f64::from(time.delta_secs());
    let pan = map.session.backend().camera().distance * settings.pan_speed * dt;
    let axis = |positive: KeyCode, negative: KeyCode| {
        f64::from(u8::from(keyboard.pressed(positive))) - f64::from(u8::from(keyboard.pressed(negative)))
    };

    let mut input = OrbitInput {
        pan_forward: axis(KeyCode::KeyW, KeyCode::KeyS) * pan,
        pan_right: axis(KeyCode::KeyD, KeyCode::KeyA) * pan,
        rotate_degrees: axis(KeyCode::KeyE, KeyCode::KeyQ) * settings.rotate_speed * dt,
        tilt_degrees: axis(KeyCode::KeyR, KeyCode::KeyF) * settings.tilt_speed * dt,
        zoom_factor: 0.0,
    };

    let mut scroll = 0.0;
    for event in scroll_events.read() {
        // Normalize scroll value: web reports pixels, native reports lines.
        scroll += match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / 120.0,
        };
    }
    if scroll != 0.0 {
        input.zoom_factor = settings.zoom_step.powf(f64::from(scroll));
    }

    if input != OrbitInput::default() && !map.session.backend_mut().apply_input(&input) {
        tracing::trace!("input ignored during camera transition");
    }
}

/// Toggle environment flattening with G.
fn toggle_flattening(
    keyboard: Res<ButtonInput<KeyCode>>,
    settings: Res<OrbitSettings>,
    mut map: ResMut<Map>,
) {
    if !keyboard.just_pressed(KeyCode::KeyG) {
        return;
    }

    let scale = if map.session.environment_flattening_scale() < 1.0 {
        1.0
    } else {
        settings.flattened_scale
    };
    map.session.set_environment_flattening_scale(scale);
    tracing::info!(scale, "environment flattening changed");
}

/// Fly back to the start with Space.
fn return_to_start(keyboard: Res<ButtonInput<KeyCode>>, mut map: ResMut<Map>) {
    if !keyboard.just_pressed(KeyCode::Space) {
        return;
    }

    let start = map.start;
    if let Err(err) = map.session.animate_to(&start, &AnimationOptions::default()) {
        tracing::warn!(%err, "cannot return to start");
    }
}

/// Run the session for this frame and copy the viewer onto the camera.
fn sync_map_camera(
    time: Res<Time>,
    window: Single<&Window, With<PrimaryWindow>>,
    root: Single<&Transform, (With<MapRoot>, Without<MapCamera>)>,
    camera: Single<(&mut Transform, &mut Projection), With<MapCamera>>,
    mut map: ResMut<Map>,
) {
    map.session.set_render_root(RenderRoot {
        translation: root.translation,
        rotation: root.rotation,
        scale: root.scale,
    });
    if let Some(viewer) = map.session.controlled_viewer_mut() {
        viewer.viewport_size = Vec2::new(window.width(), window.height());
    }

    let outcome = map.session.update(time.delta_secs());
    for event in map.session.take_transition_events() {
        tracing::debug!(?event, "camera transition");
    }
    if outcome != FrameOutcome::Synchronized {
        return;
    }
    let Some(viewer) = map.session.controlled_viewer() else {
        return;
    };

    let (mut transform, mut projection) = camera.into_inner();
    transform.translation = viewer.translation;
    transform.rotation = viewer.rotation;
    if let Projection::Perspective(perspective) = projection.as_mut() {
        perspective.fov = viewer.field_of_view_degrees.to_radians();
        perspective.near = viewer.near_clip;
        perspective.far = viewer.far_clip;
    }
}

/// Light the map from above, whichever way up render space is.
fn follow_local_up(
    map: Res<Map>,
    root: Single<&Transform, (With<MapRoot>, Without<Sun>)>,
    mut sun: Single<&mut Transform, With<Sun>>,
) {
    let up = root.rotation * map.session.active_frame().local_up;
    let across = up.any_orthonormal_vector();
    **sun = Transform::default().looking_to(-up - across * 0.3, across);
}

/// Anchors follow environment flattening like streamed content does.
fn place_geographic_anchors(
    map: Res<Map>,
    mut anchors: Query<(&GeographicAnchor, &mut Transform), Without<MapCamera>>,
) {
    for (anchor, mut transform) in &mut anchors {
        transform.translation = map.session.anchor_world_point(anchor.point);
        transform.rotation = map.session.anchor_world_rotation(anchor.point);
    }
}

/// Move positioner markers when their projections may have changed. Markers
/// that are unresolved or behind the horizon are hidden.
fn place_positioner_markers(
    mut map: ResMut<Map>,
    mut markers: Query<(&PositionerMarker, &mut Transform, &mut Visibility)>,
) {
    if !map.session.take_positioner_projections_changed() {
        return;
    }

    for (marker, mut transform, mut visibility) in &mut markers {
        let world = map
            .session
            .try_fetch_positioner_world_point(marker.id)
            .filter(|_| !map.session.is_positioner_behind_globe_horizon(marker.id));

        match world {
            Some(world) => {
                transform.translation = world;
                *visibility = Visibility::Inherited;
            }
            None => *visibility = Visibility::Hidden,
        }
    }
}
