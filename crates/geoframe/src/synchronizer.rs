//! Per-frame transfer of the backend camera onto the host viewer.
//!
//! The order within a frame is fixed: snapshot, derive, apply, re-centre.
//! [`MapSession::update`](crate::MapSession::update) drives these steps; they
//! are exposed separately so each can be exercised on its own.

use glam::DVec3;

use crate::camera::{CameraSnapshot, LookAt, calculate_look_at};
use crate::interest::InterestPointProvider;
use crate::spaces::RenderSpace;
use crate::strategy::scale_point_with_flattening;
use crate::viewer::{RenderRoot, Viewer, look_rotation};

/// Apply environment flattening to the snapshot's interest point.
///
/// Indoor maps are always shown at true scale, so flattening is bypassed
/// while one is active.
#[must_use]
pub fn scale_interest_point(
    interest_point_ecef: DVec3,
    flattening_scale: f64,
    indoor_map_active: bool,
) -> DVec3 {
    let scale = if indoor_map_active { 1.0 } else { flattening_scale };
    scale_point_with_flattening(interest_point_ecef, scale)
}

/// Camera placement for a snapshot, in (flattened) ECEF.
#[must_use]
pub fn calculate_camera_parameters(
    snapshot: &CameraSnapshot,
    flattening_scale: f64,
    indoor_map_active: bool,
) -> (LookAt, DVec3) {
    let interest_point_ecef = scale_interest_point(
        snapshot.interest_point_ecef,
        flattening_scale,
        indoor_map_active,
    );
    let look_at = calculate_look_at(
        interest_point_ecef,
        snapshot.interest_basis_forward_ecef,
        snapshot.pitch_degrees.to_radians(),
        snapshot.distance_to_interest,
    );
    (look_at, interest_point_ecef)
}

/// Write the snapshot's projection and a derived transform onto `viewer`.
///
/// Records the scaled interest point with `interest` and returns the camera
/// placement that was applied.
///
/// # Panics
///
/// Panics if the render root's scale is not uniform.
pub fn apply_native_camera_state(
    snapshot: &CameraSnapshot,
    flattening_scale: f64,
    indoor_map_active: bool,
    space: RenderSpace<'_>,
    root: &RenderRoot,
    viewer: &mut Viewer,
    interest: &mut InterestPointProvider,
) -> LookAt {
    let map_scale = root.uniform_scale();

    viewer.field_of_view_degrees = snapshot.field_of_view_degrees;
    viewer.near_clip = snapshot.near_clip * map_scale;
    viewer.far_clip = snapshot.far_clip * map_scale;

    let (look_at, interest_point_ecef) =
        calculate_camera_parameters(snapshot, flattening_scale, indoor_map_active);
    interest.update_from_native(interest_point_ecef);

    let map_position = space.ecef_to_map(look_at.position_ecef);
    let view_direction = space.ecef_to_map_direction(interest_point_ecef - look_at.position_ecef);
    let up = space.ecef_to_map_direction(look_at.up);

    viewer.translation = root.transform_point(map_position);
    viewer.rotation = root.rotation * look_rotation(view_direction, up);
    look_at
}

/// Fold the viewer's offset from the render root back into the ECEF origin
/// and move the viewer onto the root.
///
/// Only meaningful in ECEF mode, where map space has ECEF axes.
pub fn recenter_on_viewer(origin_ecef: &mut DVec3, root: &RenderRoot, viewer: &mut Viewer) {
    let map_space_camera = root.inverse_transform_point(viewer.translation);
    *origin_ecef += map_space_camera.as_dvec3();
    viewer.translation = root.translation;
}
