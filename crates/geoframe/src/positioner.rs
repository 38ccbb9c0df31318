//! User-created geographic anchors.
//!
//! Positioners are addressed by [`PositionerId`]. Ids are issued from a
//! monotonic counter and never reused within a session, so a stale id can
//! only ever miss.

use std::collections::HashMap;
use std::fmt;

use glam::{DVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::backend::MapBackend;
use crate::error::Result;
use crate::geodesy::{GeographicPoint, LatLong};

/// Handle to a positioner. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionerId(u64);

impl PositionerId {
    /// The sentinel left behind by [`PositionerRegistry::destroy`].
    pub const INVALID: Self = Self(0);

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for PositionerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a positioner's elevation is measured from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElevationMode {
    /// Relative to the terrain (or indoor floor) under the positioner.
    #[default]
    AboveGround,
    /// Relative to the ellipsoid.
    AboveSeaLevel,
}

/// Pins a positioner to an indoor map, optionally to one floor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndoorMapTarget {
    pub map_id: String,
    pub floor_id: Option<i32>,
}

/// Creation parameters for a positioner.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PositionerOptions {
    latitude_degrees: f64,
    longitude_degrees: f64,
    elevation: f64,
    elevation_mode: ElevationMode,
    indoor_map: Option<IndoorMapTarget>,
}

impl PositionerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn latitude_degrees(mut self, latitude_degrees: f64) -> Self {
        self.latitude_degrees = latitude_degrees;
        self
    }

    #[must_use]
    pub fn longitude_degrees(mut self, longitude_degrees: f64) -> Self {
        self.longitude_degrees = longitude_degrees;
        self
    }

    #[must_use]
    pub fn elevation_above_ground(mut self, elevation: f64) -> Self {
        self.elevation = elevation;
        self.elevation_mode = ElevationMode::AboveGround;
        self
    }

    #[must_use]
    pub fn elevation_above_sea_level(mut self, elevation: f64) -> Self {
        self.elevation = elevation;
        self.elevation_mode = ElevationMode::AboveSeaLevel;
        self
    }

    /// Place on an indoor map's default floor.
    #[must_use]
    pub fn indoor_map(mut self, map_id: impl Into<String>) -> Self {
        self.indoor_map = Some(IndoorMapTarget {
            map_id: map_id.into(),
            floor_id: None,
        });
        self
    }

    #[must_use]
    pub fn indoor_map_with_floor_id(mut self, map_id: impl Into<String>, floor_id: i32) -> Self {
        self.indoor_map = Some(IndoorMapTarget {
            map_id: map_id.into(),
            floor_id: Some(floor_id),
        });
        self
    }
}

/// The registry's record of one positioner's target state.
#[derive(Debug, Clone, PartialEq)]
pub struct Positioner {
    id: PositionerId,
    location: LatLong,
    elevation: f64,
    elevation_mode: ElevationMode,
    indoor_map: Option<IndoorMapTarget>,
}

impl Positioner {
    #[must_use]
    pub fn id(&self) -> PositionerId {
        self.id
    }

    #[must_use]
    pub fn location(&self) -> LatLong {
        self.location
    }

    #[must_use]
    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    #[must_use]
    pub fn elevation_mode(&self) -> ElevationMode {
        self.elevation_mode
    }

    #[must_use]
    pub fn indoor_map(&self) -> Option<&IndoorMapTarget> {
        self.indoor_map.as_ref()
    }

    #[must_use]
    pub fn indoor_map_id(&self) -> Option<&str> {
        self.indoor_map.as_ref().map(|target| target.map_id.as_str())
    }

    #[must_use]
    pub fn indoor_map_floor_id(&self) -> Option<i32> {
        self.indoor_map.as_ref().and_then(|target| target.floor_id)
    }
}

/// Arena of live positioners keyed by id.
///
/// Every mutation is forwarded to the backend. Operations on unknown ids are
/// no-ops and queries on them report "not resolvable".
#[derive(Debug)]
pub struct PositionerRegistry {
    next_id: u64,
    positioners: HashMap<PositionerId, Positioner>,
    projections_changed: bool,
}

impl Default for PositionerRegistry {
    fn default() -> Self {
        Self {
            next_id: 1,
            positioners: HashMap::new(),
            projections_changed: false,
        }
    }
}

impl PositionerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a positioner and hand it to the backend.
    ///
    /// Fails only if the options carry an out-of-range latitude/longitude.
    pub fn create<B: MapBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        options: PositionerOptions,
    ) -> Result<PositionerId> {
        let location = LatLong::new(options.latitude_degrees, options.longitude_degrees)?;

        let id = PositionerId(self.next_id);
        self.next_id += 1;

        let positioner = Positioner {
            id,
            location,
            elevation: options.elevation,
            elevation_mode: options.elevation_mode,
            indoor_map: options.indoor_map,
        };
        backend.create_positioner(&positioner);
        self.positioners.insert(id, positioner);

        tracing::debug!(%id, live = self.positioners.len(), "created positioner");
        self.mark_projections_changed();
        Ok(id)
    }

    /// Remove a positioner and reset the caller's handle to
    /// [`PositionerId::INVALID`].
    ///
    /// Idempotent: returns `false` when there was nothing to remove.
    pub fn destroy<B: MapBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        id: &mut PositionerId,
    ) -> bool {
        let target = std::mem::replace(id, PositionerId::INVALID);
        if self.positioners.remove(&target).is_none() {
            return false;
        }

        backend.destroy_positioner(target);
        tracing::debug!(id = %target, live = self.positioners.len(), "destroyed positioner");
        self.mark_projections_changed();
        true
    }

    pub fn set_location<B: MapBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        id: PositionerId,
        location: LatLong,
    ) {
        let Some(positioner) = self.get_mut_or_log(id, "set_location") else {
            return;
        };
        positioner.location = location;
        backend.set_positioner_location(id, location);
        self.mark_projections_changed();
    }

    pub fn set_elevation<B: MapBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        id: PositionerId,
        elevation: f64,
    ) {
        let Some(positioner) = self.get_mut_or_log(id, "set_elevation") else {
            return;
        };
        positioner.elevation = elevation;
        backend.set_positioner_elevation(id, elevation);
        self.mark_projections_changed();
    }

    pub fn set_elevation_mode<B: MapBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        id: PositionerId,
        elevation_mode: ElevationMode,
    ) {
        let Some(positioner) = self.get_mut_or_log(id, "set_elevation_mode") else {
            return;
        };
        positioner.elevation_mode = elevation_mode;
        backend.set_positioner_elevation_mode(id, elevation_mode);
        self.mark_projections_changed();
    }

    /// Move a positioner onto an indoor map, or back outdoors with `None`.
    pub fn set_indoor_map<B: MapBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        id: PositionerId,
        indoor_map: Option<IndoorMapTarget>,
    ) {
        let Some(positioner) = self.get_mut_or_log(id, "set_indoor_map") else {
            return;
        };
        backend.set_positioner_indoor_map(id, indoor_map.as_ref());
        positioner.indoor_map = indoor_map;
        self.mark_projections_changed();
    }

    #[must_use]
    pub fn try_fetch_ecef_location<B: MapBackend + ?Sized>(
        &self,
        backend: &B,
        id: PositionerId,
    ) -> Option<DVec3> {
        self.contains(id)
            .then(|| backend.try_fetch_positioner_ecef(id))
            .flatten()
    }

    /// Screen position in pixels from the top-left corner, `z` being depth.
    #[must_use]
    pub fn try_fetch_screen_point<B: MapBackend + ?Sized>(
        &self,
        backend: &B,
        id: PositionerId,
    ) -> Option<Vec3> {
        self.contains(id)
            .then(|| backend.try_fetch_positioner_screen_point(id))
            .flatten()
    }

    #[must_use]
    pub fn try_fetch_geographic_position<B: MapBackend + ?Sized>(
        &self,
        backend: &B,
        id: PositionerId,
    ) -> Option<GeographicPoint> {
        self.contains(id)
            .then(|| backend.try_fetch_positioner_geographic(id))
            .flatten()
    }

    #[must_use]
    pub fn is_behind_globe_horizon<B: MapBackend + ?Sized>(
        &self,
        backend: &B,
        id: PositionerId,
    ) -> bool {
        self.contains(id) && backend.is_positioner_behind_globe_horizon(id)
    }

    #[must_use]
    pub fn get(&self, id: PositionerId) -> Option<&Positioner> {
        self.positioners.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: PositionerId) -> bool {
        self.positioners.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Positioner> {
        self.positioners.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positioners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positioners.is_empty()
    }

    /// Flag that every positioner's projection may have moved.
    pub fn mark_projections_changed(&mut self) {
        self.projections_changed = true;
    }

    /// Read and clear the projections-changed flag.
    pub fn take_projections_changed(&mut self) -> bool {
        std::mem::take(&mut self.projections_changed)
    }

    fn get_mut_or_log(&mut self, id: PositionerId, operation: &str) -> Option<&mut Positioner> {
        let positioner = self.positioners.get_mut(&id);
        if positioner.is_none() {
            tracing::debug!(%id, operation, "ignoring operation on unknown positioner");
        }
        positioner
    }
}
