use log::{info, warn};

use super::checkpoint::CheckpointStore;
use super::config::TrackerConfig;
use super::ports::{PersistError, PersistenceIo};
use super::telemetry;
use super::types::{Fix, Timestamp, Waypoint, WaypointReached};

pub const EARTH_RADIUS_KM: f64 = 6378.388;

/// Haversine distance in meters.
pub fn distance_m(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let lat1 = from_lat.to_radians();
    let lat2 = to_lat.to_radians();
    let half_dlat = (to_lat - from_lat).to_radians() / 2.0;
    let half_dlon = (to_lon - from_lon).to_radians() / 2.0;
    let a = libm::sin(half_dlat) * libm::sin(half_dlat)
        + libm::cos(lat1) * libm::cos(lat2) * libm::sin(half_dlon) * libm::sin(half_dlon);
    let c = 2.0 * libm::atan2(libm::sqrt(a), libm::sqrt(1.0 - a));
    EARTH_RADIUS_KM * c * 1000.0
}

/// Walks the route in order and owns the persisted progress.
pub struct GeofenceTracker<'c, P: PersistenceIo> {
    route: &'c [Waypoint],
    arrival_radius_m: f64,
    minimal_accuracy_m: f64,
    store: CheckpointStore<P>,
    last_position: Option<Fix>,
}

impl<'c, P: PersistenceIo> GeofenceTracker<'c, P> {
    pub fn new(config: &'c TrackerConfig, mut store: CheckpointStore<P>) -> Self {
        store.clamp_visited(config.route.len() as u32);
        Self {
            route: config.route.as_slice(),
            arrival_radius_m: config.arrival_radius_m,
            minimal_accuracy_m: config.minimal_accuracy_m,
            store,
            last_position: None,
        }
    }

    pub fn visited_waypoint_count(&self) -> u32 {
        self.store.checkpoint().visited_waypoint_count
    }

    pub fn is_route_complete(&self) -> bool {
        self.visited_waypoint_count() as usize >= self.route.len()
    }

    pub fn next_waypoint(&self) -> Option<&'c Waypoint> {
        self.route.get(self.visited_waypoint_count() as usize)
    }

    pub fn last_position(&self) -> Option<Fix> {
        self.last_position
    }

    /// Pure: no progress is made and nothing is written.
    pub fn distance_to_next_waypoint(&self, fix: &Fix) -> Option<f64> {
        let next = self.next_waypoint()?;
        Some(distance_m(
            fix.latitude,
            fix.longitude,
            next.latitude,
            next.longitude,
        ))
    }

    pub fn distance_from_last_position(&self) -> Option<f64> {
        let position = self.last_position?;
        self.distance_to_next_waypoint(&position)
    }

    /// Advances the route by one waypoint when `fix` lies inside the arrival
    /// radius. The checkpoint is written before the event is returned.
    pub fn check_arrival(&mut self, fix: &Fix, accuracy_m: f64) -> Option<WaypointReached> {
        if !fix.in_range() {
            return None;
        }
        if !(accuracy_m.is_finite() && accuracy_m <= self.minimal_accuracy_m) {
            return None;
        }
        self.last_position = Some(*fix);

        let index = self.visited_waypoint_count() as usize;
        let waypoint = self.route.get(index)?;
        let distance = distance_m(
            fix.latitude,
            fix.longitude,
            waypoint.latitude,
            waypoint.longitude,
        );
        if distance > self.arrival_radius_m {
            return None;
        }

        let visited = index as u32 + 1;
        let persisted = self.store.record_visited(visited);
        telemetry::record_waypoint_reached();
        if persisted {
            info!(
                "geofence: reached waypoint id={} index={} distance_m={:.1}",
                waypoint.id, index, distance
            );
        } else {
            warn!(
                "geofence: reached waypoint id={} index={} but checkpoint write failed",
                waypoint.id, index
            );
        }
        Some(WaypointReached {
            index,
            waypoint: waypoint.clone(),
            distance_m: distance,
            visited_waypoint_count: visited,
            persisted,
        })
    }

    /// Records the boot's reset time. Returns whether it reached storage.
    pub fn stamp_reset_time(&mut self, now: Timestamp) -> bool {
        let persisted = self.store.record_reset_time(now);
        info!("geofence: reset time stamped at={} persisted={}", now, persisted);
        persisted
    }

    /// Handed to the link machine only, for the assistance timestamp.
    pub(super) fn checkpoint_store_mut(&mut self) -> &mut CheckpointStore<P> {
        &mut self.store
    }

    pub fn checkpoint_store(&self) -> &CheckpointStore<P> {
        &self.store
    }

    pub fn reset_progress(&mut self) -> Result<(), PersistError> {
        self.last_position = None;
        self.store.clear()
    }

    pub fn into_store(self) -> CheckpointStore<P> {
        self.store
    }
}
