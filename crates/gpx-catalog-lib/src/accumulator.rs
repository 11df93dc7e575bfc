//! Pending waypoints for the next route commit
//!
//! Waypoints are appended one at a time and drained all at once when a route is committed.
//! The accumulator is emptied by every commit attempt, whether the write succeeds or not.

use crate::{CatalogError, DocumentAdapter, Result, is_absent, utils, wire};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// A waypoint waiting to become part of a route
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingWaypoint {
    pub lat: f64,
    pub lon: f64,
}

impl PendingWaypoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Parse and range-check a coordinate pair given as text
    pub fn parse(lat: &str, lon: &str) -> Result<Self> {
        let parse = |value: &str| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| CatalogError::CoordinateOutOfRange(format!("not a number: {value:?}")))
        };
        let lat = parse(lat)?;
        let lon = parse(lon)?;
        if !utils::is_valid_coordinate(lat, lon) {
            return Err(CatalogError::CoordinateOutOfRange(format!("({lat}, {lon})")));
        }
        Ok(Self { lat, lon })
    }
}

/// Outcome of a successful route commit
#[derive(Clone, Debug, PartialEq)]
pub struct CommitReceipt {
    pub file_name: String,
    pub route_name: String,
    pub waypoints: usize,
}

/// Ordered, unbounded list of pending waypoints
#[derive(Debug, Default)]
pub struct WaypointAccumulator {
    pending: Mutex<Vec<PendingWaypoint>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl WaypointAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingWaypoint>> {
        // A panic while holding the lock leaves a plain Vec behind, still usable
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a waypoint unless either coordinate is the absent sentinel
    ///
    /// # Returns
    /// The blob of every pending waypoint after the call. Invalid coordinates are rejected
    /// and nothing is appended.
    pub fn add_waypoint(&self, lat: &str, lon: &str) -> Result<String> {
        let mut pending = self.lock();
        if !is_absent(lat) && !is_absent(lon) {
            let waypoint = PendingWaypoint::parse(lat, lon)?;
            pending.push(waypoint);
            tracing::debug!(
                lat = waypoint.lat,
                lon = waypoint.lon,
                pending = pending.len(),
                "Waypoint queued"
            );
        }
        wire::encode_waypoint_blob(&pending)
    }

    /// Snapshot of the pending waypoints
    pub fn pending(&self) -> Vec<PendingWaypoint> {
        self.lock().clone()
    }

    /// Current blob without modifying anything
    pub fn blob(&self) -> Result<String> {
        wire::encode_waypoint_blob(&self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drain every pending waypoint into a new route of `dir/file_name`
    ///
    /// An absent `file_name` is a no-op that keeps the pending waypoints. Any other call
    /// leaves the accumulator empty; on failure the drained waypoints come back inside
    /// [`CatalogError::RouteCommit`].
    pub fn commit_route(
        &self,
        adapter: &dyn DocumentAdapter,
        dir: &Path,
        file_name: &str,
        route_name: &str,
    ) -> Result<Option<CommitReceipt>> {
        if is_absent(file_name) {
            return Ok(None);
        }
        let route_name = if is_absent(route_name) { "" } else { route_name };

        // Held across the adapter call so a concurrent add cannot slip between drain and write
        let mut pending = self.lock();
        let drained = std::mem::take(&mut *pending);

        let written = if utils::is_gpx_file_name(file_name) {
            adapter.add_route(&dir.join(file_name), route_name, &drained)
        } else {
            Err(CatalogError::NotGpxFile(file_name.to_string()))
        };

        match written {
            Ok(()) => {
                tracing::info!(
                    file = file_name,
                    route = route_name,
                    waypoints = drained.len(),
                    "Route committed"
                );
                Ok(Some(CommitReceipt {
                    file_name: file_name.to_string(),
                    route_name: route_name.to_string(),
                    waypoints: drained.len(),
                }))
            }
            Err(source) => {
                tracing::warn!(
                    file = file_name,
                    discarded = drained.len(),
                    "Route commit failed, pending waypoints discarded: {source}"
                );
                Err(CatalogError::RouteCommit {
                    file: file_name.to_string(),
                    discarded: drained,
                    source: Box::new(source),
                })
            }
        }
    }
}
