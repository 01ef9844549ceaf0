use crate::error::{JResult, NavError};
use crate::filter::TripSnapshot;
use crate::fix::Coordinate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persisted trip state: three independent optional scalars
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedTrip {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_longitude: Option<f64>,
}

impl PersistedTrip {
    pub fn distance_or_zero(&self) -> f64 {
        self.total_distance.unwrap_or(0.0)
    }

    /// Reference coordinate, only when both halves were stored
    pub fn reference(&self) -> Option<Coordinate> {
        match (self.last_latitude, self.last_longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    /// Apply a snapshot. Coordinates are left as they were when the
    /// snapshot carries no reference.
    pub fn merge(&mut self, snapshot: &TripSnapshot) {
        self.total_distance = Some(snapshot.distance_meters);
        if let Some(reference) = snapshot.reference {
            self.last_latitude = Some(reference.latitude);
            self.last_longitude = Some(reference.longitude);
        }
    }
}

/// Key-value collaborator holding trip state across restarts
pub trait TripStore: Send + Sync {
    fn load(&self) -> JResult<PersistedTrip>;

    fn store(&self, snapshot: &TripSnapshot) -> JResult<()>;
}

/// In-process store, used by tests and when no file path is configured
#[derive(Default)]
pub struct MemoryTripStore {
    trip: Mutex<PersistedTrip>,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trip(trip: PersistedTrip) -> Self {
        Self {
            trip: Mutex::new(trip),
        }
    }
}

impl TripStore for MemoryTripStore {
    fn load(&self) -> JResult<PersistedTrip> {
        let trip = self.trip.lock().map_err(|_| {
            NavError::Internal("Failed to acquire trip store lock".to_string())
        })?;
        Ok(*trip)
    }

    fn store(&self, snapshot: &TripSnapshot) -> JResult<()> {
        let mut trip = self.trip.lock().map_err(|_| {
            NavError::Internal("Failed to acquire trip store lock".to_string())
        })?;
        trip.merge(snapshot);
        Ok(())
    }
}

/// JSON file store in the app's files directory
pub struct JsonFileTripStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileTripStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> JResult<PersistedTrip> {
        if !self.path.exists() {
            return Ok(PersistedTrip::default());
        }
        let bytes = fs::read(&self.path)?;
        match serde_json::from_slice(&bytes) {
            Ok(trip) => Ok(trip),
            Err(e) => {
                warn!(
                    "Discarding unreadable trip state at {}: {}",
                    self.path.display(),
                    e
                );
                Ok(PersistedTrip::default())
            }
        }
    }
}

impl TripStore for JsonFileTripStore {
    fn load(&self) -> JResult<PersistedTrip> {
        self.read()
    }

    fn store(&self, snapshot: &TripSnapshot) -> JResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| {
            NavError::Internal("Failed to acquire trip file lock".to_string())
        })?;

        let mut trip = self.read()?;
        trip.merge(snapshot);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&trip)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
