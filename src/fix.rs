use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and inside [-90, 90] x [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Raw location fix from Android LocationManager
///
/// Optional fields mirror `Location.hasAccuracy()`, `hasSpeed()` and
/// `hasBearing()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    pub coordinate: Coordinate,
    /// 1-sigma horizontal accuracy radius (meters)
    #[serde(default)]
    pub accuracy_meters: Option<f32>,
    #[serde(default)]
    pub speed_mps: Option<f32>,
    /// Ground track, degrees clockwise from true north
    #[serde(default)]
    pub bearing_deg: Option<f32>,
    pub timestamp: DateTime<Utc>,
}

impl RawFix {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate: Coordinate::new(latitude, longitude),
            accuracy_meters: None,
            speed_mps: None,
            bearing_deg: None,
            timestamp,
        }
    }

    pub fn with_accuracy(mut self, accuracy_meters: f32) -> Self {
        self.accuracy_meters = Some(accuracy_meters);
        self
    }

    pub fn with_speed(mut self, speed_mps: f32) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    pub fn with_bearing(mut self, bearing_deg: f32) -> Self {
        self.bearing_deg = Some(bearing_deg);
        self
    }

    /// Accuracy usable by the filter (present, finite, non-negative)
    pub fn usable_accuracy(&self) -> Option<f32> {
        self.accuracy_meters.filter(|a| a.is_finite() && *a >= 0.0)
    }

    pub fn usable_speed(&self) -> Option<f32> {
        self.speed_mps.filter(|s| s.is_finite() && *s >= 0.0)
    }

    /// Bearing normalised into [0, 360)
    pub fn usable_bearing(&self) -> Option<f32> {
        self.bearing_deg
            .filter(|b| b.is_finite())
            .map(|b| {
                let wrapped = b.rem_euclid(360.0);
                // rem_euclid can round up to exactly 360.0 for tiny negatives
                if wrapped >= 360.0 {
                    0.0
                } else {
                    wrapped
                }
            })
    }
}
