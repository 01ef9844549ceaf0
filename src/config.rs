use crate::error::{JResult, NavError};
use serde::{Deserialize, Serialize};

/// Reject fixes whose accuracy radius exceeds this (meters, ~0.5 arc second)
pub const ACCURACY_GATE_METERS: f32 = 15.43;

/// Shortest movement counted towards trip distance (meters, 0.1 NM)
pub const MIN_TRIP_SEGMENT_METERS: f64 = 185.2;

/// Reported speeds below this display as zero (m/s, ~1 kn)
pub const MIN_SPEED_MPS: f32 = 0.51;

/// Tuning parameters for the position filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub accuracy_gate_meters: f32,
    pub min_trip_segment_meters: f64,
    pub min_speed_mps: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            accuracy_gate_meters: ACCURACY_GATE_METERS,
            min_trip_segment_meters: MIN_TRIP_SEGMENT_METERS,
            min_speed_mps: MIN_SPEED_MPS,
        }
    }
}

impl FilterConfig {
    /// Parse from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> JResult<Self> {
        let config: FilterConfig = serde_json::from_str(json)
            .map_err(|e| NavError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> JResult<()> {
        if !self.accuracy_gate_meters.is_finite() || self.accuracy_gate_meters <= 0.0 {
            return Err(NavError::InvalidConfig(format!(
                "accuracy_gate_meters must be positive, got {}",
                self.accuracy_gate_meters
            )));
        }
        if !self.min_trip_segment_meters.is_finite() || self.min_trip_segment_meters < 0.0 {
            return Err(NavError::InvalidConfig(format!(
                "min_trip_segment_meters must be non-negative, got {}",
                self.min_trip_segment_meters
            )));
        }
        if !self.min_speed_mps.is_finite() || self.min_speed_mps < 0.0 {
            return Err(NavError::InvalidConfig(format!(
                "min_speed_mps must be non-negative, got {}",
                self.min_speed_mps
            )));
        }
        Ok(())
    }
}
