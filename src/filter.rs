//! Position-fix filtering and trip-distance accumulation.
//!
//! Every accepted fix updates the displayed position. Distance, speed and
//! bearing only move when the fix is far enough from the reference fix to
//! rule out GPS jitter.

use crate::config::FilterConfig;
use crate::fix::{Coordinate, RawFix};
use crate::geodesy;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Filtered navigation output, overwritten in place on every fix
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    /// The most recent fix met the accuracy bar
    pub has_fix_accuracy: bool,
    /// Speed, bearing and trip accumulation are currently trusted
    pub has_motion_confidence: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_mps: f32,
    pub bearing_deg: f32,
    pub trip_distance_meters: f64,
    /// Timestamp of the most recent accuracy-passing fix
    pub last_fix_at: Option<DateTime<Utc>>,
}

/// Baseline the next movement delta is measured from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFix {
    pub coordinate: Coordinate,
    /// Zero when restored from storage (accuracy is never persisted)
    pub accuracy_meters: f32,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ReferenceFix {
    fn restored(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            accuracy_meters: 0.0,
            timestamp: None,
        }
    }
}

/// What a single fix did to the navigation state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// Missing or insufficient accuracy; nothing but the flags changed
    Rejected,
    /// First accepted fix became the reference
    Bootstrapped,
    /// Movement within the accuracy noise threshold
    Stationary { distance_meters: f64 },
    /// Real movement, but shorter than the trip segment floor
    BelowTripFloor { distance_meters: f64 },
    /// Segment added to trip distance and reference advanced
    Moving { segment_meters: f64 },
}

/// Values handed to the persisted trip store
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub distance_meters: f64,
    pub reference: Option<Coordinate>,
}

pub struct PositionFilter {
    config: FilterConfig,
    state: NavigationState,
    reference: Option<ReferenceFix>,
}

impl PositionFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            state: NavigationState::default(),
            reference: None,
        }
    }

    /// Seed from persisted trip state.
    ///
    /// Negative or non-finite distances load as zero and invalid coordinates
    /// are ignored, so a corrupt store can never poison the accumulator.
    pub fn initialize(&mut self, persisted_distance: f64, persisted_reference: Option<Coordinate>) {
        let distance = if persisted_distance.is_finite() && persisted_distance > 0.0 {
            persisted_distance
        } else {
            0.0
        };

        self.state = NavigationState {
            trip_distance_meters: distance,
            ..NavigationState::default()
        };
        self.reference = persisted_reference
            .filter(Coordinate::is_valid)
            .map(ReferenceFix::restored);

        info!(
            "Position filter initialized: distance={:.1} m, reference={:?}",
            distance,
            self.reference.map(|r| r.coordinate)
        );
    }

    pub fn on_fix(&mut self, fix: &RawFix) -> FixOutcome {
        let accuracy = match fix.usable_accuracy() {
            Some(a) if a <= self.config.accuracy_gate_meters && fix.coordinate.is_valid() => a,
            _ => {
                debug!(
                    "Fix rejected: accuracy {:?} (gate {} m), coordinate {:?}",
                    fix.accuracy_meters, self.config.accuracy_gate_meters, fix.coordinate
                );
                self.state.has_fix_accuracy = false;
                self.state.has_motion_confidence = false;
                return FixOutcome::Rejected;
            }
        };

        self.state.has_fix_accuracy = true;
        self.state.latitude = fix.coordinate.latitude;
        self.state.longitude = fix.coordinate.longitude;
        self.state.last_fix_at = Some(fix.timestamp);

        let current = ReferenceFix {
            coordinate: fix.coordinate,
            accuracy_meters: accuracy,
            timestamp: Some(fix.timestamp),
        };

        let reference = match self.reference {
            Some(reference) => reference,
            None => {
                debug!("First accurate fix stored as reference: {:?}", fix.coordinate);
                self.reference = Some(current);
                self.state.has_motion_confidence = false;
                return FixOutcome::Bootstrapped;
            }
        };

        let distance_moved = geodesy::distance_meters(&reference.coordinate, &fix.coordinate);
        let noise_threshold = f64::from(reference.accuracy_meters.max(accuracy));

        if distance_moved <= noise_threshold {
            debug!(
                "Movement {:.1} m within noise threshold {:.1} m",
                distance_moved, noise_threshold
            );
            self.clear_motion();
            return FixOutcome::Stationary {
                distance_meters: distance_moved,
            };
        }

        if distance_moved < self.config.min_trip_segment_meters {
            debug!(
                "Movement {:.1} m below trip floor {:.1} m",
                distance_moved, self.config.min_trip_segment_meters
            );
            self.clear_motion();
            return FixOutcome::BelowTripFloor {
                distance_meters: distance_moved,
            };
        }

        self.state.trip_distance_meters += distance_moved;
        self.reference = Some(current);
        self.state.has_motion_confidence = true;

        match fix.usable_speed() {
            Some(speed) if speed >= self.config.min_speed_mps => {
                self.state.speed_mps = speed;
                self.state.bearing_deg = fix.usable_bearing().unwrap_or(0.0);
            }
            _ => {
                self.state.speed_mps = 0.0;
                self.state.bearing_deg = 0.0;
            }
        }

        debug!(
            "Segment accepted: {:.1} m, trip {:.1} m, speed {:.2} m/s",
            distance_moved, self.state.trip_distance_meters, self.state.speed_mps
        );
        FixOutcome::Moving {
            segment_meters: distance_moved,
        }
    }

    /// GNSS engine stopped reporting; position and trip are kept
    pub fn on_signal_lost(&mut self) {
        self.state.has_fix_accuracy = false;
        self.clear_motion();
    }

    /// Zero the trip total. The reference fix is kept, so accumulation
    /// continues from the same baseline.
    pub fn reset_trip_distance(&mut self) {
        info!(
            "Trip distance reset (was {:.1} m)",
            self.state.trip_distance_meters
        );
        self.state.trip_distance_meters = 0.0;
    }

    pub fn save(&self) -> TripSnapshot {
        TripSnapshot {
            distance_meters: self.state.trip_distance_meters,
            reference: self.reference.map(|r| r.coordinate),
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn reference(&self) -> Option<&ReferenceFix> {
        self.reference.as_ref()
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    fn clear_motion(&mut self) {
        self.state.has_motion_confidence = false;
        self.state.speed_mps = 0.0;
        self.state.bearing_deg = 0.0;
    }
}

impl Default for PositionFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}
