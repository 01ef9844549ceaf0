use crate::config::FilterConfig;
use crate::error::{JResult, NavError};
use crate::filter::{FixOutcome, NavigationState, PositionFilter, TripSnapshot};
use crate::fix::RawFix;
use crate::trip_store::TripStore;
use crossbeam::channel::{self, Receiver, RecvError, Sender, TryRecvError, TrySendError};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Per-session fix counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixCounters {
    pub received: u32,
    pub rejected: u32,
    pub stationary: u32,
    pub below_trip_floor: u32,
    pub segments: u32,
}

impl FixCounters {
    fn record(&mut self, outcome: &FixOutcome) {
        self.received += 1;
        match outcome {
            FixOutcome::Rejected => self.rejected += 1,
            FixOutcome::Bootstrapped => {}
            FixOutcome::Stationary { .. } => self.stationary += 1,
            FixOutcome::BelowTripFloor { .. } => self.below_trip_floor += 1,
            FixOutcome::Moving { .. } => self.segments += 1,
        }
    }
}

/// Latest-value view of the navigation state.
///
/// Holds at most one pending state; a newer state replaces an unread one.
pub struct Subscription {
    rx: Receiver<NavigationState>,
    _alive: Arc<()>,
}

impl Subscription {
    pub fn try_recv(&self) -> Result<NavigationState, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn recv(&self) -> Result<NavigationState, RecvError> {
        self.rx.recv()
    }

    pub fn receiver(&self) -> &Receiver<NavigationState> {
        &self.rx
    }
}

struct Subscriber {
    tx: Sender<NavigationState>,
    // Tracker-side handle used to discard an unread state
    stale: Receiver<NavigationState>,
    alive: Weak<()>,
}

impl Subscriber {
    fn offer(&self, state: NavigationState) -> bool {
        if self.alive.strong_count() == 0 {
            return false;
        }
        match self.tx.try_send(state) {
            Ok(()) => true,
            Err(TrySendError::Full(state)) => {
                let _ = self.stale.try_recv();
                self.tx.try_send(state).is_ok()
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

struct TrackerInner {
    filter: PositionFilter,
    counters: FixCounters,
    subscribers: Vec<Subscriber>,
}

impl TrackerInner {
    fn publish(&mut self) {
        let state = *self.filter.state();
        self.subscribers.retain(|sub| sub.offer(state));
    }
}

/// Navigation session: one position filter guarded by a single lock,
/// backed by a persisted trip store.
pub struct Tracker {
    inner: Mutex<TrackerInner>,
    store: Box<dyn TripStore>,
}

impl Tracker {
    /// Load persisted trip state once and start filtering.
    ///
    /// An unreadable store starts a fresh trip instead of failing.
    pub fn start(config: FilterConfig, store: Box<dyn TripStore>) -> JResult<Self> {
        config.validate()?;

        let persisted = match store.load() {
            Ok(trip) => trip,
            Err(e) => {
                warn!("Trip state unavailable, starting fresh: {}", e);
                Default::default()
            }
        };

        let mut filter = PositionFilter::new(config);
        filter.initialize(persisted.distance_or_zero(), persisted.reference());

        Ok(Tracker {
            inner: Mutex::new(TrackerInner {
                filter,
                counters: FixCounters::default(),
                subscribers: Vec::new(),
            }),
            store,
        })
    }

    fn lock(&self) -> JResult<MutexGuard<'_, TrackerInner>> {
        self.inner
            .lock()
            .map_err(|_| NavError::Internal("Failed to acquire tracker lock".to_string()))
    }

    pub fn on_fix(&self, fix: &RawFix) -> JResult<(FixOutcome, NavigationState)> {
        let mut inner = self.lock()?;
        let outcome = inner.filter.on_fix(fix);
        inner.counters.record(&outcome);
        inner.publish();
        Ok((outcome, *inner.filter.state()))
    }

    pub fn on_signal_lost(&self) -> JResult<NavigationState> {
        let mut inner = self.lock()?;
        inner.filter.on_signal_lost();
        inner.publish();
        Ok(*inner.filter.state())
    }

    /// Zero the trip and persist immediately.
    ///
    /// The store write happens under the tracker lock, so writes land in
    /// the same order as the state changes they record.
    pub fn reset_trip_distance(&self) -> JResult<()> {
        let mut inner = self.lock()?;
        inner.filter.reset_trip_distance();
        inner.publish();
        let snapshot = inner.filter.save();
        self.persist(&snapshot)
    }

    /// Write the current trip to the store and return what was written
    pub fn save(&self) -> JResult<TripSnapshot> {
        let inner = self.lock()?;
        let snapshot = inner.filter.save();
        self.persist(&snapshot)?;
        Ok(snapshot)
    }

    pub fn state(&self) -> JResult<NavigationState> {
        Ok(*self.lock()?.filter.state())
    }

    pub fn counters(&self) -> JResult<FixCounters> {
        Ok(self.lock()?.counters)
    }

    /// Follow the navigation state, starting with the current one
    pub fn subscribe(&self) -> JResult<Subscription> {
        let (tx, rx) = channel::bounded(1);
        let alive = Arc::new(());
        let mut inner = self.lock()?;
        let _ = tx.try_send(*inner.filter.state());
        inner.subscribers.push(Subscriber {
            tx,
            stale: rx.clone(),
            alive: Arc::downgrade(&alive),
        });
        Ok(Subscription { rx, _alive: alive })
    }

    fn persist(&self, snapshot: &TripSnapshot) -> JResult<()> {
        self.store.store(snapshot).map_err(|e| {
            warn!("Failed to persist trip state: {}", e);
            e
        })?;
        info!(
            "Trip state saved: {:.1} m, reference={:?}",
            snapshot.distance_meters, snapshot.reference
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::Coordinate;
    use crate::trip_store::{MemoryTripStore, PersistedTrip};
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn fix(secs: i64, lat: f64, accuracy: f32) -> RawFix {
        RawFix::new(lat, 0.0, at(secs)).with_accuracy(accuracy)
    }

    struct SharedStore(Arc<MemoryTripStore>);

    impl TripStore for SharedStore {
        fn load(&self) -> JResult<PersistedTrip> {
            self.0.load()
        }

        fn store(&self, snapshot: &TripSnapshot) -> JResult<()> {
            self.0.store(snapshot)
        }
    }

    /// Blocks its first write until released
    struct GatedStore {
        backing: Arc<MemoryTripStore>,
        gated: AtomicBool,
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl TripStore for GatedStore {
        fn load(&self) -> JResult<PersistedTrip> {
            self.backing.load()
        }

        fn store(&self, snapshot: &TripSnapshot) -> JResult<()> {
            if self.gated.swap(false, Ordering::SeqCst) {
                self.entered.send(()).unwrap();
                self.release.recv().unwrap();
            }
            self.backing.store(snapshot)
        }
    }

    struct BrokenStore;

    impl TripStore for BrokenStore {
        fn load(&self) -> JResult<PersistedTrip> {
            Err(NavError::StorageError("unavailable".to_string()))
        }

        fn store(&self, _snapshot: &TripSnapshot) -> JResult<()> {
            Err(NavError::StorageError("read-only".to_string()))
        }
    }

    fn tracker_with(trip: PersistedTrip) -> (Tracker, Arc<MemoryTripStore>) {
        let backing = Arc::new(MemoryTripStore::with_trip(trip));
        let tracker = Tracker::start(
            FilterConfig::default(),
            Box::new(SharedStore(Arc::clone(&backing))),
        )
        .unwrap();
        (tracker, backing)
    }

    #[test]
    fn test_start_seeds_from_store() {
        let (tracker, _) = tracker_with(PersistedTrip {
            total_distance: Some(750.0),
            last_latitude: Some(0.0),
            last_longitude: Some(0.0),
        });
        assert_eq!(tracker.state().unwrap().trip_distance_meters, 750.0);

        // Restored reference means the first fix can already count
        let (outcome, state) = tracker.on_fix(&fix(0, 0.002, 5.0)).unwrap();
        assert!(matches!(outcome, FixOutcome::Moving { .. }));
        assert!(state.trip_distance_meters > 750.0);
    }

    #[test]
    fn test_save_writes_snapshot() {
        let (tracker, backing) = tracker_with(PersistedTrip::default());
        tracker.on_fix(&fix(0, 0.0, 5.0)).unwrap();
        tracker.on_fix(&fix(5, 0.002, 5.0)).unwrap();

        let snapshot = tracker.save().unwrap();
        let trip = backing.load().unwrap();
        assert_eq!(trip.total_distance, Some(snapshot.distance_meters));
        assert_eq!(trip.reference(), Some(Coordinate::new(0.002, 0.0)));
    }

    #[test]
    fn test_save_before_any_fix_leaves_stored_coordinates() {
        let (tracker, backing) = tracker_with(PersistedTrip {
            total_distance: Some(10.0),
            last_latitude: None,
            last_longitude: None,
        });
        tracker.save().unwrap();

        let trip = backing.load().unwrap();
        assert_eq!(trip.total_distance, Some(10.0));
        assert!(trip.last_latitude.is_none());
        assert!(trip.last_longitude.is_none());
    }

    #[test]
    fn test_reset_persists_zero_immediately() {
        let (tracker, backing) = tracker_with(PersistedTrip {
            total_distance: Some(5000.0),
            last_latitude: Some(1.0),
            last_longitude: Some(1.0),
        });
        tracker.reset_trip_distance().unwrap();

        let trip = backing.load().unwrap();
        assert_eq!(trip.total_distance, Some(0.0));
        assert_eq!(trip.reference(), Some(Coordinate::new(1.0, 1.0)));
        assert_eq!(tracker.state().unwrap().trip_distance_meters, 0.0);
    }

    #[test]
    fn test_subscriber_sees_current_then_updates() {
        let (tracker, _) = tracker_with(PersistedTrip::default());
        let rx = tracker.subscribe().unwrap();

        let initial = rx.try_recv().unwrap();
        assert!(!initial.has_fix_accuracy);

        tracker.on_fix(&fix(0, 0.0, 5.0)).unwrap();
        let after_fix = rx.try_recv().unwrap();
        assert!(after_fix.has_fix_accuracy);

        tracker.on_signal_lost().unwrap();
        let after_loss = rx.try_recv().unwrap();
        assert!(!after_loss.has_fix_accuracy);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_slow_subscriber_only_holds_latest_state() {
        let (tracker, _) = tracker_with(PersistedTrip::default());
        let rx = tracker.subscribe().unwrap();

        tracker.on_fix(&fix(0, 0.0, 5.0)).unwrap();
        tracker.on_fix(&fix(5, 0.002, 5.0)).unwrap();
        tracker.on_fix(&fix(10, 0.004, 5.0)).unwrap();

        assert_eq!(rx.receiver().len(), 1);
        let latest = rx.try_recv().unwrap();
        assert_eq!(latest, tracker.state().unwrap());
        assert_eq!(latest.latitude, 0.004);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let (tracker, _) = tracker_with(PersistedTrip::default());
        let rx = tracker.subscribe().unwrap();
        drop(rx);

        tracker.on_fix(&fix(0, 0.0, 5.0)).unwrap();
        assert!(tracker.lock().unwrap().subscribers.is_empty());
    }

    #[test]
    fn test_counters_track_outcomes() {
        let (tracker, _) = tracker_with(PersistedTrip::default());
        tracker.on_fix(&fix(0, 0.0, 50.0)).unwrap();
        tracker.on_fix(&fix(5, 0.0, 5.0)).unwrap();
        tracker.on_fix(&fix(10, 0.00001, 5.0)).unwrap();
        tracker.on_fix(&fix(15, 0.001, 5.0)).unwrap();
        tracker.on_fix(&fix(20, 0.002, 5.0)).unwrap();

        let counters = tracker.counters().unwrap();
        assert_eq!(
            counters,
            FixCounters {
                received: 5,
                rejected: 1,
                stationary: 1,
                below_trip_floor: 1,
                segments: 1,
            }
        );
    }

    #[test]
    fn test_recorded_harbor_exit() {
        let (tracker, _) = tracker_with(PersistedTrip::default());
        for line in include_str!("../demos/harbor_exit.jsonl").lines() {
            let fix: RawFix = serde_json::from_str(line).unwrap();
            tracker.on_fix(&fix).unwrap();
        }

        assert_eq!(
            tracker.counters().unwrap(),
            FixCounters {
                received: 9,
                rejected: 2,
                stationary: 1,
                below_trip_floor: 3,
                segments: 2,
            }
        );
        let state = tracker.state().unwrap();
        assert!(state.trip_distance_meters > 500.0 && state.trip_distance_meters < 620.0);
        assert_eq!(state.speed_mps, 0.0);
    }

    #[test]
    fn test_broken_store_starts_fresh_and_reports_save_errors() {
        let tracker = Tracker::start(FilterConfig::default(), Box::new(BrokenStore)).unwrap();
        assert_eq!(tracker.state().unwrap().trip_distance_meters, 0.0);
        assert!(matches!(tracker.save(), Err(NavError::StorageError(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = FilterConfig {
            accuracy_gate_meters: -1.0,
            ..FilterConfig::default()
        };
        let result = Tracker::start(config, Box::new(MemoryTripStore::new()));
        assert!(matches!(result, Err(NavError::InvalidConfig(_))));
    }

    #[test]
    fn test_concurrent_fixes_are_serialized() {
        let (tracker, _) = tracker_with(PersistedTrip::default());
        let tracker = Arc::new(tracker);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        tracker.on_fix(&fix(t * 100 + i, 0.0, 5.0)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.counters().unwrap().received, 100);
        assert_eq!(tracker.state().unwrap().trip_distance_meters, 0.0);
    }

    #[test]
    fn test_reset_during_save_persists_zero_last() {
        let backing = Arc::new(MemoryTripStore::with_trip(PersistedTrip {
            total_distance: Some(5000.0),
            last_latitude: Some(1.0),
            last_longitude: Some(1.0),
        }));
        let (entered_tx, entered_rx) = channel::unbounded();
        let (release_tx, release_rx) = channel::unbounded();
        let store = GatedStore {
            backing: Arc::clone(&backing),
            gated: AtomicBool::new(true),
            entered: entered_tx,
            release: release_rx,
        };
        let tracker = Arc::new(Tracker::start(FilterConfig::default(), Box::new(store)).unwrap());

        let saver = {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || tracker.save().unwrap())
        };
        entered_rx.recv().unwrap();

        let (done_tx, done_rx) = channel::unbounded();
        let resetter = {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                tracker.reset_trip_distance().unwrap();
                done_tx.send(()).unwrap();
            })
        };

        // Reset waits for the in-flight save to finish writing
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
        release_tx.send(()).unwrap();

        let saved = saver.join().unwrap();
        resetter.join().unwrap();
        assert_eq!(saved.distance_meters, 5000.0);

        let trip = backing.load().unwrap();
        assert_eq!(trip.total_distance, Some(0.0));
        assert_eq!(trip.reference(), Some(Coordinate::new(1.0, 1.0)));
        assert_eq!(tracker.state().unwrap().trip_distance_meters, 0.0);
    }
}
