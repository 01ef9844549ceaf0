// Breeze navigation core
// Position-fix filtering and trip metering for the boating app, exposed to Kotlin via JNI

pub mod android_jni;
pub mod config;
pub mod error;
pub mod filter;
pub mod fix;
pub mod geodesy;
pub mod tracker;
pub mod trip_store;
pub mod units;

pub use config::FilterConfig;
pub use error::{JResult, NavError};
pub use filter::{FixOutcome, NavigationState, PositionFilter, ReferenceFix, TripSnapshot};
pub use fix::{Coordinate, RawFix};
pub use tracker::{FixCounters, Subscription, Tracker};
pub use trip_store::{JsonFileTripStore, MemoryTripStore, PersistedTrip, TripStore};
