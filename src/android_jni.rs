use crate::config::FilterConfig;
use crate::error::{throw_java_exception, JResult, NavError};
use crate::filter::FixOutcome;
use crate::fix::RawFix;
use crate::tracker::Tracker;
use crate::trip_store::JsonFileTripStore;
use chrono::{DateTime, Utc};
use jni::objects::{JClass, JString};
use jni::sys::{jdouble, jfloat, jint, jlong, jstring};
use jni::JNIEnv;
use log::info;
use std::sync::{Arc, Mutex, Once};

// Global tracker - stored as static to persist across JNI calls
lazy_static::lazy_static! {
    static ref GLOBAL_TRACKER: Mutex<Option<Arc<Tracker>>> = Mutex::new(None);
}

#[cfg(target_os = "android")]
const LOG_TAG: &str = "BreezeNav";

#[cfg(target_os = "android")]
fn install_logger() {
    if android_log::init(LOG_TAG).is_err() {
        eprintln!("[{}] logger already installed", LOG_TAG);
    }
}

#[cfg(not(target_os = "android"))]
fn install_logger() {}

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(install_logger);
}

fn get_tracker() -> JResult<Arc<Tracker>> {
    let guard = GLOBAL_TRACKER.lock().map_err(|_| {
        NavError::Internal("Failed to acquire global tracker lock".to_string())
    })?;
    guard.as_ref().map(Arc::clone).ok_or(NavError::NotInitialized)
}

/// Kotlin passes NaN for fields the Location did not carry
fn optional(value: jfloat) -> Option<f32> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

fn build_fix(
    latitude: f64,
    longitude: f64,
    accuracy: f32,
    speed: f32,
    bearing: f32,
    timestamp_millis: i64,
) -> RawFix {
    let timestamp =
        DateTime::<Utc>::from_timestamp_millis(timestamp_millis).unwrap_or_else(Utc::now);
    RawFix {
        accuracy_meters: optional(accuracy),
        speed_mps: optional(speed),
        bearing_deg: optional(bearing),
        ..RawFix::new(latitude, longitude, timestamp)
    }
}

fn outcome_code(outcome: &FixOutcome) -> jint {
    match outcome {
        FixOutcome::Rejected => 0,
        FixOutcome::Bootstrapped => 1,
        FixOutcome::Stationary { .. } => 2,
        FixOutcome::BelowTripFloor { .. } => 3,
        FixOutcome::Moving { .. } => 4,
    }
}

fn read_optional_string(env: &mut JNIEnv, value: &JString) -> JResult<Option<String>> {
    if value.is_null() {
        return Ok(None);
    }
    let s: String = env.get_string(value)?.into();
    Ok(Some(s))
}

/// JNI: Load persisted trip state and start the tracker
/// Parameters: storePath (trip state JSON file), configJson (nullable)
/// Returns: 0 on start, 1 if already running, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_bsi_breezeplot_NavCore_initialize(
    mut env: JNIEnv,
    _class: JClass,
    store_path: JString,
    config_json: JString,
) -> jint {
    init_logging();

    let args = read_optional_string(&mut env, &store_path).and_then(|path| {
        let config = read_optional_string(&mut env, &config_json)?;
        Ok((path, config))
    });

    match args.and_then(|(path, config)| initialize_impl(path, config)) {
        Ok(started) => {
            if started {
                0
            } else {
                1
            }
        }
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

fn initialize_impl(store_path: Option<String>, config_json: Option<String>) -> JResult<bool> {
    let mut guard = GLOBAL_TRACKER.lock().map_err(|_| {
        NavError::Internal("Failed to acquire global tracker lock".to_string())
    })?;
    if guard.is_some() {
        info!("Tracker already running");
        return Ok(false);
    }

    let path = store_path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| NavError::InvalidParameters("storePath is required".to_string()))?;
    let config = match config_json.as_deref().map(str::trim) {
        None | Some("") => FilterConfig::default(),
        Some(json) => FilterConfig::from_json(json)?,
    };

    let tracker = Tracker::start(config, Box::new(JsonFileTripStore::new(&path)))?;
    *guard = Some(Arc::new(tracker));
    info!("Tracker started with store {}", path);
    Ok(true)
}

/// JNI: Push a location fix
/// Parameters: latitude, longitude (degrees), accuracy (m), speed (m/s), bearing (degrees)
/// - NaN for absent values - and timestamp (millis since epoch)
/// Returns: outcome code 0-4, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_bsi_breezeplot_NavCore_pushFix(
    mut env: JNIEnv,
    _class: JClass,
    latitude: jdouble,
    longitude: jdouble,
    accuracy: jfloat,
    speed: jfloat,
    bearing: jfloat,
    timestamp_millis: jlong,
) -> jint {
    let fix = build_fix(latitude, longitude, accuracy, speed, bearing, timestamp_millis);
    match push_fix_impl(&fix) {
        Ok(code) => code,
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

fn push_fix_impl(fix: &RawFix) -> JResult<jint> {
    let tracker = get_tracker()?;
    let (outcome, _) = tracker.on_fix(fix)?;
    Ok(outcome_code(&outcome))
}

/// JNI: GNSS status reported the engine stopped
/// Returns: 0 on success, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_bsi_breezeplot_NavCore_onSignalLost(
    mut env: JNIEnv,
    _class: JClass,
) -> jint {
    match get_tracker().and_then(|t| t.on_signal_lost()) {
        Ok(_) => 0,
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

/// JNI: Zero the trip meter (persists immediately)
/// Returns: 0 on success, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_bsi_breezeplot_NavCore_resetTripDistance(
    mut env: JNIEnv,
    _class: JClass,
) -> jint {
    match get_tracker().and_then(|t| t.reset_trip_distance()) {
        Ok(_) => 0,
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

/// JNI: Persist trip distance and reference coordinate
/// Returns: 0 on success, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_bsi_breezeplot_NavCore_saveTripState(
    mut env: JNIEnv,
    _class: JClass,
) -> jint {
    match get_tracker().and_then(|t| t.save()) {
        Ok(_) => 0,
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

/// JNI: Current navigation state as JSON
/// Returns: JSON string or null on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_bsi_breezeplot_NavCore_getNavigationStateJson(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    match navigation_state_json_impl() {
        Ok(json) => match env.new_string(&json) {
            Ok(jstr) => jstr.into_raw(),
            Err(_) => {
                let _ = throw_java_exception(
                    &mut env,
                    &NavError::JniError("Failed to create Java string".to_string()),
                );
                std::ptr::null_mut()
            }
        },
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            std::ptr::null_mut()
        }
    }
}

fn navigation_state_json_impl() -> JResult<String> {
    let state = get_tracker()?.state()?;
    Ok(serde_json::to_string(&state)?)
}

/// JNI: Save and release the tracker (ViewModel onCleared)
/// Returns: 0 on success, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_bsi_breezeplot_NavCore_shutdown(
    mut env: JNIEnv,
    _class: JClass,
) -> jint {
    match shutdown_impl() {
        Ok(_) => 0,
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

/// The tracker stays installed when the final save fails
fn shutdown_impl() -> JResult<()> {
    let mut guard = GLOBAL_TRACKER.lock().map_err(|_| {
        NavError::Internal("Failed to acquire global tracker lock".to_string())
    })?;

    if let Some(tracker) = guard.as_ref() {
        tracker.save()?;
        *guard = None;
        info!("Tracker shut down");
    }
    Ok(())
}
