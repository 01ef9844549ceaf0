use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context};
use breeze_nav_core::units::{meters_to_nautical_miles, mps_to_knots, to_dms, trip_meter_tenths};
use breeze_nav_core::{
    FilterConfig, FixOutcome, JsonFileTripStore, MemoryTripStore, RawFix, Tracker, TripStore,
};
use clap::Parser;

/// Replay recorded fixes through the position filter
#[derive(Parser, Debug)]
struct Args {
    /// JSON-lines file, one RawFix per line
    #[arg(value_name = "FIXES")]
    input: PathBuf,

    /// Trip state file to resume from and save into (in-memory when omitted)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Accuracy gate (meters)
    #[arg(long, default_value_t = breeze_nav_core::config::ACCURACY_GATE_METERS)]
    accuracy_gate: f32,

    /// Minimum segment counted towards trip distance (meters)
    #[arg(long, default_value_t = breeze_nav_core::config::MIN_TRIP_SEGMENT_METERS)]
    min_trip_segment: f64,

    /// Minimum displayed speed (m/s)
    #[arg(long, default_value_t = breeze_nav_core::config::MIN_SPEED_MPS)]
    min_speed: f32,

    /// Print every fix decision
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = FilterConfig {
        accuracy_gate_meters: args.accuracy_gate,
        min_trip_segment_meters: args.min_trip_segment,
        min_speed_mps: args.min_speed,
    };
    let store: Box<dyn TripStore> = match &args.store {
        Some(path) => Box::new(JsonFileTripStore::new(path)),
        None => Box::new(MemoryTripStore::new()),
    };
    let tracker = Tracker::start(config, store)?;

    let file = File::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let reader = BufReader::new(file);

    let mut peak_speed_mps: f32 = 0.0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fix: RawFix = serde_json::from_str(&line)
            .with_context(|| format!("line {}: not a fix", index + 1))?;

        let (outcome, state) = tracker.on_fix(&fix)?;
        peak_speed_mps = peak_speed_mps.max(state.speed_mps);

        if args.verbose {
            let decision = match outcome {
                FixOutcome::Rejected => "rejected".to_string(),
                FixOutcome::Bootstrapped => "reference".to_string(),
                FixOutcome::Stationary { distance_meters } => {
                    format!("noise ({:.1} m)", distance_meters)
                }
                FixOutcome::BelowTripFloor { distance_meters } => {
                    format!("short ({:.1} m)", distance_meters)
                }
                FixOutcome::Moving { segment_meters } => format!("+{:.1} m", segment_meters),
            };
            println!(
                "{} {:>14} trip {:>8.1} m  {:>5.1} kn  {:>5.1}°",
                fix.timestamp.to_rfc3339(),
                decision,
                state.trip_distance_meters,
                mps_to_knots(state.speed_mps),
                state.bearing_deg
            );
        }
    }

    let counters = tracker.counters()?;
    if counters.received == 0 {
        bail!("{} contains no fixes", args.input.display());
    }
    let state = tracker.state()?;
    tracker.save()?;

    println!("=== Replay Summary ===");
    println!(
        "Fixes:     {} ({} rejected, {} noise, {} short, {} segments)",
        counters.received,
        counters.rejected,
        counters.stationary,
        counters.below_trip_floor,
        counters.segments
    );
    println!(
        "Trip:      {:.1} m ({:.3} NM, meter reads {:.1})",
        state.trip_distance_meters,
        meters_to_nautical_miles(state.trip_distance_meters),
        trip_meter_tenths(state.trip_distance_meters)
    );
    println!("Peak:      {:.1} kn", mps_to_knots(peak_speed_mps));
    println!(
        "Position:  {}  {}",
        to_dms(state.latitude, true),
        to_dms(state.longitude, false)
    );

    Ok(())
}
