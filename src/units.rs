//! Nautical display conversions for the dashboard.

pub const KNOTS_PER_MPS: f32 = 1.943_84;
pub const NAUTICAL_MILES_PER_METER: f64 = 1.0 / 1852.0;

pub fn mps_to_knots(speed_mps: f32) -> f32 {
    speed_mps * KNOTS_PER_MPS
}

pub fn meters_to_nautical_miles(distance_meters: f64) -> f64 {
    distance_meters * NAUTICAL_MILES_PER_METER
}

/// Trip meter reading, truncated (not rounded) to 0.1 NM
pub fn trip_meter_tenths(distance_meters: f64) -> f64 {
    (meters_to_nautical_miles(distance_meters) * 10.0).floor() / 10.0
}

/// Decimal degrees as `D° M' S" H`, seconds rounded to whole
pub fn to_dms(coordinate: f64, is_latitude: bool) -> String {
    let hemisphere = match (is_latitude, coordinate >= 0.0) {
        (true, true) => 'N',
        (true, false) => 'S',
        (false, true) => 'E',
        (false, false) => 'W',
    };

    // Work in whole seconds so rounding carries into minutes and degrees
    let total_seconds = (coordinate.abs() * 3600.0).round() as u64;
    let degrees = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}° {}' {}\" {}", degrees, minutes, seconds, hemisphere)
}
