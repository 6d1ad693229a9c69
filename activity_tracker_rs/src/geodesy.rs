//! Haversine helpers and display formatting shared by the live and
//! post-processing paths.
use log::warn;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters, rounded to centimeters.
///
/// Out-of-range or non-finite coordinates yield `0.0` instead of an error.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if !valid_coordinate(lat1, lon1) || !valid_coordinate(lat2, lon2) {
        warn!(
            "[geodesy] invalid coordinates ({lat1}, {lon1}) -> ({lat2}, {lon2}), using 0 m"
        );
        return 0.0;
    }
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    round_cm(EARTH_RADIUS_M * c)
}

/// Sum of consecutive distances along a polyline of `(lat, lon)` pairs.
pub fn path_length<I>(positions: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut total = 0.0;
    let mut previous: Option<(f64, f64)> = None;
    for (lat, lon) in positions {
        if let Some((prev_lat, prev_lon)) = previous {
            total += distance_meters(prev_lat, prev_lon, lat, lon);
        }
        previous = Some((lat, lon));
    }
    total
}

/// `M:SS`, minutes are not wrapped into hours.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Pace in seconds per kilometer rendered with [`format_duration`].
pub fn format_pace(pace_sec_per_km: f64) -> String {
    if !pace_sec_per_km.is_finite() || pace_sec_per_km <= 0.0 {
        return format_duration(0);
    }
    format_duration(pace_sec_per_km.round() as u64)
}

fn valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

fn round_cm(meters: f64) -> f64 {
    (meters * 100.0).round() / 100.0
}
