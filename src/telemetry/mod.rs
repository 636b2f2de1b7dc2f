//! Historical vehicle-position telemetry.
//!
//! A [`TelemetryStore`] returns the pings of one route and direction ordered
//! by timestamp, already converted into the analysis time zone.

mod sqlite;

pub use sqlite::SqliteTelemetry;

use anyhow::Result;
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::error::AnalysisError;

/// Reads vehicle positions for one route and direction.
pub trait TelemetryStore {
    fn vehicle_positions(&self, route_id: &str, direction_id: u8) -> Result<Vec<PositionPing>>;
}

/// A telemetry row as stored, before time zone conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPing {
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch seconds.
    pub start_time: Option<f64>,
    /// Epoch seconds.
    pub timestamp: f64,
    /// Meters per second.
    pub speed: Option<f64>,
    pub odometer: Option<f64>,
    pub vehicle_id: Option<String>,
    pub route_id: String,
    pub direction_id: u8,
    pub stop_id: Option<String>,
    pub current_status: Option<String>,
    pub trip_id: Option<String>,
}

/// One GPS observation of a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionPing {
    pub latitude: f64,
    pub longitude: f64,
    pub start_time: Option<DateTime<Tz>>,
    pub timestamp: DateTime<Tz>,
    /// `timestamp` rounded to the nearest hour.
    pub timestamp_binned: DateTime<Tz>,
    pub hour_of_day: u32,
    pub speed: Option<f64>,
    /// `speed` in km/h.
    pub speed_km: Option<f64>,
    pub odometer: Option<f64>,
    pub vehicle_id: Option<String>,
    pub route_id: String,
    pub direction_id: u8,
    pub stop_id: Option<String>,
    pub current_status: Option<String>,
    pub trip_id: Option<String>,
}

impl PositionPing {
    /// Converts epoch columns into `tz` and derives the hour fields.
    pub fn from_raw(raw: RawPing, tz: Tz) -> Result<Self, AnalysisError> {
        let timestamp = epoch_to_local(raw.timestamp, tz, "timestamp")?;
        let start_time = raw
            .start_time
            .map(|secs| epoch_to_local(secs, tz, "start_time"))
            .transpose()?;

        Ok(Self {
            latitude: raw.latitude,
            longitude: raw.longitude,
            start_time,
            timestamp_binned: round_to_hour(timestamp),
            hour_of_day: timestamp.hour(),
            timestamp,
            speed: raw.speed,
            speed_km: raw.speed.map(|s| s * 3.6),
            odometer: raw.odometer,
            vehicle_id: raw.vehicle_id,
            route_id: raw.route_id,
            direction_id: raw.direction_id,
            stop_id: raw.stop_id,
            current_status: raw.current_status,
            trip_id: raw.trip_id,
        })
    }
}

/// Maps the GTFS-RT `VehicleStopStatus` codes to their names.
pub fn status_name(code: i64) -> Option<&'static str> {
    match code {
        0 => Some("INCOMING_AT"),
        1 => Some("STOPPED_AT"),
        2 => Some("IN_TRANSIT_TO"),
        _ => None,
    }
}

fn epoch_to_local(secs: f64, tz: Tz, column: &str) -> Result<DateTime<Tz>, AnalysisError> {
    let invalid = || AnalysisError::InvalidTimestamp {
        column: column.to_string(),
        value: secs,
    };
    if !secs.is_finite() {
        return Err(invalid());
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        .map(|utc| utc.with_timezone(&tz))
        .ok_or_else(invalid)
}

/// Rounds local wall-clock time to the nearest hour, ties to the even hour.
pub fn round_to_hour(ts: DateTime<Tz>) -> DateTime<Tz> {
    let wall = ts.naive_local().and_utc().timestamp();
    let rem = wall.rem_euclid(3600);
    let floor = wall - rem;
    let subsec = ts.nanosecond() > 0;
    let up = rem > 1800 || (rem == 1800 && (subsec || (floor / 3600) % 2 != 0));
    let rounded = if up { floor + 3600 } else { floor };

    let Some(naive) = DateTime::from_timestamp(rounded, 0).map(|d| d.naive_utc()) else {
        return ts;
    };
    localize(ts.timezone(), naive).unwrap_or(ts)
}

fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => None,
    }
}
