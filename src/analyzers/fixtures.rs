//! Builders for joined points used across the aggregation tests.

use chrono::TimeZone;
use chrono_tz::America::Vancouver;
use geo::LineString;
use std::sync::Arc;

use crate::schedule::{RouteSegment, TripPattern};
use crate::spatial::JoinedPoint;
use crate::telemetry::{PositionPing, RawPing};

pub fn segment(segment_id: &str, stop_sequence: u32, geometry_key: usize) -> Arc<RouteSegment> {
    let (start, end) = segment_id.split_once('-').unwrap_or((segment_id, segment_id));
    Arc::new(RouteSegment {
        route_id: "6-VIC".to_string(),
        direction_id: 0,
        shape_id: "shape_1".to_string(),
        segment_id: segment_id.to_string(),
        stop_sequence,
        start_stop_id: start.to_string(),
        start_stop_name: format!("{start} St"),
        end_stop_id: end.to_string(),
        end_stop_name: format!("{end} St"),
        distance_m: 250.0,
        geometry: LineString::from(vec![(-123.37, 48.45), (-123.37, 48.452)]),
        geometry_key,
    })
}

pub fn pattern(trip_id: &str, pattern_name: &str) -> Arc<TripPattern> {
    Arc::new(TripPattern {
        trip_id: trip_id.to_string(),
        route_id: "6-VIC".to_string(),
        direction_id: 0,
        shape_id: "shape_1".to_string(),
        pattern_name: pattern_name.to_string(),
    })
}

/// A joined point of `trip_id` on `segment` at local time `h:m:s` on
/// 2024-09-09, for a trip that started at 07:30.
pub fn joined(trip_id: &str, segment: &Arc<RouteSegment>, (h, m, s): (u32, u32, u32)) -> JoinedPoint {
    let timestamp = Vancouver.with_ymd_and_hms(2024, 9, 9, h, m, s).unwrap();
    let start_time = Vancouver.with_ymd_and_hms(2024, 9, 9, 7, 30, 0).unwrap();
    let ping = PositionPing::from_raw(
        RawPing {
            latitude: 48.451,
            longitude: -123.37,
            start_time: Some(start_time.timestamp() as f64),
            timestamp: timestamp.timestamp() as f64,
            speed: Some(4.0),
            vehicle_id: Some("9001".to_string()),
            route_id: "6-VIC".to_string(),
            direction_id: 0,
            trip_id: Some(trip_id.to_string()),
            ..Default::default()
        },
        Vancouver,
    )
    .unwrap();

    JoinedPoint {
        ping,
        pattern: pattern(trip_id, "Royal Oak - Downtown (3 stops)"),
        segment: segment.clone(),
        distance_m: 1.0,
    }
}
