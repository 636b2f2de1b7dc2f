//! Data types produced by the aggregation pipeline.

use chrono::DateTime;
use chrono_tz::Tz;
use std::sync::Arc;

use super::utility::Describe;
use crate::schedule::{RouteSegment, TripPattern};

/// One trip's traversal of one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentCrossing {
    pub pattern: Arc<TripPattern>,
    pub segment: Arc<RouteSegment>,
    pub trip_id: String,
    pub start_time: DateTime<Tz>,
    pub enter_time: DateTime<Tz>,
    pub exit_time: DateTime<Tz>,
    /// Median ping timestamp; decides the hour bucket.
    pub median_time: DateTime<Tz>,
    pub hour_of_day: u32,
    /// `exit_time - enter_time` in seconds.
    pub travel_time: f64,
    /// Only set under [`super::SequencePolicy::Strict`].
    pub stop_sequence: Option<u32>,
    pub pings: usize,
}

/// Travel-time statistics of one segment geometry in one hour of the day.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySegmentStat {
    pub segment: Arc<RouteSegment>,
    pub hour_of_day: u32,
    pub travel_time: Describe,
    /// `mean` minus the segment's mean in the reference hour, once a
    /// reference hour has been applied.
    pub mean_diff: Option<f64>,
}

/// One crossing prepared for the distribution view.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionRow {
    pub pattern_name: String,
    pub segment: Arc<RouteSegment>,
    /// `"A ... B"`
    pub segment_name: String,
    pub trip_id: String,
    pub start_time: DateTime<Tz>,
    pub hour_of_day: u32,
    pub stop_sequence: u32,
    pub travel_time: f64,
}
