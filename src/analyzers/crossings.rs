use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use tracing::debug;

use super::strict::strict_mode;
use super::types::SegmentCrossing;
use crate::error::AnalysisError;
use crate::spatial::JoinedPoint;

/// How a crossing's stop sequence is derived from its points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePolicy {
    /// Leave `stop_sequence` unset.
    Ignore,
    /// The unique most frequent stop sequence; a tie aborts.
    Strict,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct CrossingKey<'a> {
    pattern_name: &'a str,
    segment_id: &'a str,
    geometry_key: usize,
    trip_id: &'a str,
    start_time: DateTime<Tz>,
}

/// Groups joined points into per-trip segment crossings.
///
/// A crossing is keyed by pattern, segment (id and geometry), trip and trip
/// start time. Points without a trip or start time belong to no crossing.
pub fn segment_crossings(
    points: &[JoinedPoint],
    policy: SequencePolicy,
) -> Result<Vec<SegmentCrossing>, AnalysisError> {
    let mut groups: BTreeMap<CrossingKey<'_>, Vec<&JoinedPoint>> = BTreeMap::new();
    let mut keyless = 0usize;

    for point in points {
        let (Some(trip_id), Some(start_time)) = (point.ping.trip_id.as_deref(), point.ping.start_time) else {
            keyless += 1;
            continue;
        };
        let key = CrossingKey {
            pattern_name: &point.pattern.pattern_name,
            segment_id: &point.segment.segment_id,
            geometry_key: point.segment.geometry_key,
            trip_id,
            start_time,
        };
        groups.entry(key).or_default().push(point);
    }

    if keyless > 0 {
        debug!(keyless, "Points without trip or start time skipped");
    }

    groups
        .into_iter()
        .map(|(key, members)| crossing(key, &members, policy))
        .collect()
}

fn crossing(
    key: CrossingKey<'_>,
    members: &[&JoinedPoint],
    policy: SequencePolicy,
) -> Result<SegmentCrossing, AnalysisError> {
    let mut times: Vec<DateTime<Tz>> = members.iter().map(|p| p.ping.timestamp).collect();
    times.sort();

    let (Some(&enter_time), Some(&exit_time)) = (times.first(), times.last()) else {
        return Err(AnalysisError::EmptyGroup {
            column: "timestamp".to_string(),
        });
    };
    let median_time = median(&times);

    let stop_sequence = match policy {
        SequencePolicy::Ignore => None,
        SequencePolicy::Strict => {
            let sequences: Vec<u32> = members.iter().map(|p| p.segment.stop_sequence).collect();
            Some(strict_mode("stop_sequence", &sequences)?)
        }
    };

    let first = members[0];
    Ok(SegmentCrossing {
        pattern: first.pattern.clone(),
        segment: first.segment.clone(),
        trip_id: key.trip_id.to_string(),
        start_time: key.start_time,
        enter_time,
        exit_time,
        median_time,
        hour_of_day: median_time.hour(),
        travel_time: (exit_time - enter_time).num_milliseconds() as f64 / 1000.0,
        stop_sequence,
        pings: members.len(),
    })
}

/// Median of an ascending, non-empty slice; the midpoint of the two middle
/// values for an even count.
fn median(sorted: &[DateTime<Tz>]) -> DateTime<Tz> {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        let (a, b) = (sorted[mid - 1], sorted[mid]);
        a + (b - a) / 2
    }
}
