use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use super::crossings::{SequencePolicy, segment_crossings};
use super::types::HourlySegmentStat;
use super::utility::{describe, mean};
use crate::error::AnalysisError;
use crate::schedule::RouteSegment;
use crate::spatial::JoinedPoint;

/// Per-segment, per-hour travel-time statistics.
///
/// Crossings with a non-positive travel time are left out. Rows are ordered
/// by hour, then segment id.
pub fn hourly_segment_stats(points: &[JoinedPoint]) -> Result<Vec<HourlySegmentStat>, AnalysisError> {
    let crossings = segment_crossings(points, SequencePolicy::Ignore)?;
    let total = crossings.len();

    let mut groups: BTreeMap<(u32, String, usize), (Arc<RouteSegment>, Vec<f64>)> = BTreeMap::new();
    for crossing in crossings.into_iter().filter(|c| c.travel_time > 0.0) {
        let key = (
            crossing.hour_of_day,
            crossing.segment.segment_id.clone(),
            crossing.segment.geometry_key,
        );
        groups
            .entry(key)
            .or_insert_with(|| (crossing.segment.clone(), Vec::new()))
            .1
            .push(crossing.travel_time);
    }

    let stats: Vec<HourlySegmentStat> = groups
        .into_iter()
        .filter_map(|((hour_of_day, _, _), (segment, times))| {
            Some(HourlySegmentStat {
                segment,
                hour_of_day,
                travel_time: describe(&times)?,
                mean_diff: None,
            })
        })
        .collect();

    let kept: usize = stats.iter().map(|s| s.travel_time.count).sum();
    debug!(
        crossings = total,
        non_positive = total - kept,
        rows = stats.len(),
        "Hourly segment statistics computed"
    );
    Ok(stats)
}

/// Sets `mean_diff` to each row's mean minus its segment's mean in
/// `reference_hour`.
///
/// Segments absent from the reference hour are compared against zero.
/// Returns whether the reference hour had any data.
pub fn apply_reference_hour(stats: &mut [HourlySegmentStat], reference_hour: u32) -> bool {
    let mut reference_means: HashMap<&str, Vec<f64>> = HashMap::new();
    for stat in stats.iter().filter(|s| s.hour_of_day == reference_hour) {
        reference_means
            .entry(stat.segment.segment_id.as_str())
            .or_default()
            .push(stat.travel_time.mean);
    }
    let reference: HashMap<String, f64> = reference_means
        .into_iter()
        .map(|(segment_id, means)| (segment_id.to_string(), mean(&means)))
        .collect();

    if reference.is_empty() {
        warn!(reference_hour, "Reference hour has no travel times");
    }

    for stat in stats.iter_mut() {
        let base = reference
            .get(&stat.segment.segment_id)
            .copied()
            .unwrap_or(0.0);
        stat.mean_diff = Some(stat.travel_time.mean - base);
    }

    !reference.is_empty()
}
