use tracing::debug;

use super::crossings::{SequencePolicy, segment_crossings};
use super::types::DistributionRow;
use crate::error::AnalysisError;
use crate::spatial::JoinedPoint;

/// Crossings whose travel time is at or above this many seconds are left out
/// of the distribution view.
pub const DEFAULT_CLIP_THRESHOLD: f64 = 1000.0;

/// Per-crossing travel times for the distribution view.
///
/// Keeps crossings with `0 < travel_time < clip_threshold`, ordered by hour,
/// pattern name and stop sequence. Fails when a crossing's points disagree on
/// their stop sequence.
pub fn hourly_distributions(
    points: &[JoinedPoint],
    clip_threshold: f64,
) -> Result<Vec<DistributionRow>, AnalysisError> {
    let crossings = segment_crossings(points, SequencePolicy::Strict)?;
    let total = crossings.len();

    let mut rows: Vec<DistributionRow> = crossings
        .into_iter()
        .filter(|c| c.travel_time > 0.0 && c.travel_time < clip_threshold)
        .map(|c| DistributionRow {
            pattern_name: c.pattern.pattern_name.clone(),
            segment_name: c.segment.name(),
            stop_sequence: c.stop_sequence.unwrap_or(c.segment.stop_sequence),
            segment: c.segment,
            trip_id: c.trip_id,
            start_time: c.start_time,
            hour_of_day: c.hour_of_day,
            travel_time: c.travel_time,
        })
        .collect();

    rows.sort_by(|a, b| {
        a.hour_of_day
            .cmp(&b.hour_of_day)
            .then_with(|| a.pattern_name.cmp(&b.pattern_name))
            .then(a.stop_sequence.cmp(&b.stop_sequence))
    });

    debug!(
        crossings = total,
        clipped = total - rows.len(),
        clip_threshold,
        "Travel time distributions computed"
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures::{joined, segment};

    #[test]
    fn test_clip_interval_is_open() {
        let seg = segment("A-B", 1, 0);
        let points = vec![
            // zero travel time
            joined("t1", &seg, (8, 0, 0)),
            // exactly at the threshold
            joined("t2", &seg, (8, 10, 0)),
            joined("t2", &seg, (8, 11, 40)),
            // inside
            joined("t3", &seg, (8, 20, 0)),
            joined("t3", &seg, (8, 21, 39)),
        ];

        let rows = hourly_distributions(&points, 100.0).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].trip_id, "t3");
        assert_eq!(rows[0].travel_time, 99.0);
    }

    #[test]
    fn test_rows_sorted_and_labelled() {
        let ab = segment("A-B", 1, 0);
        let bc = segment("B-C", 2, 1);
        let points = vec![
            joined("t2", &ab, (9, 0, 0)),
            joined("t2", &ab, (9, 0, 50)),
            joined("t1", &bc, (8, 5, 0)),
            joined("t1", &bc, (8, 5, 40)),
            joined("t1", &ab, (8, 0, 0)),
            joined("t1", &ab, (8, 0, 30)),
        ];

        let rows = hourly_distributions(&points, DEFAULT_CLIP_THRESHOLD).unwrap();

        let order: Vec<_> = rows
            .iter()
            .map(|r| (r.hour_of_day, r.stop_sequence))
            .collect();
        assert_eq!(order, [(8, 1), (8, 2), (9, 1)]);
        assert_eq!(rows[0].segment_name, "A St ... B St");
    }

    #[test]
    fn test_ambiguous_sequence_aborts() {
        let first_visit = segment("A-B", 3, 0);
        let second_visit = segment("A-B", 5, 0);
        let points = vec![
            joined("t1", &first_visit, (8, 0, 0)),
            joined("t1", &second_visit, (8, 0, 20)),
        ];

        assert!(hourly_distributions(&points, DEFAULT_CLIP_THRESHOLD).is_err());
    }
}
