use geo::{BoundingRect, Coord, LineString};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::geometry::{LocalTangentPlane, locate_point_from};
use crate::schedule::RouteSegment;

/// Nearest-segment lookup over the segments of one shape, in metric space.
pub struct SegmentIndex {
    segments: Vec<(Arc<RouteSegment>, LineString<f64>)>,
    tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>>,
}

impl SegmentIndex {
    pub fn new<'a>(segments: impl IntoIterator<Item = &'a Arc<RouteSegment>>, plane: &LocalTangentPlane) -> Self {
        let segments: Vec<_> = segments
            .into_iter()
            .map(|segment| (segment.clone(), plane.project_line(&segment.geometry)))
            .collect();

        let items = segments
            .iter()
            .enumerate()
            .filter_map(|(i, (_, metric))| {
                let rect = metric.bounding_rect()?;
                let aabb = Rectangle::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                );
                Some(GeomWithData::new(aabb, i))
            })
            .collect();

        Self {
            segments,
            tree: RTree::bulk_load(items),
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Closest segment to a metric `point` no farther than `max_distance`.
    ///
    /// Equidistant segments resolve to the lowest stop sequence, then the
    /// lowest segment id, so every point gets at most one segment.
    pub fn nearest(&self, point: Coord<f64>, max_distance: f64) -> Option<(&Arc<RouteSegment>, f64)> {
        let envelope = AABB::from_corners(
            [point.x - max_distance, point.y - max_distance],
            [point.x + max_distance, point.y + max_distance],
        );

        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|item| {
                let (segment, metric) = &self.segments[item.data];
                let (_, distance) = locate_point_from(metric, point, 0.0)?;
                (distance <= max_distance).then_some((segment, distance))
            })
            .min_by(|(a, da), (b, db)| {
                da.partial_cmp(db)
                    .unwrap_or(Ordering::Equal)
                    .then(a.stop_sequence.cmp(&b.stop_sequence))
                    .then_with(|| a.segment_id.cmp(&b.segment_id))
            })
    }
}
