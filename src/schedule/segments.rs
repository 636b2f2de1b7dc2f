use geo::{Coord, LineString};
use tracing::debug;

use super::RouteSegment;
use crate::geometry::{LocalTangentPlane, line_length, line_substring, locate_point_from};

/// A stop served by a pattern, in service order.
#[derive(Debug, Clone)]
pub struct StopOnShape {
    pub stop_id: String,
    pub name: String,
    pub sequence: u32,
    /// (lon, lat)
    pub position: Coord<f64>,
}

/// One shape of a route+direction together with the stops a representative
/// trip serves along it.
#[derive(Debug, Clone)]
pub struct ShapeStops {
    pub route_id: String,
    pub direction_id: u8,
    pub shape_id: String,
    /// (lon, lat)
    pub shape: LineString<f64>,
    pub stops: Vec<StopOnShape>,
}

/// Cuts a shape into stop-to-stop segments.
///
/// Each stop is located on the shape no earlier than the previous stop, so
/// loops and out-and-back patterns cut in service order. When a stop cannot
/// be placed after its predecessor the segment falls back to a straight line
/// between the two stops.
pub fn cut_segments(shape: &ShapeStops) -> Vec<RouteSegment> {
    if shape.shape.0.len() < 2 || shape.stops.len() < 2 {
        debug!(shape_id = %shape.shape_id, "Shape too short to cut");
        return Vec::new();
    }

    let Some(plane) = LocalTangentPlane::centered_on([&shape.shape]) else {
        return Vec::new();
    };
    let metric = plane.project_line(&shape.shape);

    let mut offsets: Vec<Option<f64>> = Vec::with_capacity(shape.stops.len());
    let mut from_m = 0.0;
    for stop in &shape.stops {
        let (x, y) = plane.project(stop.position.x, stop.position.y);
        let located = locate_point_from(&metric, Coord { x, y }, from_m).map(|(along, _)| along);
        if let Some(along) = located {
            from_m = along;
        }
        offsets.push(located);
    }

    shape
        .stops
        .windows(2)
        .zip(offsets.windows(2))
        .map(|(stops, offsets)| {
            let (start, end) = (&stops[0], &stops[1]);

            let metric_segment = match (offsets[0], offsets[1]) {
                (Some(a), Some(b)) if b > a => line_substring(&metric, a, b),
                _ => {
                    let (x0, y0) = plane.project(start.position.x, start.position.y);
                    let (x1, y1) = plane.project(end.position.x, end.position.y);
                    LineString::from(vec![(x0, y0), (x1, y1)])
                }
            };

            RouteSegment {
                route_id: shape.route_id.clone(),
                direction_id: shape.direction_id,
                shape_id: shape.shape_id.clone(),
                segment_id: format!("{}-{}", start.stop_id, end.stop_id),
                stop_sequence: start.sequence,
                start_stop_id: start.stop_id.clone(),
                start_stop_name: start.name.clone(),
                end_stop_id: end.stop_id.clone(),
                end_stop_name: end.name.clone(),
                distance_m: line_length(&metric_segment),
                geometry: plane.unproject_line(&metric_segment),
                geometry_key: 0,
            }
        })
        .collect()
}
