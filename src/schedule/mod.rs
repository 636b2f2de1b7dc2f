//! Static schedule: route segment geometry and the trip-to-pattern mapping.
//!
//! [`Schedule::load`] reads a GTFS archive once per session; everything
//! downstream only reads from it.

mod loader;
mod segments;

pub use loader::fetch_archive;
pub use segments::{ShapeStops, StopOnShape, cut_segments};

use geo::LineString;
use std::collections::HashMap;
use std::sync::Arc;

/// The portion of one shape between two consecutive stops.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSegment {
    pub route_id: String,
    pub direction_id: u8,
    pub shape_id: String,
    /// `"{start_stop_id}-{end_stop_id}"`, unique within route+direction+shape
    /// unless the shape visits the same stop pair twice.
    pub segment_id: String,
    /// GTFS `stop_sequence` of the start stop.
    pub stop_sequence: u32,
    pub start_stop_id: String,
    pub start_stop_name: String,
    pub end_stop_id: String,
    pub end_stop_name: String,
    pub distance_m: f64,
    /// Geographic (lon, lat) coordinates.
    pub geometry: LineString<f64>,
    /// Shared by segments with the same id and an identical geometry.
    pub geometry_key: usize,
}

impl RouteSegment {
    /// Human readable `"A ... B"` label.
    pub fn name(&self) -> String {
        format!("{} ... {}", self.start_stop_name, self.end_stop_name)
    }
}

/// Which shape (drive pattern) a scheduled trip follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripPattern {
    pub trip_id: String,
    pub route_id: String,
    pub direction_id: u8,
    pub shape_id: String,
    pub pattern_name: String,
}

#[derive(Debug, Default)]
pub struct Schedule {
    segments: Vec<Arc<RouteSegment>>,
    patterns_by_trip: HashMap<String, Vec<Arc<TripPattern>>>,
}

impl Schedule {
    /// Builds a schedule from in-memory records, assigning geometry keys.
    pub fn new(segments: Vec<RouteSegment>, patterns: Vec<TripPattern>) -> Self {
        let mut keys: HashMap<(String, Vec<(u64, u64)>), usize> = HashMap::new();

        let segments = segments
            .into_iter()
            .map(|mut segment| {
                let fingerprint = segment
                    .geometry
                    .coords()
                    .map(|c| (c.x.to_bits(), c.y.to_bits()))
                    .collect();
                let next = keys.len();
                segment.geometry_key = *keys
                    .entry((segment.segment_id.clone(), fingerprint))
                    .or_insert(next);
                Arc::new(segment)
            })
            .collect();

        let mut patterns_by_trip: HashMap<String, Vec<Arc<TripPattern>>> = HashMap::new();
        for pattern in patterns {
            patterns_by_trip
                .entry(pattern.trip_id.clone())
                .or_default()
                .push(Arc::new(pattern));
        }

        Self {
            segments,
            patterns_by_trip,
        }
    }

    /// All segments of `route_id`, in both directions.
    pub fn route_segments<'a>(&'a self, route_id: &'a str) -> impl Iterator<Item = &'a Arc<RouteSegment>> {
        self.segments.iter().filter(move |s| s.route_id == route_id)
    }

    /// Segments of one route and direction, in schedule order.
    pub fn segments(&self, route_id: &str, direction_id: u8) -> Vec<Arc<RouteSegment>> {
        self.route_segments(route_id)
            .filter(|s| s.direction_id == direction_id)
            .cloned()
            .collect()
    }

    pub fn pattern(&self, trip_id: &str, route_id: &str, direction_id: u8) -> Option<&Arc<TripPattern>> {
        self.patterns_by_trip
            .get(trip_id)?
            .iter()
            .find(|p| p.route_id == route_id && p.direction_id == direction_id)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &Arc<TripPattern>> {
        self.patterns_by_trip.values().flatten()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}
