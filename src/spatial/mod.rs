//! Spatial join of telemetry pings onto route segments.
//!
//! [`SpatialJoinEngine`] snaps every ping of a direction to the nearest
//! segment of its trip's shape and keeps the result in a [`JoinCache`] until
//! it is explicitly invalidated.

mod index;

pub use index::SegmentIndex;

use anyhow::Result;
use geo::Coord;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::geometry::LocalTangentPlane;
use crate::schedule::{RouteSegment, Schedule, TripPattern};
use crate::telemetry::{PositionPing, TelemetryStore};

/// Pings farther than this from every segment of their shape are dropped.
pub const DEFAULT_TOLERANCE_M: f64 = 12.0;

/// A ping matched to its nearest segment.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedPoint {
    pub ping: PositionPing,
    pub pattern: Arc<TripPattern>,
    pub segment: Arc<RouteSegment>,
    /// Ping-to-segment distance in meters.
    pub distance_m: f64,
}

/// What happened to the pings of one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinSummary {
    pub pings: usize,
    /// Trip missing or not in the schedule for this route+direction.
    pub without_pattern: usize,
    /// No segment of the trip's shape within tolerance.
    pub out_of_tolerance: usize,
    pub joined: usize,
}

/// All joined points of one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionJoin {
    pub direction_id: u8,
    pub points: Vec<JoinedPoint>,
    pub summary: JoinSummary,
}

/// Per-direction joined points, populated lazily.
#[derive(Debug, Default)]
pub struct JoinCache {
    entries: HashMap<u8, Arc<DirectionJoin>>,
}

impl JoinCache {
    pub fn get(&self, direction_id: u8) -> Option<Arc<DirectionJoin>> {
        self.entries.get(&direction_id).cloned()
    }

    pub fn insert(&mut self, join: Arc<DirectionJoin>) {
        self.entries.insert(join.direction_id, join);
    }

    /// Drops one direction; returns whether it was cached.
    pub fn invalidate(&mut self, direction_id: u8) -> bool {
        self.entries.remove(&direction_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct SpatialJoinEngine<S> {
    route_id: String,
    schedule: Arc<Schedule>,
    store: S,
    tolerance_m: f64,
    cache: JoinCache,
}

impl<S: TelemetryStore> SpatialJoinEngine<S> {
    pub fn new(route_id: impl Into<String>, schedule: Arc<Schedule>, store: S) -> Self {
        Self {
            route_id: route_id.into(),
            schedule,
            store,
            tolerance_m: DEFAULT_TOLERANCE_M,
            cache: JoinCache::default(),
        }
    }

    pub fn with_tolerance(mut self, tolerance_m: f64) -> Self {
        self.tolerance_m = tolerance_m;
        self
    }

    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    pub fn schedule(&self) -> &Arc<Schedule> {
        &self.schedule
    }

    pub fn cache(&self) -> &JoinCache {
        &self.cache
    }

    /// Forgets the joined points of one direction so the next call re-reads
    /// telemetry.
    pub fn invalidate(&mut self, direction_id: u8) -> bool {
        self.cache.invalidate(direction_id)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Joined points for `direction_id`, computed on first use and cached.
    pub fn points(&mut self, direction_id: u8) -> Result<Arc<DirectionJoin>> {
        if let Some(cached) = self.cache.get(direction_id) {
            debug!(direction_id, "Joined points served from cache");
            return Ok(cached);
        }

        let join = Arc::new(self.join_direction(direction_id)?);
        self.cache.insert(join.clone());
        Ok(join)
    }

    #[tracing::instrument(skip(self), fields(route_id = %self.route_id))]
    fn join_direction(&self, direction_id: u8) -> Result<DirectionJoin> {
        let pings = self.store.vehicle_positions(&self.route_id, direction_id)?;
        let segments = self.schedule.segments(&self.route_id, direction_id);

        let mut summary = JoinSummary {
            pings: pings.len(),
            ..Default::default()
        };

        let plane = LocalTangentPlane::centered_on(segments.iter().map(|s| &s.geometry));
        if plane.is_none() {
            warn!(direction_id, pings = pings.len(), "Route direction has no segments");
        }

        let mut by_shape: HashMap<&str, Vec<&Arc<RouteSegment>>> = HashMap::new();
        for segment in &segments {
            by_shape.entry(segment.shape_id.as_str()).or_default().push(segment);
        }
        let indexes: HashMap<&str, SegmentIndex> = match &plane {
            Some(plane) => by_shape
                .into_iter()
                .map(|(shape_id, shape_segments)| (shape_id, SegmentIndex::new(shape_segments, plane)))
                .collect(),
            None => HashMap::new(),
        };

        let mut points = Vec::new();
        for ping in pings {
            let pattern = ping
                .trip_id
                .as_deref()
                .and_then(|trip_id| self.schedule.pattern(trip_id, &ping.route_id, ping.direction_id));
            let Some(pattern) = pattern else {
                summary.without_pattern += 1;
                continue;
            };

            let nearest = plane.as_ref().and_then(|plane| {
                let (x, y) = plane.project(ping.longitude, ping.latitude);
                indexes
                    .get(pattern.shape_id.as_str())
                    .and_then(|index| index.nearest(Coord { x, y }, self.tolerance_m))
            });
            let Some((segment, distance_m)) = nearest else {
                summary.out_of_tolerance += 1;
                continue;
            };

            points.push(JoinedPoint {
                pattern: pattern.clone(),
                segment: segment.clone(),
                distance_m,
                ping,
            });
        }

        summary.joined = points.len();
        info!(
            pings = summary.pings,
            without_pattern = summary.without_pattern,
            out_of_tolerance = summary.out_of_tolerance,
            joined = summary.joined,
            "Spatial join complete"
        );

        Ok(DirectionJoin {
            direction_id,
            points,
            summary,
        })
    }
}
