use anyhow::{Context, Result};
use geo::{Coord, LineString};
use gtfs_structures::{DirectionType, Gtfs, Trip};
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use tracing::{debug, info, warn};

use super::segments::{ShapeStops, StopOnShape, cut_segments};
use super::{Schedule, TripPattern};
use crate::fetch::fetch_bytes;

/// Loads a GTFS archive from a local path or fetches it over HTTP.
#[tracing::instrument]
pub fn fetch_archive(source: &str) -> Result<Vec<u8>> {
    let bytes = if source.starts_with("http") {
        fetch_bytes(source)?
    } else {
        std::fs::read(source).with_context(|| format!("Failed to read schedule archive {source}"))?
    };
    debug!(bytes = bytes.len(), "Schedule archive loaded");
    Ok(bytes)
}

fn direction_id(trip: &Trip) -> u8 {
    match trip.direction_id {
        Some(DirectionType::Inbound) => 1,
        _ => 0,
    }
}

impl Schedule {
    /// Reads and indexes a GTFS archive.
    #[tracing::instrument]
    pub fn load(source: &str) -> Result<Self> {
        let bytes = fetch_archive(source)?;
        let gtfs = Gtfs::from_reader(Cursor::new(bytes))
            .with_context(|| format!("Failed to parse GTFS archive {source}"))?;
        Ok(Self::from_gtfs(&gtfs))
    }

    /// Cuts every (route, direction, shape) into stop-to-stop segments and
    /// names each shape's pattern.
    pub fn from_gtfs(gtfs: &Gtfs) -> Self {
        // (route, direction, shape) -> representative trip
        let mut representatives: BTreeMap<(String, u8, String), &Trip> = BTreeMap::new();
        for trip in gtfs.trips.values() {
            let Some(shape_id) = &trip.shape_id else {
                continue;
            };
            let key = (trip.route_id.clone(), direction_id(trip), shape_id.clone());
            representatives
                .entry(key)
                .and_modify(|current| {
                    let longer = trip.stop_times.len() > current.stop_times.len();
                    let tie = trip.stop_times.len() == current.stop_times.len() && trip.id < current.id;
                    if longer || tie {
                        *current = trip;
                    }
                })
                .or_insert(trip);
        }

        let mut segments = Vec::new();
        let mut pattern_names: HashMap<(String, u8, String), String> = HashMap::new();

        for ((route_id, direction_id, shape_id), trip) in &representatives {
            let Some(points) = gtfs.shapes.get(shape_id) else {
                warn!(shape_id = %shape_id, "Trip references a missing shape");
                continue;
            };
            let mut points: Vec<_> = points.iter().map(|p| (p.sequence, p.longitude, p.latitude)).collect();
            points.sort_by_key(|(sequence, _, _)| *sequence);
            let shape: LineString<f64> = points.into_iter().map(|(_, x, y)| Coord { x, y }).collect();

            let stops: Vec<StopOnShape> = trip
                .stop_times
                .iter()
                .filter_map(|st| {
                    let (Some(lon), Some(lat)) = (st.stop.longitude, st.stop.latitude) else {
                        return None;
                    };
                    Some(StopOnShape {
                        stop_id: st.stop.id.clone(),
                        name: st.stop.name.clone().unwrap_or_default(),
                        sequence: u32::from(st.stop_sequence),
                        position: Coord { x: lon, y: lat },
                    })
                })
                .collect();

            let name = match (stops.first(), stops.last()) {
                (Some(first), Some(last)) => format!("{} - {} ({} stops)", first.name, last.name, stops.len()),
                _ => shape_id.clone(),
            };
            pattern_names.insert((route_id.clone(), *direction_id, shape_id.clone()), name);

            segments.extend(cut_segments(&ShapeStops {
                route_id: route_id.clone(),
                direction_id: *direction_id,
                shape_id: shape_id.clone(),
                shape,
                stops,
            }));
        }

        disambiguate_pattern_names(&mut pattern_names);

        let patterns = gtfs
            .trips
            .values()
            .filter_map(|trip| {
                let shape_id = trip.shape_id.as_ref()?;
                let key = (trip.route_id.clone(), direction_id(trip), shape_id.clone());
                let pattern_name = pattern_names.get(&key)?.clone();
                Some(TripPattern {
                    trip_id: trip.id.clone(),
                    route_id: key.0,
                    direction_id: key.1,
                    shape_id: key.2,
                    pattern_name,
                })
            })
            .collect::<Vec<_>>();

        info!(
            shapes = representatives.len(),
            segments = segments.len(),
            trips = patterns.len(),
            "Schedule indexed"
        );

        Schedule::new(segments, patterns)
    }
}

/// Appends the shape id to pattern names shared by several shapes of one
/// route+direction.
fn disambiguate_pattern_names(names: &mut HashMap<(String, u8, String), String>) {
    let mut seen: HashMap<(String, u8, String), usize> = HashMap::new();
    for ((route_id, direction_id, _), name) in names.iter() {
        *seen.entry((route_id.clone(), *direction_id, name.clone())).or_default() += 1;
    }

    for ((route_id, direction_id, shape_id), name) in names.iter_mut() {
        if seen[&(route_id.clone(), *direction_id, name.clone())] > 1 {
            name.push_str(&format!(" [{shape_id}]"));
        }
    }
}
