//! Tabular output of segments and hourly statistics.
//!
//! Supports JSON logging and CSV append.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::HourlySegmentStat;
use crate::schedule::RouteSegment;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// One CSV row of hourly statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyStatRecord {
    pub route_id: String,
    pub direction_id: u8,
    pub shape_id: String,
    pub segment_id: String,
    pub start_stop_name: String,
    pub end_stop_name: String,
    pub distance_m: f64,
    pub hour_of_day: u32,
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
    pub mean_diff: Option<f64>,
}

impl From<&HourlySegmentStat> for HourlyStatRecord {
    fn from(stat: &HourlySegmentStat) -> Self {
        let s = &stat.segment;
        let t = &stat.travel_time;
        Self {
            route_id: s.route_id.clone(),
            direction_id: s.direction_id,
            shape_id: s.shape_id.clone(),
            segment_id: s.segment_id.clone(),
            start_stop_name: s.start_stop_name.clone(),
            end_stop_name: s.end_stop_name.clone(),
            distance_m: s.distance_m,
            hour_of_day: stat.hour_of_day,
            count: t.count,
            mean: t.mean,
            std: t.std,
            min: t.min,
            q25: t.q25,
            q50: t.q50,
            q75: t.q75,
            max: t.max,
            mean_diff: stat.mean_diff,
        }
    }
}

/// A route segment without its geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRecord {
    pub shape_id: String,
    pub stop_sequence: u32,
    pub segment_id: String,
    pub name: String,
    pub distance_m: f64,
}

impl From<&RouteSegment> for SegmentRecord {
    fn from(s: &RouteSegment) -> Self {
        Self {
            shape_id: s.shape_id.clone(),
            stop_sequence: s.stop_sequence,
            segment_id: s.segment_id.clone(),
            name: s.name(),
            distance_m: s.distance_m,
        }
    }
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends records as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Appends hourly statistics to `path`; returns the number of rows written.
pub fn append_hourly_stats(path: &Path, stats: &[HourlySegmentStat]) -> Result<usize> {
    let records: Vec<HourlyStatRecord> = stats.iter().map(HourlyStatRecord::from).collect();
    append_records(path, &records)?;
    Ok(records.len())
}
