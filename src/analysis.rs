//! One route's analysis session: joined points per direction and the views
//! built from them.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::analyzers::{
    DistributionRow, HourlySegmentStat, apply_reference_hour, hourly_distributions, hourly_segment_stats,
};
use crate::error::AnalysisError;
use crate::schedule::{RouteSegment, Schedule};
use crate::spatial::{DirectionJoin, SpatialJoinEngine};
use crate::telemetry::TelemetryStore;
use crate::views::{
    DistributionOptions, Figure, HourlyOptions, PointMapOptions, RouteMapOptions, SlowZoneOptions, View,
    ViewOptions, distributions_figure, hourly_figure, output_file_name, points_figure, route_figure,
    slow_zones_figure,
};

/// Analysis of one route: direction labels plus a caching join engine.
pub struct RouteAnalysis<S> {
    direction_labels: Vec<String>,
    engine: SpatialJoinEngine<S>,
}

impl<S: TelemetryStore> RouteAnalysis<S> {
    /// `direction_labels[d]` names direction `d`, e.g. `["Royal Oak", "Downtown"]`.
    pub fn new(route_id: impl Into<String>, direction_labels: Vec<String>, schedule: Arc<Schedule>, store: S) -> Self {
        Self {
            direction_labels,
            engine: SpatialJoinEngine::new(route_id, schedule, store),
        }
    }

    pub fn with_tolerance(mut self, tolerance_m: f64) -> Self {
        self.engine = self.engine.with_tolerance(tolerance_m);
        self
    }

    pub fn route_id(&self) -> &str {
        self.engine.route_id()
    }

    pub fn engine(&self) -> &SpatialJoinEngine<S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SpatialJoinEngine<S> {
        &mut self.engine
    }

    /// Direction ids that have a label.
    pub fn directions(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.direction_labels.len()).filter_map(|d| u8::try_from(d).ok())
    }

    pub fn direction_label(&self, direction_id: u8) -> Result<&str, AnalysisError> {
        self.direction_labels
            .get(usize::from(direction_id))
            .map(String::as_str)
            .ok_or(AnalysisError::UnknownDirection {
                direction: direction_id,
                labels: self.direction_labels.len(),
            })
    }

    /// Joined points of a labelled direction, cached by the engine.
    pub fn points(&mut self, direction_id: u8) -> Result<Arc<DirectionJoin>> {
        self.direction_label(direction_id)?;
        self.engine.points(direction_id)
    }

    /// Segments of the given directions, grouped by direction label.
    pub fn plot_route(&self, directions: &[u8], options: &RouteMapOptions) -> Result<Figure> {
        let mut labelled: Vec<(String, Vec<Arc<RouteSegment>>)> = Vec::new();
        for &direction_id in directions {
            let label = self.direction_label(direction_id)?.to_string();
            labelled.push((label, self.engine.schedule().segments(self.route_id(), direction_id)));
        }
        Ok(route_figure(&labelled, options))
    }

    pub fn plot_points(&mut self, direction_id: u8, options: &PointMapOptions) -> Result<Figure> {
        let join = self.points(direction_id)?;
        Ok(points_figure(&join.points, options))
    }

    pub fn plot_slow_zones(&mut self, direction_id: u8, options: &SlowZoneOptions) -> Result<Figure> {
        let join = self.points(direction_id)?;
        Ok(slow_zones_figure(&join.points, options))
    }

    /// Hourly segment statistics, with `mean_diff` filled in when a
    /// reference hour is given.
    pub fn hourly_stats(&mut self, direction_id: u8, reference_hour: Option<u32>) -> Result<Vec<HourlySegmentStat>> {
        let join = self.points(direction_id)?;
        let mut stats = hourly_segment_stats(&join.points)?;
        if let Some(hour) = reference_hour {
            apply_reference_hour(&mut stats, hour);
        }
        Ok(stats)
    }

    pub fn plot_hourly(
        &mut self,
        direction_id: u8,
        reference_hour: Option<u32>,
        options: &HourlyOptions,
    ) -> Result<Figure> {
        let stats = self.hourly_stats(direction_id, reference_hour)?;
        Ok(hourly_figure(&stats, reference_hour, options))
    }

    pub fn distributions(&mut self, direction_id: u8, clip_threshold: f64) -> Result<Vec<DistributionRow>> {
        let join = self.points(direction_id)?;
        Ok(hourly_distributions(&join.points, clip_threshold)?)
    }

    pub fn plot_hourly_distributions(&mut self, direction_id: u8, options: &DistributionOptions) -> Result<Figure> {
        let rows = self.distributions(direction_id, options.clip_threshold)?;
        Ok(distributions_figure(&rows, options))
    }

    /// Renders one view of one direction into `output_dir` and returns the
    /// written path.
    #[tracing::instrument(skip(self, options, output_dir), fields(route_id = %self.route_id()))]
    pub fn render(
        &mut self,
        direction_id: u8,
        view: View,
        reference_hour: Option<u32>,
        options: &ViewOptions,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let label = self.direction_label(direction_id)?.to_string();
        let figure = match view {
            View::Route => self.plot_route(&[direction_id], &options.route)?,
            View::Points => self.plot_points(direction_id, &options.points)?,
            View::SlowZones => self.plot_slow_zones(direction_id, &options.slow_zones)?,
            View::Hourly => self.plot_hourly(direction_id, reference_hour, &options.hourly)?,
            View::Distributions => self.plot_hourly_distributions(direction_id, &options.distributions)?,
        };

        let path = output_dir.join(output_file_name(direction_id, &label, view, reference_hour));
        figure.write_html(&path, &options.html)?;
        info!(direction_id, direction = %label, ?view, path = %path.display(), "View rendered");
        Ok(path)
    }
}
