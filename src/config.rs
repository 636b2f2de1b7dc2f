use anyhow::{Context, Result, ensure};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::spatial::DEFAULT_TOLERANCE_M;
use crate::views::{MapCenter, MapOptions, View, ViewOptions};

pub const DATABASE_ENV: &str = "TRANSIT_DELAY_DB";
pub const SCHEDULE_ENV: &str = "TRANSIT_DELAY_SCHEDULE";

/// A route to study and the names of its directions, indexed by
/// `direction_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub route_id: String,
    pub directions: Vec<String>,
}

/// Everything a study run needs.
///
/// Stored as JSON on disk:
/// ```json
/// {
///   "database": "data/vehicle_positions.sqlite",
///   "schedule": "https://bct.tmix.se/Tmix.Cap.TdExport.WebApi/gtfs/?operatorIds=48",
///   "routes": [
///     { "route_id": "6-VIC", "directions": ["Royal Oak", "Downtown"] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    /// SQLite file with the `vehicle_positions` table.
    pub database: PathBuf,
    /// GTFS zip: local path or http(s) URL.
    pub schedule: String,
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_tolerance")]
    pub tolerance_m: f64,
    /// Base map shared by every map view.
    #[serde(default = "default_map")]
    pub map: MapOptions,
    #[serde(default)]
    pub views: ViewOptions,
    /// Views written by `render` when none are given on the command line.
    #[serde(default = "default_render")]
    pub render: Vec<View>,
    /// Hourly choropleths to draw as a difference against these hours.
    #[serde(default)]
    pub reference_hours: Vec<u32>,
    pub routes: Vec<RouteConfig>,
}

fn default_timezone() -> Tz {
    chrono_tz::America::Vancouver
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE_M
}

fn default_map() -> MapOptions {
    MapOptions {
        center: Some(MapCenter {
            lat: 48.4566,
            lon: -123.3763,
        }),
        ..MapOptions::default()
    }
}

fn default_render() -> Vec<View> {
    View::DEFAULT.to_vec()
}

impl StudyConfig {
    /// Loads the config from a JSON file at `path`, then applies environment
    /// overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read study config {}", path.display()))?;
        let mut config = Self::from_json(&content)?;
        config.apply_overrides(std::env::var(DATABASE_ENV).ok(), std::env::var(SCHEDULE_ENV).ok());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).context("Invalid study config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, database: Option<String>, schedule: Option<String>) {
        if let Some(database) = database.filter(|d| !d.is_empty()) {
            self.database = PathBuf::from(database);
        }
        if let Some(schedule) = schedule.filter(|s| !s.is_empty()) {
            self.schedule = schedule;
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.routes.is_empty(), "Study config lists no routes");
        for route in &self.routes {
            ensure!(
                !route.directions.is_empty(),
                "Route {} has no direction labels",
                route.route_id
            );
        }
        ensure!(self.tolerance_m > 0.0, "tolerance_m must be positive");
        if let Some(hour) = self.reference_hours.iter().find(|h| **h > 23) {
            anyhow::bail!("Reference hour {hour} is not an hour of the day");
        }
        Ok(())
    }

    pub fn route(&self, route_id: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|r| r.route_id == route_id)
    }

    /// View settings with the shared base map applied.
    pub fn view_options(&self) -> ViewOptions {
        self.views.clone().with_map(&self.map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = StudyConfig::from_json(MINIMAL).unwrap();

        assert_eq!(config.timezone, chrono_tz::America::Vancouver);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.tolerance_m, 12.0);
        assert_eq!(config.render, [View::Points, View::Distributions, View::SlowZones]);
        assert_eq!(config.map.zoom(), 12.0);
        assert_eq!(config.map.height(), 1000);
        assert_eq!(config.map.center.unwrap().lat, 48.4566);
        assert_eq!(config.route("6-VIC").unwrap().directions[1], "Downtown");
        assert!(config.route("14-VIC").is_none());
    }

    #[test]
    fn test_view_options_share_map() {
        let mut config = StudyConfig::from_json(MINIMAL).unwrap();
        config.map.zoom = Some(13.0);

        let views = config.view_options();
        assert_eq!(views.points.map.zoom(), 13.0);
        assert_eq!(views.hourly.map.zoom(), 13.0);
        assert_eq!(views.route.map.center.unwrap().lat, 48.4566);
        assert_eq!(views.slow_zones.threshold, 15.0);
        assert_eq!(views.hourly.time_range, (10.0, 60.0));
    }

    #[test]
    fn test_view_settings_from_json() {
        let json = r#"{
            "database": "positions.sqlite",
            "schedule": "gtfs.zip",
            "timezone": "America/Toronto",
            "views": {
                "slow_zones": {"threshold": 10.0},
                "distributions": {"show_variants": true, "clip_threshold": 600.0}
            },
            "render": ["hourly"],
            "reference_hours": [6],
            "routes": [{"route_id": "6-VIC", "directions": ["Royal Oak", "Downtown"]}]
        }"#;

        let config = StudyConfig::from_json(json).unwrap();

        assert_eq!(config.timezone, chrono_tz::America::Toronto);
        assert_eq!(config.views.slow_zones.threshold, 10.0);
        assert_eq!(config.views.slow_zones.radius, 10);
        assert!(config.views.distributions.show_variants);
        assert_eq!(config.views.distributions.clip_threshold, 600.0);
        assert_eq!(config.render, [View::Hourly]);
        assert_eq!(config.reference_hours, [6]);
    }

    #[test]
    fn test_per_view_map_settings_win_over_shared_map() {
        let json = r#"{
            "database": "positions.sqlite",
            "schedule": "gtfs.zip",
            "map": {"zoom": 13.0},
            "views": {
                "points": {"zoom": 15.0, "height": 600},
                "hourly": {"style": "carto-positron"}
            },
            "routes": [{"route_id": "6-VIC", "directions": ["Royal Oak"]}]
        }"#;

        let views = StudyConfig::from_json(json).unwrap().view_options();

        assert_eq!(views.points.map.zoom(), 15.0);
        assert_eq!(views.points.map.height(), 600);
        assert_eq!(views.hourly.map.style(), "carto-positron");
        assert_eq!(views.hourly.map.zoom(), 13.0);
        assert_eq!(views.slow_zones.map.zoom(), 13.0);
        assert_eq!(views.slow_zones.map.height(), 1000);
        // an explicit shared map replaces the default center
        assert!(views.points.map.center.is_none());
    }

    #[test]
    fn test_overrides() {
        let mut config = StudyConfig::from_json(MINIMAL).unwrap();

        config.apply_overrides(Some("/data/other.sqlite".to_string()), Some(String::new()));

        assert_eq!(config.database, PathBuf::from("/data/other.sqlite"));
        assert_eq!(config.schedule, "gtfs.zip");
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(StudyConfig::from_json(r#"{"database": "a", "schedule": "b", "routes": []}"#).is_err());
        assert!(
            StudyConfig::from_json(r#"{"database": "a", "schedule": "b", "routes": [{"route_id": "6", "directions": []}]}"#)
                .is_err()
        );
        assert!(StudyConfig::from_json(r#"{"database": "a", "schedule": "b", "timezone": "Mars/Base", "routes": [{"route_id": "6", "directions": ["x"]}]}"#).is_err());
        assert!(StudyConfig::from_json(r#"{"database": "a", "schedule": "b", "reference_hours": [24], "routes": [{"route_id": "6", "directions": ["x"]}]}"#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = StudyConfig::load(Path::new("/nonexistent/study.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/study.json"));
    }

    // Helper functions for tests

    const MINIMAL: &str = r#"{
        "database": "positions.sqlite",
        "schedule": "gtfs.zip",
        "routes": [{"route_id": "6-VIC", "directions": ["Royal Oak", "Downtown"]}]
    }"#;
}
