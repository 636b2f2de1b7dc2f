//! Plotly renderers for joined points and travel-time statistics.
//!
//! Every renderer is a pure function from analysis output plus an options
//! struct to a [`Figure`]. Writing the figure to disk is the caller's job.

pub mod colors;
pub mod distributions;
pub mod figure;
pub mod hourly;
pub mod points;
pub mod route;
pub mod slow_zones;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

pub use colors::ColourScale;
pub use distributions::{DistributionOptions, distributions_figure};
pub use figure::{Figure, Frame, HtmlOptions};
pub use hourly::{HourlyOptions, hourly_figure};
pub use points::{PointMapOptions, points_figure};
pub use route::{RouteMapOptions, route_figure};
pub use slow_zones::{SlowZoneOptions, slow_zones_figure};

/// The figures a study can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Route,
    Points,
    SlowZones,
    Hourly,
    Distributions,
}

impl View {
    /// Views rendered when a study names none.
    pub const DEFAULT: [View; 3] = [View::Points, View::Distributions, View::SlowZones];

    /// File name suffix; `reference_hour` only affects the hourly view.
    pub fn suffix(self, reference_hour: Option<u32>) -> String {
        match (self, reference_hour) {
            (View::Route, _) => "route".to_string(),
            (View::Points, _) => "points".to_string(),
            (View::SlowZones, _) => "slow_zones".to_string(),
            (View::Hourly, None) => "hourly".to_string(),
            (View::Hourly, Some(hour)) => format!("hourly_{hour}"),
            (View::Distributions, _) => "distr_hourly".to_string(),
        }
    }
}

/// `{direction}-{direction_label}_{view}.html`
pub fn output_file_name(direction_id: u8, direction_label: &str, view: View, reference_hour: Option<u32>) -> String {
    format!("{direction_id}-{direction_label}_{}.html", view.suffix(reference_hour))
}

/// Settings for every view, keyed as in a study file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    pub route: RouteMapOptions,
    pub points: PointMapOptions,
    pub slow_zones: SlowZoneOptions,
    pub hourly: HourlyOptions,
    pub distributions: DistributionOptions,
    pub html: HtmlOptions,
}

impl ViewOptions {
    /// Fills every map setting a view leaves unset from `map`.
    pub fn with_map(mut self, map: &MapOptions) -> Self {
        self.route.map = self.route.map.or(map);
        self.points.map = self.points.map.or(map);
        self.slow_zones.map = self.slow_zones.map.or(map);
        self.hourly.map = self.hourly.map.or(map);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapCenter {
    pub lat: f64,
    pub lon: f64,
}

const DEFAULT_STYLE: &str = "open-street-map";
const DEFAULT_ZOOM: f64 = 12.0;
const DEFAULT_HEIGHT: u32 = 1000;

/// Base map settings of a map view.
///
/// Unset fields fall back to a shared base map, then to built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    /// Mapbox style; `open-street-map` needs no token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Fixed map center. When unset, the mean of the plotted coordinates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<MapCenter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl MapOptions {
    /// Field by field: `self` where set, otherwise `base`.
    pub fn or(self, base: &MapOptions) -> MapOptions {
        MapOptions {
            style: self.style.or_else(|| base.style.clone()),
            center: self.center.or(base.center),
            zoom: self.zoom.or(base.zoom),
            height: self.height.or(base.height),
        }
    }

    pub fn style(&self) -> &str {
        self.style.as_deref().unwrap_or(DEFAULT_STYLE)
    }

    pub fn zoom(&self) -> f64 {
        self.zoom.unwrap_or(DEFAULT_ZOOM)
    }

    pub fn height(&self) -> u32 {
        self.height.unwrap_or(DEFAULT_HEIGHT)
    }

    pub(crate) fn layout(&self, coords: impl IntoIterator<Item = (f64, f64)>) -> Value {
        let center = self.center.unwrap_or_else(|| mean_center(coords));
        json!({
            "mapbox": {
                "style": self.style(),
                "center": {"lat": center.lat, "lon": center.lon},
                "zoom": self.zoom(),
            },
            "height": self.height(),
            "margin": {"t": 60, "l": 0, "r": 0, "b": 0},
            "legend": {"tracegrouporder": "tracegroupgroup"},
        })
    }
}

/// Mean of `(lon, lat)` pairs; the origin when there are none.
fn mean_center(coords: impl IntoIterator<Item = (f64, f64)>) -> MapCenter {
    let (mut lon, mut lat, mut n) = (0.0, 0.0, 0usize);
    for (x, y) in coords {
        lon += x;
        lat += y;
        n += 1;
    }
    if n == 0 {
        return MapCenter { lat: 0.0, lon: 0.0 };
    }
    MapCenter {
        lat: lat / n as f64,
        lon: lon / n as f64,
    }
}

/// Groups items by hour of day, ascending.
pub(crate) fn by_hour<'a, T>(items: &'a [T], hour: impl Fn(&T) -> u32) -> BTreeMap<u32, Vec<&'a T>> {
    let mut groups: BTreeMap<u32, Vec<&T>> = BTreeMap::new();
    for item in items {
        groups.entry(hour(item)).or_default().push(item);
    }
    groups
}

pub(crate) fn format_time(ts: &DateTime<Tz>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}
