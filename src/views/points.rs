use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::colors::ColourScale;
use super::figure::{Figure, Frame, hover_template};
use super::{MapOptions, by_hour, format_time};
use crate::spatial::JoinedPoint;

pub(super) const HOVER_FIELDS: [&str; 7] = [
    "vehicle_id",
    "speed_km",
    "timestamp",
    "stop_id",
    "current_status",
    "start_time",
    "trip_id",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointMapOptions {
    #[serde(flatten)]
    pub map: MapOptions,
    /// Reversed Portland: slow is red.
    pub colour_scale: ColourScale,
    /// km/h
    pub range_color: (f64, f64),
}

impl Default for PointMapOptions {
    fn default() -> Self {
        Self {
            map: MapOptions::default(),
            colour_scale: ColourScale::portland().reversed(),
            range_color: (0.0, 80.0),
        }
    }
}

/// Joined points colored by speed, one animation frame per hour of day.
pub fn points_figure(points: &[JoinedPoint], options: &PointMapOptions) -> Figure {
    let frames = by_hour(points, |p| p.ping.hour_of_day)
        .into_iter()
        .map(|(hour, members)| Frame {
            name: hour.to_string(),
            data: vec![trace(&members)],
        })
        .collect();

    let mut layout = options.map.layout(points.iter().map(|p| (p.ping.longitude, p.ping.latitude)));
    layout["coloraxis"] = json!({
        "colorscale": options.colour_scale.to_plotly(),
        "reversescale": options.colour_scale.is_reversed(),
        "cmin": options.range_color.0,
        "cmax": options.range_color.1,
        "colorbar": {"title": {"text": "speed_km"}},
    });

    Figure::animated(frames, layout, "hour_of_day")
}

fn trace(points: &[&JoinedPoint]) -> Value {
    let lat: Vec<f64> = points.iter().map(|p| p.ping.latitude).collect();
    let lon: Vec<f64> = points.iter().map(|p| p.ping.longitude).collect();
    let speed: Vec<Option<f64>> = points.iter().map(|p| p.ping.speed_km).collect();
    let ids: Vec<&str> = points
        .iter()
        .map(|p| p.ping.trip_id.as_deref().unwrap_or(""))
        .collect();
    let customdata: Vec<Value> = points.iter().map(|p| hover_row(p)).collect();

    json!({
        "type": "scattermapbox",
        "mode": "markers",
        "lat": lat,
        "lon": lon,
        "ids": ids,
        "marker": {"color": speed, "coloraxis": "coloraxis"},
        "customdata": customdata,
        "hovertemplate": hover_template(&[("latitude", "%{lat}"), ("longitude", "%{lon}")], &HOVER_FIELDS),
        "showlegend": false,
        "subplot": "mapbox",
    })
}

/// Values for [`HOVER_FIELDS`], in order.
pub(super) fn hover_row(point: &JoinedPoint) -> Value {
    let ping = &point.ping;
    json!([
        ping.vehicle_id,
        ping.speed_km,
        format_time(&ping.timestamp),
        ping.stop_id,
        ping.current_status,
        ping.start_time.as_ref().map(format_time),
        ping.trip_id,
    ])
}
