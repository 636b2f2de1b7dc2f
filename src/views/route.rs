use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use super::MapOptions;
use super::colors::{cycle, dark24};
use super::figure::{Figure, hover_template};
use crate::schedule::RouteSegment;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteMapOptions {
    #[serde(flatten)]
    pub map: MapOptions,
    pub colour_sequence: Vec<String>,
    pub line_width: f64,
}

impl Default for RouteMapOptions {
    fn default() -> Self {
        Self {
            map: MapOptions::default(),
            colour_sequence: dark24(),
            line_width: 4.0,
        }
    }
}

/// The segments of a route, one line per segment, grouped in the legend by
/// direction label.
pub fn route_figure(directions: &[(String, Vec<Arc<RouteSegment>>)], options: &RouteMapOptions) -> Figure {
    let mut data = Vec::new();
    for (label, segments) in directions {
        for (i, segment) in segments.iter().enumerate() {
            data.push(trace(label, segment, cycle(&options.colour_sequence, i), options.line_width));
        }
    }

    let layout = options.map.layout(
        directions
            .iter()
            .flat_map(|(_, segments)| segments.iter())
            .flat_map(|s| s.geometry.coords().map(|c| (c.x, c.y))),
    );
    Figure::new(data, layout)
}

fn trace(label: &str, segment: &RouteSegment, colour: Option<&str>, width: f64) -> Value {
    let lon: Vec<f64> = segment.geometry.coords().map(|c| c.x).collect();
    let lat: Vec<f64> = segment.geometry.coords().map(|c| c.y).collect();
    let row = json!([
        segment.segment_id,
        segment.name(),
        segment.shape_id,
        segment.stop_sequence,
        segment.distance_m,
    ]);
    let customdata: Vec<&Value> = lon.iter().map(|_| &row).collect();

    let mut line = json!({"width": width});
    if let Some(colour) = colour {
        line["color"] = json!(colour);
    }

    json!({
        "type": "scattermapbox",
        "mode": "lines",
        "lat": lat,
        "lon": lon,
        "name": segment.segment_id,
        "legendgroup": label,
        "legendgrouptitle": {"text": label},
        "line": line,
        "customdata": customdata,
        "hovertemplate": hover_template(
            &[],
            &["segment_id", "segment", "shape_id", "stop_sequence", "distance_m"],
        ),
        "subplot": "mapbox",
    })
}
