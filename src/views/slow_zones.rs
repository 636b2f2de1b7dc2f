use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::colors::ColourScale;
use super::figure::{Figure, Frame, hover_template};
use super::points::{HOVER_FIELDS, hover_row};
use super::{MapOptions, by_hour};
use crate::spatial::JoinedPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlowZoneOptions {
    #[serde(flatten)]
    pub map: MapOptions,
    /// Points at or above this speed (km/h) are left out.
    pub threshold: f64,
    /// Density kernel radius in pixels.
    pub radius: u32,
    pub colour_scale: ColourScale,
}

impl Default for SlowZoneOptions {
    fn default() -> Self {
        Self {
            map: MapOptions::default(),
            threshold: 15.0,
            radius: 10,
            colour_scale: ColourScale::magma(),
        }
    }
}

/// Density heatmap of slow points, one animation frame per hour of day.
///
/// Points without a speed are not slow.
pub fn slow_zones_figure(points: &[JoinedPoint], options: &SlowZoneOptions) -> Figure {
    let slow: Vec<&JoinedPoint> = points
        .iter()
        .filter(|p| p.ping.speed_km.is_some_and(|s| s < options.threshold))
        .collect();
    debug!(
        points = points.len(),
        slow = slow.len(),
        threshold = options.threshold,
        "Slow points selected"
    );

    let frames = by_hour(&slow, |p| p.ping.hour_of_day)
        .into_iter()
        .map(|(hour, members)| Frame {
            name: hour.to_string(),
            data: vec![trace(&members, options.radius)],
        })
        .collect();

    let mut layout = options.map.layout(slow.iter().map(|p| (p.ping.longitude, p.ping.latitude)));
    layout["coloraxis"] = json!({
        "colorscale": options.colour_scale.to_plotly(),
        "reversescale": options.colour_scale.is_reversed(),
    });

    Figure::animated(frames, layout, "hour_of_day")
}

fn trace(points: &[&&JoinedPoint], radius: u32) -> Value {
    let lat: Vec<f64> = points.iter().map(|p| p.ping.latitude).collect();
    let lon: Vec<f64> = points.iter().map(|p| p.ping.longitude).collect();
    let customdata: Vec<Value> = points
        .iter()
        .map(|p| {
            let mut row = hover_row(p);
            if let Value::Array(values) = &mut row {
                values.push(json!(p.segment.segment_id));
            }
            row
        })
        .collect();
    let fields: Vec<&str> = HOVER_FIELDS.iter().copied().chain(["segment_id"]).collect();

    json!({
        "type": "densitymapbox",
        "lat": lat,
        "lon": lon,
        "radius": radius,
        "coloraxis": "coloraxis",
        "customdata": customdata,
        "hovertemplate": hover_template(&[("latitude", "%{lat}"), ("longitude", "%{lon}")], &fields),
        "subplot": "mapbox",
    })
}
