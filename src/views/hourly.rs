use geojson::{Feature, FeatureCollection, Geometry, feature::Id};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

use super::colors::ColourScale;
use super::figure::{Figure, Frame, hover_template};
use super::{MapOptions, by_hour};
use crate::analyzers::HourlySegmentStat;
use crate::geometry::{LocalTangentPlane, flat_buffer};

const HOVER_FIELDS: [&str; 9] = [
    "std",
    "25%",
    "50%",
    "75%",
    "count",
    "segment_id",
    "start_stop_name",
    "end_stop_name",
    "distance_m",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HourlyOptions {
    #[serde(flatten)]
    pub map: MapOptions,
    /// Color range in seconds.
    pub time_range: (f64, f64),
    pub colour_scale: ColourScale,
    /// Half-width of the segment polygons in meters.
    pub buffer_m: f64,
    pub opacity: f64,
}

impl Default for HourlyOptions {
    fn default() -> Self {
        Self {
            map: MapOptions::default(),
            time_range: (10.0, 60.0),
            colour_scale: ColourScale::portland(),
            buffer_m: 10.0,
            opacity: 0.9,
        }
    }
}

/// Choropleth of per-segment travel times, one animation frame per hour.
///
/// Colors by `mean`, or by `mean_diff` when `reference_hour` is set; the
/// stats are expected to carry the differential already.
pub fn hourly_figure(stats: &[HourlySegmentStat], reference_hour: Option<u32>, options: &HourlyOptions) -> Figure {
    let colour_label = match reference_hour {
        Some(hour) => format!("mean_diff_{hour:02}"),
        None => "mean".to_string(),
    };

    let mut layout = options
        .map
        .layout(stats.iter().flat_map(|s| s.segment.geometry.coords().map(|c| (c.x, c.y))));
    layout["coloraxis"] = json!({
        "colorscale": options.colour_scale.to_plotly(),
        "reversescale": options.colour_scale.is_reversed(),
        "cmin": options.time_range.0,
        "cmax": options.time_range.1,
        "colorbar": {"title": {"text": colour_label}},
    });

    let Some(plane) = LocalTangentPlane::centered_on(stats.iter().map(|s| &s.segment.geometry)) else {
        return Figure::animated(Vec::new(), layout, "hour_of_day");
    };

    // One polygon set per distinct segment geometry.
    let mut polygons: HashMap<usize, Geometry> = HashMap::new();
    for stat in stats {
        polygons.entry(stat.segment.geometry_key).or_insert_with(|| {
            let metric = plane.project_line(&stat.segment.geometry);
            let buffered = plane.unproject_polygons(&flat_buffer(&metric, options.buffer_m));
            Geometry::new(geojson::Value::from(&buffered))
        });
    }

    let indexed: Vec<(usize, &HourlySegmentStat)> = stats.iter().enumerate().collect();
    let frames = by_hour(&indexed, |(_, s)| s.hour_of_day)
        .into_iter()
        .map(|(hour, rows)| Frame {
            name: hour.to_string(),
            data: vec![trace(&rows, &polygons, reference_hour.is_some(), options, &colour_label)],
        })
        .collect();

    Figure::animated(frames, layout, "hour_of_day")
}

fn trace(
    rows: &[&(usize, &HourlySegmentStat)],
    polygons: &HashMap<usize, Geometry>,
    differential: bool,
    options: &HourlyOptions,
    colour_label: &str,
) -> Value {
    let features: Vec<Feature> = rows
        .iter()
        .map(|(i, stat)| Feature {
            bbox: None,
            geometry: polygons.get(&stat.segment.geometry_key).cloned(),
            id: Some(Id::Number((*i).into())),
            properties: None,
            foreign_members: None,
        })
        .collect();
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let locations: Vec<usize> = rows.iter().map(|(i, _)| *i).collect();
    let z: Vec<f64> = rows
        .iter()
        .map(|(_, s)| {
            if differential {
                s.mean_diff.unwrap_or(s.travel_time.mean)
            } else {
                s.travel_time.mean
            }
        })
        .collect();
    let customdata: Vec<Value> = rows
        .iter()
        .map(|(_, s)| {
            let t = &s.travel_time;
            json!([
                t.std,
                t.q25,
                t.q50,
                t.q75,
                t.count,
                s.segment.segment_id,
                s.segment.start_stop_name,
                s.segment.end_stop_name,
                s.segment.distance_m,
            ])
        })
        .collect();

    json!({
        "type": "choroplethmapbox",
        "geojson": collection,
        "featureidkey": "id",
        "locations": locations,
        "z": z,
        "coloraxis": "coloraxis",
        "marker": {"opacity": options.opacity, "line": {"width": 0}},
        "customdata": customdata,
        "hovertemplate": hover_template(&[(colour_label, "%{z}")], &HOVER_FIELDS),
        "subplot": "mapbox",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures::{joined, segment};
    use crate::analyzers::{apply_reference_hour, hourly_segment_stats};

    #[test]
    fn test_frames_and_features_per_hour() {
        let stats = sample_stats();

        let fig = hourly_figure(&stats, None, &HourlyOptions::default());

        assert_eq!(fig.frame_names(), ["6", "8"]);
        let first = &fig.frames[0]["data"][0];
        assert_eq!(first["type"], json!("choroplethmapbox"));
        assert_eq!(first["locations"], json!([0]));
        assert_eq!(first["geojson"]["features"][0]["id"], json!(0));
        assert_eq!(first["geojson"]["features"][0]["geometry"]["type"], json!("MultiPolygon"));
        assert_eq!(first["z"], json!([40.0]));
        assert_eq!(fig.frames[1]["data"][0]["locations"], json!([1, 2]));
    }

    #[test]
    fn test_layout_defaults() {
        let fig = hourly_figure(&sample_stats(), None, &HourlyOptions::default());

        assert_eq!(fig.layout["coloraxis"]["cmin"], json!(10.0));
        assert_eq!(fig.layout["coloraxis"]["cmax"], json!(60.0));
        assert_eq!(fig.layout["coloraxis"]["colorbar"]["title"]["text"], json!("mean"));
        assert_eq!(fig.data[0]["marker"]["opacity"], json!(0.9));
        assert_eq!(fig.data[0]["marker"]["line"]["width"], json!(0));
    }

    #[test]
    fn test_reference_hour_colours_by_difference() {
        let mut stats = sample_stats();
        apply_reference_hour(&mut stats, 6);

        let fig = hourly_figure(&stats, Some(6), &HourlyOptions::default());

        assert_eq!(fig.layout["coloraxis"]["colorbar"]["title"]["text"], json!("mean_diff_06"));
        assert_eq!(fig.frames[0]["data"][0]["z"], json!([0.0]));
        assert_eq!(fig.frames[1]["data"][0]["z"], json!([60.0, 50.0]));
    }

    #[test]
    fn test_polygon_is_buffer_wide() {
        let stats = sample_stats();
        let fig = hourly_figure(&stats, None, &HourlyOptions::default());

        // The segment runs north-south, so the quad spans 20 m east-west.
        let ring = &fig.data[0]["geojson"]["features"][0]["geometry"]["coordinates"][0][0];
        let lons: Vec<f64> = ring
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c[0].as_f64().unwrap())
            .collect();
        let span = lons.iter().cloned().fold(f64::MIN, f64::max) - lons.iter().cloned().fold(f64::MAX, f64::min);
        let plane = LocalTangentPlane::new(-123.37, 48.451);
        let (width, _) = plane.project(-123.37 + span, 48.451);
        assert!((width - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_stats() {
        let fig = hourly_figure(&[], None, &HourlyOptions::default());
        assert!(fig.data.is_empty());
        assert!(fig.frames.is_empty());
    }

    // Helper functions for tests

    /// A-B: 40 s at 6 and 100 s at 8; B-C: 50 s at 8.
    fn sample_stats() -> Vec<HourlySegmentStat> {
        let ab = segment("A-B", 1, 0);
        let bc = segment("B-C", 2, 1);
        let points = vec![
            joined("t1", &ab, (6, 0, 0)),
            joined("t1", &ab, (6, 0, 40)),
            joined("t2", &ab, (8, 0, 0)),
            joined("t2", &ab, (8, 1, 40)),
            joined("t2", &bc, (8, 5, 0)),
            joined("t2", &bc, (8, 5, 50)),
        ];
        hourly_segment_stats(&points).unwrap()
    }
}
