use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};

use super::colors::{cycle, dark24};
use super::figure::{Figure, hover_template};
use crate::analyzers::{DEFAULT_CLIP_THRESHOLD, DistributionRow};

const ROW_SPACING: f64 = 0.03;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionOptions {
    /// One color per hour, assigned in hour order.
    pub colour_sequence: Vec<String>,
    /// Upper bound of the y axis, in seconds.
    pub clip_threshold: f64,
    /// One facet row per pattern name.
    pub show_variants: bool,
    pub height: Option<u32>,
}

impl Default for DistributionOptions {
    fn default() -> Self {
        Self {
            colour_sequence: dark24(),
            clip_threshold: DEFAULT_CLIP_THRESHOLD,
            show_variants: false,
            height: None,
        }
    }
}

/// Travel-time boxplots by start stop, one legend entry per hour.
///
/// Only the earliest hour is shown initially; the others are toggled from
/// the legend.
pub fn distributions_figure(rows: &[DistributionRow], options: &DistributionOptions) -> Figure {
    let hours: BTreeSet<u32> = rows.iter().map(|r| r.hour_of_day).collect();
    let facets: Vec<Option<&str>> = if options.show_variants {
        let names: BTreeSet<&str> = rows.iter().map(|r| r.pattern_name.as_str()).collect();
        names.into_iter().map(Some).collect()
    } else {
        vec![None]
    };

    let mut groups: BTreeMap<(u32, Option<&str>), Vec<&DistributionRow>> = BTreeMap::new();
    for row in rows {
        let facet = options.show_variants.then_some(row.pattern_name.as_str());
        groups.entry((row.hour_of_day, facet)).or_default().push(row);
    }

    let mut data = Vec::new();
    for (colour_index, hour) in hours.iter().enumerate() {
        let mut legend_shown = false;
        for (facet_index, facet) in facets.iter().enumerate() {
            let Some(members) = groups.get(&(*hour, *facet)) else {
                continue;
            };
            let mut trace = box_trace(*hour, members, cycle(&options.colour_sequence, colour_index));
            trace["showlegend"] = json!(!legend_shown);
            legend_shown = true;
            if colour_index > 0 {
                trace["visible"] = json!("legendonly");
            }
            if facet_index > 0 {
                trace["xaxis"] = json!(format!("x{}", facet_index + 1));
                trace["yaxis"] = json!(format!("y{}", facet_index + 1));
            }
            data.push(trace);
        }
    }

    Figure::new(data, layout(&facets, options))
}

fn box_trace(hour: u32, rows: &[&DistributionRow], colour: Option<&str>) -> Value {
    let x: Vec<&str> = rows.iter().map(|r| r.segment.start_stop_name.as_str()).collect();
    let y: Vec<f64> = rows.iter().map(|r| r.travel_time).collect();
    let hovertext: Vec<&str> = rows.iter().map(|r| r.segment_name.as_str()).collect();
    let customdata: Vec<Value> = rows
        .iter()
        .map(|r| {
            json!([
                r.stop_sequence,
                r.segment.end_stop_name,
                r.segment.segment_id,
                r.trip_id,
                r.pattern_name,
            ])
        })
        .collect();

    let label = hour.to_string();
    let mut trace = json!({
        "type": "box",
        "name": label,
        "legendgroup": label,
        "offsetgroup": label,
        "x": x,
        "y": y,
        "hovertext": hovertext,
        "customdata": customdata,
        "boxpoints": "all",
        "hovertemplate": hover_template(
            &[
                ("hour_of_day", label.as_str()),
                ("start_stop_name", "%{x}"),
                ("travel_time", "%{y}"),
                ("segment", "%{hovertext}"),
            ],
            &["stop_sequence", "end_stop_name", "segment_id", "trip_id", "pattern_name"],
        ),
    });
    if let Some(colour) = colour {
        trace["marker"] = json!({"color": colour});
    }
    trace
}

fn layout(facets: &[Option<&str>], options: &DistributionOptions) -> Value {
    let n = facets.len().max(1);
    let row_height = (1.0 - ROW_SPACING * (n - 1) as f64) / n as f64;

    let mut layout = json!({
        "boxmode": "overlay",
        "legend": {"title": {"text": "hour_of_day"}, "tracegroupgap": 0},
        "margin": {"t": 60},
    });
    if let Some(height) = options.height {
        layout["height"] = json!(height);
    }

    let mut annotations = Vec::new();
    for (i, facet) in facets.iter().enumerate() {
        // Facet rows run top to bottom.
        let top = 1.0 - i as f64 * (row_height + ROW_SPACING);
        let domain = [top - row_height, top];
        let suffix = if i == 0 { String::new() } else { (i + 1).to_string() };
        let last = i + 1 == n;
        let x_title = if last { "start_stop_name" } else { "" };

        layout[format!("xaxis{suffix}")] = json!({
            "anchor": format!("y{suffix}"),
            "domain": [0.0, 0.98],
            "matches": "x",
            "showticklabels": last,
            "title": {"text": x_title},
        });
        layout[format!("yaxis{suffix}")] = json!({
            "anchor": format!("x{suffix}"),
            "domain": domain,
            "matches": "y",
            "range": [0.0, options.clip_threshold],
            "title": {"text": "travel_time"},
        });
        if let Some(name) = facet {
            annotations.push(json!({
                "text": name,
                "showarrow": false,
                "textangle": 90,
                "x": 0.98,
                "xanchor": "left",
                "xref": "paper",
                "y": (domain[0] + domain[1]) / 2.0,
                "yanchor": "middle",
                "yref": "paper",
            }));
        }
    }
    if !annotations.is_empty() {
        layout["annotations"] = Value::Array(annotations);
    }
    layout
}
