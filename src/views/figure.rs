use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tracing::info;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const DIV_ID: &str = "transit-delay-figure";

/// A Plotly figure: traces, layout and optional animation frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlOptions {
    /// Start the animation as soon as the page loads.
    pub auto_play: bool,
    /// URL of the plotly.js bundle.
    pub plotly_js: String,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            auto_play: false,
            plotly_js: PLOTLY_CDN.to_string(),
        }
    }
}

/// One step of an animation: its label and the traces it shows.
pub struct Frame {
    pub name: String,
    pub data: Vec<Value>,
}

impl Figure {
    pub fn new(data: Vec<Value>, layout: Value) -> Self {
        Self {
            data,
            layout,
            frames: Vec::new(),
        }
    }

    /// Builds an animated figure whose first frame is the initial view, with
    /// a slider labelled `{slider_prefix}=` and play/pause buttons.
    pub fn animated(frames: Vec<Frame>, mut layout: Value, slider_prefix: &str) -> Self {
        let Some(first) = frames.first() else {
            return Self::new(Vec::new(), layout);
        };
        let data = first.data.clone();

        let steps: Vec<Value> = frames
            .iter()
            .map(|f| {
                json!({
                    "args": [[f.name], frame_args(0)],
                    "label": f.name,
                    "method": "animate",
                })
            })
            .collect();

        layout["sliders"] = json!([{
            "active": 0,
            "currentvalue": {"prefix": format!("{slider_prefix}=")},
            "len": 0.9,
            "pad": {"b": 10, "t": 60},
            "x": 0.1,
            "xanchor": "left",
            "y": 0,
            "yanchor": "top",
            "steps": steps,
        }]);
        layout["updatemenus"] = json!([{
            "type": "buttons",
            "direction": "left",
            "showactive": false,
            "pad": {"r": 10, "t": 70},
            "x": 0.1,
            "xanchor": "right",
            "y": 0,
            "yanchor": "top",
            "buttons": [
                {"label": "&#9654;", "method": "animate", "args": [null, frame_args(500)]},
                {"label": "&#9724;", "method": "animate", "args": [[null], frame_args(0)]},
            ],
        }]);

        let frames = frames
            .into_iter()
            .map(|f| json!({"name": f.name, "data": f.data}))
            .collect();

        Self { data, layout, frames }
    }

    pub fn frame_names(&self) -> Vec<&str> {
        self.frames.iter().filter_map(|f| f["name"].as_str()).collect()
    }

    pub fn to_html(&self, options: &HtmlOptions) -> Result<String> {
        let data = script_json(&self.data)?;
        let layout = script_json(&self.layout)?;
        let frames = script_json(&self.frames)?;
        let config = script_json(&json!({"responsive": true}))?;

        let height = self.layout["height"]
            .as_u64()
            .map(|h| format!("{h}px"))
            .unwrap_or_else(|| "100%".to_string());
        let autoplay = if options.auto_play {
            format!(".then(function(){{Plotly.animate('{DIV_ID}', null);}})")
        } else {
            String::new()
        };

        Ok(format!(
            r#"<html>
<head><meta charset="utf-8" /></head>
<body>
    <div>
        <script type="text/javascript">window.PlotlyConfig = {{MathJaxConfig: 'local'}};</script>
        <script charset="utf-8" src="{src}"></script>
        <div id="{DIV_ID}" class="plotly-graph-div" style="height:{height}; width:100%;"></div>
        <script type="text/javascript">
            window.PLOTLYENV = window.PLOTLYENV || {{}};
            if (document.getElementById("{DIV_ID}")) {{
                Plotly.newPlot("{DIV_ID}", {data}, {layout}, {config}).then(function(){{
                    Plotly.addFrames("{DIV_ID}", {frames});
                }}){autoplay};
            }}
        </script>
    </div>
</body>
</html>
"#,
            src = options.plotly_js,
        ))
    }

    /// Writes the figure as a standalone HTML page, creating parent
    /// directories as needed.
    pub fn write_html(&self, path: &Path, options: &HtmlOptions) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let html = self.to_html(options)?;
        fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), traces = self.data.len(), frames = self.frames.len(), "Figure written");
        Ok(())
    }
}

fn frame_args(duration: u32) -> Value {
    json!({
        "frame": {"duration": duration, "redraw": true},
        "mode": "immediate",
        "fromcurrent": true,
        "transition": {"duration": duration, "easing": "linear"},
    })
}

/// JSON safe to inline in a `<script>` element.
fn script_json<T: Serialize>(value: &T) -> Result<String> {
    let text = serde_json::to_string(value).context("Failed to serialize figure")?;
    Ok(text.replace("</", "<\\/"))
}

/// Hover template of `label=value` rows: `fixed` placeholders first, then
/// one row per `customdata` column.
pub fn hover_template(fixed: &[(&str, &str)], custom: &[&str]) -> String {
    let mut rows: Vec<String> = fixed
        .iter()
        .map(|(label, value)| format!("{label}={value}"))
        .collect();
    rows.extend(
        custom
            .iter()
            .enumerate()
            .map(|(i, label)| format!("{label}=%{{customdata[{i}]}}")),
    );
    let mut template = rows.join("<br>");
    template.push_str("<extra></extra>");
    template
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animated_first_frame_is_initial_data() {
        let fig = Figure::animated(
            vec![frame("7", 1.0), frame("8", 2.0)],
            json!({"height": 1000}),
            "hour_of_day",
        );

        assert_eq!(fig.data, vec![json!({"x": [1.0]})]);
        assert_eq!(fig.frame_names(), ["7", "8"]);
        assert_eq!(
            fig.layout["sliders"][0]["currentvalue"]["prefix"],
            json!("hour_of_day=")
        );
        assert_eq!(fig.layout["sliders"][0]["steps"][1]["args"][0], json!(["8"]));
        assert_eq!(fig.layout["height"], json!(1000));
    }

    #[test]
    fn test_animated_without_frames() {
        let fig = Figure::animated(Vec::new(), json!({}), "hour_of_day");
        assert!(fig.data.is_empty());
        assert!(fig.frames.is_empty());
        assert!(fig.layout.get("sliders").is_none());
    }

    #[test]
    fn test_html_does_not_autoplay_by_default() {
        let fig = Figure::animated(vec![frame("7", 1.0)], json!({"height": 1000}), "hour_of_day");
        let html = fig.to_html(&HtmlOptions::default()).unwrap();

        assert!(html.contains(PLOTLY_CDN));
        assert!(html.contains("height:1000px"));
        assert!(html.contains("Plotly.addFrames"));
        assert!(!html.contains("Plotly.animate("));

        let autoplay = HtmlOptions {
            auto_play: true,
            ..HtmlOptions::default()
        };
        assert!(fig.to_html(&autoplay).unwrap().contains("Plotly.animate("));
    }

    #[test]
    fn test_html_escapes_script_close() {
        let fig = Figure::new(vec![json!({"name": "</script><b>"})], json!({}));
        let html = fig.to_html(&HtmlOptions::default()).unwrap();
        assert!(!html.contains("</script><b>"));
        assert!(html.contains("<\\/script><b>"));
    }

    #[test]
    fn test_write_html_creates_directory() {
        let dir = std::env::temp_dir().join(format!("transit_delay_fig_{}", std::process::id()));
        let path = dir.join("nested").join("0-Downtown_points.html");
        let _ = fs::remove_dir_all(&dir);

        Figure::new(Vec::new(), json!({})).write_html(&path, &HtmlOptions::default()).unwrap();

        assert!(path.exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_hover_template() {
        assert_eq!(
            hover_template(&[("speed_km", "%{marker.color}")], &["trip_id", "stop_id"]),
            "speed_km=%{marker.color}<br>trip_id=%{customdata[0]}<br>stop_id=%{customdata[1]}<extra></extra>"
        );
    }

    // Helper functions for tests

    fn frame(name: &str, x: f64) -> Frame {
        Frame {
            name: name.to_string(),
            data: vec![json!({"x": [x]})],
        }
    }
}
