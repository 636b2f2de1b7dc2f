use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Plotly "Dark24" qualitative palette.
pub const DARK24: [&str; 24] = [
    "#2E91E5", "#E15F99", "#1CA71C", "#FB0D0D", "#DA16FF", "#222A2A", "#B68100", "#750D86",
    "#EB663B", "#511CFB", "#00A08B", "#FB00D1", "#FC0080", "#B2828D", "#6C7C32", "#778AAE",
    "#862A16", "#A777F1", "#620042", "#1616A7", "#DA60CA", "#6C4516", "#0D2A63", "#AF0038",
];

const PORTLAND: [&str; 5] = [
    "rgb(12,51,131)",
    "rgb(10,136,186)",
    "rgb(242,211,56)",
    "rgb(242,143,56)",
    "rgb(217,30,30)",
];

const MAGMA: [&str; 10] = [
    "#000004", "#180f3d", "#440f76", "#721f81", "#9e2f7f", "#cd4071", "#f1605d", "#fd9668",
    "#feca8d", "#fcfdbf",
];

/// A continuous color scale: either a name plotly.js knows, or evenly spaced
/// colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColourScale {
    Named(String),
    Sequence(Vec<String>),
}

impl ColourScale {
    pub fn portland() -> Self {
        Self::Sequence(PORTLAND.iter().map(|c| c.to_string()).collect())
    }

    pub fn magma() -> Self {
        Self::Sequence(MAGMA.iter().map(|c| c.to_string()).collect())
    }

    pub fn reversed(self) -> Self {
        match self {
            Self::Sequence(mut colors) => {
                colors.reverse();
                Self::Sequence(colors)
            }
            Self::Named(name) if name.ends_with("_r") => Self::Named(name.trim_end_matches("_r").to_string()),
            Self::Named(name) => Self::Named(format!("{name}_r")),
        }
    }

    /// The value of a plotly `colorscale` attribute.
    pub fn to_plotly(&self) -> Value {
        match self {
            Self::Named(name) => json!(name.trim_end_matches("_r")),
            Self::Sequence(colors) if colors.len() == 1 => json!([[0.0, colors[0]], [1.0, colors[0]]]),
            Self::Sequence(colors) => {
                let last = (colors.len().max(2) - 1) as f64;
                Value::Array(
                    colors
                        .iter()
                        .enumerate()
                        .map(|(i, c)| json!([i as f64 / last, c]))
                        .collect(),
                )
            }
        }
    }

    /// Named scales ending in `_r` are drawn reversed.
    pub fn is_reversed(&self) -> bool {
        matches!(self, Self::Named(name) if name.ends_with("_r"))
    }
}

/// Picks the `i`-th color of a qualitative sequence, wrapping around.
pub fn cycle(colors: &[String], i: usize) -> Option<&str> {
    if colors.is_empty() {
        None
    } else {
        Some(colors[i % colors.len()].as_str())
    }
}

pub fn dark24() -> Vec<String> {
    DARK24.iter().map(|c| c.to_string()).collect()
}
