//! Typed faults raised by the analysis pipeline.
//!
//! Upstream failures (database, schedule archive, I/O) travel as
//! [`anyhow::Error`]; the variants here are the domain faults a caller may
//! want to match on.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// A strict-mode aggregate found more than one equally frequent value.
    #[error("Multiple modes found for '{column}': {}", format_counts(.counts))]
    AmbiguousMode {
        column: String,
        /// Every distinct value with its frequency, most frequent first.
        counts: Vec<(String, usize)>,
    },
    #[error("Cannot aggregate '{column}' over an empty group")]
    EmptyGroup { column: String },
    #[error("Direction {direction} has no label (route has {labels} directions)")]
    UnknownDirection { direction: u8, labels: usize },
    #[error("Timestamp {value} in column '{column}' is out of range")]
    InvalidTimestamp { column: String, value: f64 },
}

fn format_counts(counts: &[(String, usize)]) -> String {
    counts
        .iter()
        .map(|(value, count)| format!("{value}: {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}
