//! Travel-time aggregation over joined points.
//!
//! Both rollups start from the same segment-crossing computation: per-segment
//! hourly statistics feed the choropleth, per-crossing distributions feed the
//! boxplots.

pub mod crossings;
pub mod distributions;
pub mod hourly;
pub mod strict;
pub mod types;
pub mod utility;

#[cfg(test)]
pub(crate) mod fixtures;

pub use crossings::{SequencePolicy, segment_crossings};
pub use distributions::{DEFAULT_CLIP_THRESHOLD, hourly_distributions};
pub use hourly::{apply_reference_hour, hourly_segment_stats};
pub use strict::strict_mode;
pub use types::{DistributionRow, HourlySegmentStat, SegmentCrossing};
pub use utility::Describe;
