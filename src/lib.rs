pub mod analysis;
pub mod analyzers;
pub mod config;
pub mod error;
pub mod fetch;
pub mod geometry;
pub mod output;
pub mod schedule;
pub mod spatial;
pub mod telemetry;
pub mod views;
