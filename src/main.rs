//! CLI entry point for the transit delay study tool.
//!
//! Provides subcommands for rendering a study's maps and charts, listing a
//! route's stop-to-stop segments, and exporting hourly travel-time statistics.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_delay::{
    analysis::RouteAnalysis,
    config::{RouteConfig, StudyConfig},
    output::{SegmentRecord, append_hourly_stats, print_json},
    schedule::Schedule,
    telemetry::SqliteTelemetry,
    views::View,
};

#[derive(Parser)]
#[command(name = "transit_delay")]
#[command(about = "Map where and when buses lose time along their routes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the study's views for every configured route and direction
    Render {
        /// Study config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Only render this route
        #[arg(short, long)]
        route: Option<String>,

        /// Views to render (defaults to the study's `render` list)
        #[arg(short, long = "view", value_enum)]
        views: Vec<View>,
    },
    /// List a route's stop-to-stop segments
    Segments {
        /// Path or URL of the GTFS archive
        #[arg(short, long, value_name = "FILE_OR_URL")]
        schedule: String,

        #[arg(short, long)]
        route: String,

        /// Only list this direction
        #[arg(short, long)]
        direction: Option<u8>,
    },
    /// Append a direction's hourly segment statistics to a CSV file
    Export {
        /// Study config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        route: String,

        #[arg(short, long)]
        direction: u8,

        /// Add the difference against this hour's mean
        #[arg(long)]
        reference_hour: Option<u32>,

        /// CSV file to append results to
        #[arg(short, long, default_value = "hourly_stats.csv")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/transit_delay.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_delay.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { config, route, views } => {
            let config = StudyConfig::load(&config)?;
            render(&config, route.as_deref(), &views)?;
        }
        Commands::Segments {
            schedule,
            route,
            direction,
        } => {
            let schedule = Schedule::load(&schedule)?;
            let records: Vec<SegmentRecord> = schedule
                .route_segments(&route)
                .filter(|s| direction.is_none_or(|d| s.direction_id == d))
                .map(|s| SegmentRecord::from(s.as_ref()))
                .collect();
            if records.is_empty() {
                warn!(route_id = %route, ?direction, "No segments found");
            }
            print_json(&records)?;
            info!(route_id = %route, segments = records.len(), "Segments listed");
        }
        Commands::Export {
            config,
            route,
            direction,
            reference_hour,
            output,
        } => {
            let config = StudyConfig::load(&config)?;
            let Some(route_config) = config.route(&route) else {
                bail!("Route {route} is not in the study config");
            };
            let schedule = Arc::new(Schedule::load(&config.schedule)?);
            let mut analysis = open_analysis(&config, route_config, schedule)?;

            let stats = analysis.hourly_stats(direction, reference_hour)?;
            let rows = append_hourly_stats(&output, &stats)?;
            info!(route_id = %route, direction, rows, output = %output.display(), "Hourly statistics exported");
        }
    }

    Ok(())
}

/// Renders the selected views of every (route, direction) in the study.
#[tracing::instrument(skip(config, views), fields(output_dir = %config.output_dir.display()))]
fn render(config: &StudyConfig, only_route: Option<&str>, views: &[View]) -> Result<()> {
    let views: BTreeSet<View> = if views.is_empty() {
        config.render.iter().copied().collect()
    } else {
        views.iter().copied().collect()
    };

    let routes: Vec<&RouteConfig> = match only_route {
        Some(route_id) => vec![
            config
                .route(route_id)
                .with_context(|| format!("Route {route_id} is not in the study config"))?,
        ],
        None => config.routes.iter().collect(),
    };

    let schedule = Arc::new(Schedule::load(&config.schedule)?);
    let options = config.view_options();
    let mut written = 0usize;

    for route_config in routes {
        let mut analysis = open_analysis(config, route_config, schedule.clone())?;
        let directions: Vec<u8> = analysis.directions().collect();

        for direction_id in directions {
            for &view in &views {
                let reference_hours: Vec<Option<u32>> = if view == View::Hourly {
                    std::iter::once(None)
                        .chain(config.reference_hours.iter().copied().map(Some))
                        .collect()
                } else {
                    vec![None]
                };
                for reference_hour in reference_hours {
                    analysis.render(direction_id, view, reference_hour, &options, &config.output_dir)?;
                    written += 1;
                }
            }

            if let Some(join) = analysis.engine().cache().get(direction_id) {
                info!(
                    route_id = %route_config.route_id,
                    direction_id,
                    pings = join.summary.pings,
                    joined = join.summary.joined,
                    "Direction done"
                );
            }
        }
    }

    info!(files = written, "Study rendered");
    Ok(())
}

fn open_analysis(
    config: &StudyConfig,
    route: &RouteConfig,
    schedule: Arc<Schedule>,
) -> Result<RouteAnalysis<SqliteTelemetry>> {
    let store = SqliteTelemetry::open(&config.database, config.timezone)?;
    Ok(RouteAnalysis::new(route.route_id.clone(), route.directions.clone(), schedule, store)
        .with_tolerance(config.tolerance_m))
}
