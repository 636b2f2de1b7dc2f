use chrono_tz::America::Vancouver;
use geo::{Coord, LineString};
use rusqlite::Connection;
use std::fs;
use std::sync::Arc;
use transit_delay::analysis::RouteAnalysis;
use transit_delay::schedule::{Schedule, ShapeStops, StopOnShape, TripPattern, cut_segments};
use transit_delay::telemetry::SqliteTelemetry;
use transit_delay::views::{View, ViewOptions};

// 2024-09-09 07:30 and 08:00 in Vancouver.
const START: i64 = 1725892200;
const EIGHT: i64 = 1725894000;

#[test]
fn test_full_pipeline_hourly_travel_time() {
    let mut analysis = sample_analysis();

    let stats = analysis.hourly_stats(0, None).unwrap();

    assert_eq!(stats.len(), 2);
    let ab = &stats[0];
    assert_eq!(ab.segment.segment_id, "A-B");
    assert_eq!(ab.hour_of_day, 8);
    assert_eq!(ab.travel_time.count, 1);
    assert_eq!(ab.travel_time.mean, 60.0);
    assert!((ab.segment.distance_m - 222.4).abs() < 1.0);
    assert_eq!(stats[1].segment.segment_id, "B-C");
    assert_eq!(stats[1].travel_time.mean, 60.0);
}

#[test]
fn test_join_summary_and_tolerance() {
    let mut analysis = sample_analysis();

    let join = analysis.points(0).unwrap();

    assert_eq!(join.summary.pings, 8);
    assert_eq!(join.summary.joined, 6);
    assert_eq!(join.summary.out_of_tolerance, 1);
    assert_eq!(join.summary.without_pattern, 1);
    assert!(join.points.iter().all(|p| p.distance_m <= 12.0));
    assert!(join.points.iter().any(|p| p.distance_m > 7.0));
    assert!(join.points.iter().all(|p| p.pattern.pattern_name == "A St - C St (3 stops)"));
}

#[test]
fn test_points_cached_until_invalidated() {
    let mut analysis = sample_analysis();

    let first = analysis.points(0).unwrap();
    let second = analysis.points(0).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    assert!(analysis.engine_mut().invalidate(0));
    let third = analysis.points(0).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(first.points, third.points);

    analysis.engine_mut().clear();
    assert!(analysis.engine().cache().is_empty());
}

#[test]
fn test_distributions_follow_stop_order() {
    let mut analysis = sample_analysis();

    let rows = analysis.distributions(0, 1000.0).unwrap();

    let order: Vec<(&str, u32)> = rows
        .iter()
        .map(|r| (r.segment.segment_id.as_str(), r.stop_sequence))
        .collect();
    assert_eq!(order, [("A-B", 1), ("B-C", 2)]);
    assert_eq!(rows[0].segment_name, "A St ... B St");
}

#[test]
fn test_render_writes_every_view() {
    let dir = std::env::temp_dir().join(format!("transit_delay_it_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    let mut analysis = sample_analysis();
    let options = ViewOptions::default();

    for view in [View::Route, View::Points, View::SlowZones, View::Hourly, View::Distributions] {
        analysis.render(0, view, None, &options, &dir).unwrap();
    }
    analysis.render(0, View::Hourly, Some(8), &options, &dir).unwrap();

    for name in [
        "0-Royal Oak_route.html",
        "0-Royal Oak_points.html",
        "0-Royal Oak_slow_zones.html",
        "0-Royal Oak_hourly.html",
        "0-Royal Oak_hourly_8.html",
        "0-Royal Oak_distr_hourly.html",
    ] {
        let html = fs::read_to_string(dir.join(name)).unwrap();
        assert!(html.contains("Plotly.newPlot"), "{name}");
    }
    // one engine join served every view
    assert_eq!(analysis.engine().cache().len(), 1);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_direction_without_label_is_rejected() {
    let mut analysis = sample_analysis();
    assert!(analysis.points(2).is_err());
    // labelled, but no telemetry
    assert!(analysis.points(1).unwrap().points.is_empty());
}

// Helper functions for tests

/// Route 6-VIC direction 0 runs north along lon -123.37 through stops A, B
/// and C, 0.002 degrees of latitude apart.
fn sample_schedule() -> Schedule {
    let stop = |id: &str, sequence: u32, lat: f64| StopOnShape {
        stop_id: id.to_string(),
        name: format!("{id} St"),
        sequence,
        position: Coord { x: -123.37, y: lat },
    };
    let shape = ShapeStops {
        route_id: "6-VIC".to_string(),
        direction_id: 0,
        shape_id: "s1".to_string(),
        shape: LineString::from(vec![(-123.37, 48.450), (-123.37, 48.452), (-123.37, 48.454)]),
        stops: vec![stop("A", 1, 48.450), stop("B", 2, 48.452), stop("C", 3, 48.454)],
    };
    let pattern = TripPattern {
        trip_id: "t1".to_string(),
        route_id: "6-VIC".to_string(),
        direction_id: 0,
        shape_id: "s1".to_string(),
        pattern_name: "A St - C St (3 stops)".to_string(),
    };
    Schedule::new(cut_segments(&shape), vec![pattern])
}

fn sample_store() -> SqliteTelemetry {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "create table vehicle_positions (
            latitude real, longitude real, start_time integer, timestamp integer,
            speed real, odometer real, vehicle_id, route_id text, direction_id integer,
            stop_id, current_status, trip_id
        );",
    )
    .unwrap();

    let rows: [(f64, f64, i64, &str); 7] = [
        // A-B, 60 s
        (48.4505, -123.37, 0, "t1"),
        (48.4510, -123.37, 30, "t1"),
        (48.4515, -123.37, 60, "t1"),
        // B-C, 60 s; the middle ping is about 8 m east of the line
        (48.4525, -123.37, 90, "t1"),
        (48.4530, -123.369892, 120, "t1"),
        (48.4535, -123.37, 150, "t1"),
        // unscheduled trip
        (48.4510, -123.37, 40, "tX"),
    ];
    for (lat, lon, offset, trip) in rows {
        conn.execute(
            "insert into vehicle_positions values (?1, ?2, ?3, ?4, 3.0, NULL, 'v1', '6-VIC', 0, 'B', 2, ?5)",
            rusqlite::params![lat, lon, START, EIGHT + offset, trip],
        )
        .unwrap();
    }
    // about 20 m east of the line
    conn.execute(
        "insert into vehicle_positions values (48.4525, -123.36973, ?1, ?2, 3.0, NULL, 'v1', '6-VIC', 0, 'B', 2, 't1')",
        rusqlite::params![START, EIGHT + 100],
    )
    .unwrap();

    SqliteTelemetry::from_connection(conn, Vancouver)
}

fn sample_analysis() -> RouteAnalysis<SqliteTelemetry> {
    RouteAnalysis::new(
        "6-VIC",
        vec!["Royal Oak".to_string(), "Downtown".to_string()],
        Arc::new(sample_schedule()),
        sample_store(),
    )
}
