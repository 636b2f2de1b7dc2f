use anyhow::{Context, Result};
use chrono_tz::Tz;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row, params};
use std::path::Path;
use tracing::debug;

use super::{PositionPing, RawPing, TelemetryStore, status_name};

const VEHICLE_POSITIONS_QUERY: &str = "
    select
        latitude,
        longitude,
        start_time,
        timestamp,
        speed,
        odometer,
        vehicle_id,
        route_id,
        direction_id,
        stop_id,
        current_status,
        trip_id
    from vehicle_positions
    where route_id = ?1 and direction_id = ?2
    order by timestamp
";

/// Telemetry snapshot stored in a SQLite `vehicle_positions` table.
pub struct SqliteTelemetry {
    conn: Connection,
    tz: Tz,
}

impl SqliteTelemetry {
    /// Opens the snapshot database read-only.
    pub fn open(path: impl AsRef<Path>, tz: Tz) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open telemetry database {}", path.display()))?;
        Ok(Self { conn, tz })
    }

    pub fn from_connection(conn: Connection, tz: Tz) -> Self {
        Self { conn, tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl TelemetryStore for SqliteTelemetry {
    #[tracing::instrument(skip(self))]
    fn vehicle_positions(&self, route_id: &str, direction_id: u8) -> Result<Vec<PositionPing>> {
        let mut stmt = self.conn.prepare(VEHICLE_POSITIONS_QUERY)?;
        let rows = stmt.query_map(params![route_id, direction_id], raw_ping)?;

        let mut pings = Vec::new();
        for (i, row) in rows.enumerate() {
            let raw = row.with_context(|| format!("Malformed vehicle_positions row {i}"))?;
            pings.push(PositionPing::from_raw(raw, self.tz)?);
        }

        debug!(pings = pings.len(), "Vehicle positions read");
        Ok(pings)
    }
}

fn raw_ping(row: &Row<'_>) -> rusqlite::Result<RawPing> {
    Ok(RawPing {
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        start_time: row.get("start_time")?,
        timestamp: row.get("timestamp")?,
        speed: row.get("speed")?,
        odometer: row.get("odometer")?,
        vehicle_id: text(row.get("vehicle_id")?),
        route_id: row.get("route_id")?,
        direction_id: row.get("direction_id")?,
        stop_id: text(row.get("stop_id")?),
        current_status: status(row.get("current_status")?),
        trip_id: text(row.get("trip_id")?),
    })
}

/// Identifier columns hold integers in some snapshots and text in others.
fn text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

fn status(value: Value) -> Option<String> {
    match value {
        Value::Integer(code) => Some(status_name(code).map_or_else(|| code.to_string(), str::to_string)),
        other => text(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::America::Vancouver;

    #[test]
    fn test_query_filters_and_orders() {
        let store = store_with_rows(&[
            "(48.45, -123.37, 1725892200, 1725894060, 5.0, 100.0, 'v1', '6-VIC', 0, 's1', 2, 't1')",
            "(48.45, -123.37, 1725892200, 1725894000, 5.0, 90.0, 'v1', '6-VIC', 0, 's1', 1, 't1')",
            "(48.45, -123.37, 1725892200, 1725894030, 5.0, 95.0, 'v1', '6-VIC', 1, 's1', 1, 't2')",
            "(48.45, -123.37, 1725892200, 1725894030, 5.0, 95.0, 'v2', '10-VIC', 0, 's1', 1, 't3')",
        ]);

        let pings = store.vehicle_positions("6-VIC", 0).unwrap();

        assert_eq!(pings.len(), 2);
        assert!(pings[0].timestamp < pings[1].timestamp);
        assert_eq!(pings[0].current_status.as_deref(), Some("STOPPED_AT"));
        assert_eq!(pings[1].current_status.as_deref(), Some("IN_TRANSIT_TO"));
        assert_eq!(pings[0].hour_of_day, 8);
    }

    #[test]
    fn test_nullable_and_integer_columns() {
        let store = store_with_rows(&[
            "(48.45, -123.37, NULL, 1725894000, NULL, NULL, 1234, '6-VIC', 0, 5678, 'IN_TRANSIT_TO', NULL)",
        ]);

        let pings = store.vehicle_positions("6-VIC", 0).unwrap();
        let ping = &pings[0];

        assert_eq!(ping.start_time, None);
        assert_eq!(ping.speed_km, None);
        assert_eq!(ping.vehicle_id.as_deref(), Some("1234"));
        assert_eq!(ping.stop_id.as_deref(), Some("5678"));
        assert_eq!(ping.current_status.as_deref(), Some("IN_TRANSIT_TO"));
        assert_eq!(ping.trip_id, None);
        assert_eq!(ping.timestamp.minute(), 0);
    }

    #[test]
    fn test_malformed_row_aborts() {
        let store = store_with_rows(&[
            "(NULL, -123.37, NULL, 1725894000, NULL, NULL, 'v1', '6-VIC', 0, NULL, NULL, 't1')",
        ]);

        assert!(store.vehicle_positions("6-VIC", 0).is_err());
    }

    #[test]
    fn test_open_missing_database() {
        let result = SqliteTelemetry::open("/nonexistent/transit_delay.db", Vancouver);
        assert!(result.is_err());
    }

    // Helper functions for tests
    fn store_with_rows(rows: &[&str]) -> SqliteTelemetry {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "create table vehicle_positions (
                latitude real, longitude real, start_time integer, timestamp integer,
                speed real, odometer real, vehicle_id, route_id text, direction_id integer,
                stop_id, current_status, trip_id
            );",
        )
        .unwrap();
        for row in rows {
            conn.execute(&format!("insert into vehicle_positions values {row}"), [])
                .unwrap();
        }
        SqliteTelemetry::from_connection(conn, Vancouver)
    }
}
