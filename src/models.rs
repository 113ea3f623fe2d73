use chrono::DateTime;
use chrono::Utc;
use compact_str::CompactString;
use serde::Deserialize;
use serde::Serialize;

/// A single live prediction of when a scheduled vehicle call will occur at a
/// stop, derived from vehicle positions. Denormalized with the route, stop and
/// trip metadata needed to render a departure row without further lookups.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RealtimeObservation {
    pub trip_id: CompactString,
    pub route_id: CompactString,
    pub stop_id: CompactString,
    /// Signed seconds, positive = late, negative = early.
    pub delay_seconds: Option<i64>,
    pub actual_epoch_seconds: Option<i64>,
    /// When this observation was captured upstream.
    pub collected_at: DateTime<Utc>,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_color: Option<String>,
    pub route_type: i16,
    pub stop_name: Option<String>,
    pub stop_code: Option<String>,
    pub trip_headsign: Option<String>,
    pub direction_id: Option<i16>,
}

/// A row from the published static timetable, independent of live tracking.
/// The departure clock is a GTFS-style `HH:MM:SS` string whose hour may reach
/// 24 and beyond for service past midnight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduledStopEntry {
    pub trip_id: CompactString,
    pub route_id: CompactString,
    pub stop_id: CompactString,
    pub scheduled_departure_clock: String,
    pub stop_sequence: u32,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_color: Option<String>,
    pub route_type: i16,
    pub stop_name: Option<String>,
    pub stop_code: Option<String>,
    pub trip_headsign: Option<String>,
    pub direction_id: Option<i16>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub route_id: CompactString,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub color: Option<String>,
    pub route_type: i16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StopDescriptor {
    pub stop_id: CompactString,
    pub name: Option<String>,
    pub code: Option<String>,
}

/// Caller-facing departure row, JSON-serializable as-is.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormattedDeparture {
    pub trip_id: CompactString,
    pub route: RouteDescriptor,
    pub stop: StopDescriptor,
    pub headsign: Option<String>,
    pub delay_seconds: i64,
    pub realtime: bool,
    /// RFC 3339 timestamps.
    pub scheduled_departure: String,
    pub estimated_departure: String,
    /// `HH:MM` renderings in the query timezone.
    pub scheduled_time_display: String,
    pub estimated_time_display: String,
}
