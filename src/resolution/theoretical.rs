use super::ResolvedDeparture;
use super::window::FORWARD_HORIZON_HOURS;
use crate::models::ScheduledStopEntry;
use crate::time_utils::compose_service_timestamp;
use crate::time_utils::parse_schedule_clock;
use ahash::AHashSet;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use chrono_tz::Tz;
use compact_str::CompactString;

/// Convert static-timetable rows into departures for trips the live feed has
/// not covered. Fallback rows are never back-dated and respect the same
/// forward horizon as live data, so stale or far-future schedule rows stay
/// out of the board.
pub fn theoretical_departures(
    rows: &[ScheduledStopEntry],
    live_trip_ids: &AHashSet<CompactString>,
    route_id: Option<&str>,
    direction_id: Option<i16>,
    now: DateTime<Utc>,
    tz: Tz,
) -> Vec<ResolvedDeparture> {
    let horizon = now + Duration::hours(FORWARD_HORIZON_HOURS);
    let base_date = now.with_timezone(&tz).date_naive();

    rows.iter()
        .filter_map(|row| {
            if live_trip_ids.contains(&row.trip_id) {
                return None;
            }
            if route_id.is_some_and(|id| row.route_id.as_str() != id) {
                return None;
            }
            if direction_id.is_some_and(|id| row.direction_id != Some(id)) {
                return None;
            }

            let clock = parse_schedule_clock(&row.scheduled_departure_clock)?;
            let estimated = compose_service_timestamp(base_date, clock, tz)?;

            if estimated < now || estimated > horizon {
                return None;
            }

            Some(ResolvedDeparture {
                trip_id: row.trip_id.clone(),
                route_id: row.route_id.clone(),
                stop_id: row.stop_id.clone(),
                headsign: row.trip_headsign.clone(),
                estimated,
                scheduled: estimated,
                delay_seconds: 0,
                realtime: false,
                collected_at: None,
                route_short_name: row.route_short_name.clone(),
                route_long_name: row.route_long_name.clone(),
                route_color: row.route_color.clone(),
                route_type: row.route_type,
                stop_name: row.stop_name.clone(),
                stop_code: row.stop_code.clone(),
            })
        })
        .collect()
}
