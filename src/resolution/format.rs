use super::ResolvedDeparture;
use crate::models::FormattedDeparture;
use crate::models::RouteDescriptor;
use crate::models::StopDescriptor;
use crate::time_utils::minute_display;
use chrono::SecondsFormat;
use chrono_tz::Tz;

/// Final projection into the caller-facing shape. Truncation to the limit is
/// defensive; the allocator already targets the same bound.
pub fn format_departures(
    departures: Vec<ResolvedDeparture>,
    requested_limit: usize,
    tz: Tz,
) -> Vec<FormattedDeparture> {
    departures
        .into_iter()
        .take(requested_limit)
        .map(|departure| FormattedDeparture {
            trip_id: departure.trip_id,
            route: RouteDescriptor {
                route_id: departure.route_id,
                short_name: departure.route_short_name,
                long_name: departure.route_long_name,
                color: departure.route_color,
                route_type: departure.route_type,
            },
            stop: StopDescriptor {
                stop_id: departure.stop_id,
                name: departure.stop_name,
                code: departure.stop_code,
            },
            headsign: departure.headsign,
            delay_seconds: departure.delay_seconds,
            realtime: departure.realtime,
            scheduled_departure: departure
                .scheduled
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            estimated_departure: departure
                .estimated
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            scheduled_time_display: minute_display(departure.scheduled, tz),
            estimated_time_display: minute_display(departure.estimated, tz),
        })
        .collect()
}
