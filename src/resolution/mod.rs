//! Departure resolution: turn raw live observations and, when live data runs
//! thin, static-timetable rows into a ranked, deduplicated, fairly-allocated
//! departure board. Pure and request-scoped; every intermediate value lives
//! and dies inside one call.

pub mod allocation;
pub mod format;
pub mod merge;
pub mod realtime;
pub mod theoretical;
pub mod window;

use crate::models::FormattedDeparture;
use crate::storage::DepartureStore;
use crate::storage::RealtimeQuery;
use crate::storage::ScheduleQuery;
use crate::storage::StorageError;
use crate::time_utils::clock_string_for;
use crate::time_utils::minute_display;
use ahash::AHashSet;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use chrono_tz::Tz;
use compact_str::CompactString;

/// Canonical departure produced from either source. Constructed, possibly
/// superseded in a deduplication map, and finally emitted or discarded, all
/// within a single request.
#[derive(Clone, Debug)]
pub struct ResolvedDeparture {
    pub trip_id: CompactString,
    pub route_id: CompactString,
    pub stop_id: CompactString,
    pub headsign: Option<String>,
    pub estimated: DateTime<Utc>,
    pub scheduled: DateTime<Utc>,
    pub delay_seconds: i64,
    pub realtime: bool,
    pub collected_at: Option<DateTime<Utc>>,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_color: Option<String>,
    pub route_type: i16,
    pub stop_name: Option<String>,
    pub stop_code: Option<String>,
}

impl ResolvedDeparture {
    pub fn trip_stop_key(&self) -> (CompactString, CompactString) {
        (self.trip_id.clone(), self.stop_id.clone())
    }

    pub fn route_stop_key(&self) -> (CompactString, CompactString) {
        (self.route_id.clone(), self.stop_id.clone())
    }

    /// Near-duplicate collision key: route number, headsign and the
    /// estimated departure rounded down to the minute.
    pub fn minute_bucket_key(&self, tz: Tz) -> String {
        let route_number = self
            .route_short_name
            .as_deref()
            .unwrap_or(self.route_id.as_str());
        format!(
            "{}|{}|{}",
            route_number,
            self.headsign.as_deref().unwrap_or(""),
            minute_display(self.estimated, tz)
        )
    }
}

#[derive(Clone, Debug)]
pub struct DepartureQueryParams {
    pub stop_ids: Option<Vec<CompactString>>,
    pub route_id: Option<CompactString>,
    pub direction_id: Option<i16>,
    pub requested_limit: usize,
    pub min_time_threshold_seconds: i64,
    pub data_window_minutes: i64,
    pub max_per_route_stop: usize,
    pub use_fallback: bool,
    /// Accepted for interface compatibility; no allocation stage consumes it.
    /// TODO: reserve one slot per distinct route up to this minimum before
    /// the capped pass, once a consumer actually needs the guarantee.
    pub min_unique_routes: usize,
    pub timezone: Tz,
}

impl Default for DepartureQueryParams {
    fn default() -> Self {
        DepartureQueryParams {
            stop_ids: None,
            route_id: None,
            direction_id: None,
            requested_limit: 10,
            min_time_threshold_seconds: 0,
            data_window_minutes: 60,
            max_per_route_stop: 2,
            use_fallback: true,
            min_unique_routes: 1,
            timezone: chrono_tz::UTC,
        }
    }
}

/// Over-fetch heuristic: window admission and two deduplication passes shrink
/// the raw set considerably, so ask storage for far more rows than the board
/// will show.
fn over_fetch_limit(requested_limit: usize) -> usize {
    (requested_limit * 5).max(30)
}

/// Resolve the next departures for the given filter, right now.
///
/// Live observations are admitted by time window, normalized and collapsed to
/// one per (trip, stop). If the board is still short and the fallback is
/// enabled, static-timetable rows fill the gaps for trips not already live.
/// Both sources are merged with minute-bucket deduplication, passed through
/// the fair allocator and projected into the caller-facing shape.
///
/// Per-record anomalies are absorbed by skipping the record; only whole-query
/// storage failures surface to the caller.
pub async fn resolve_next_departures<S: DepartureStore>(
    store: &S,
    params: &DepartureQueryParams,
    now: DateTime<Utc>,
) -> Result<Vec<FormattedDeparture>, StorageError> {
    if params.requested_limit == 0 {
        return Ok(Vec::new());
    }

    let admission = window::AdmissionWindow::new(now, params.min_time_threshold_seconds);
    let over_fetch = over_fetch_limit(params.requested_limit);

    let raw_observations = store
        .realtime_observations(&RealtimeQuery {
            stop_ids: params.stop_ids.clone(),
            route_id: params.route_id.clone(),
            direction_id: params.direction_id,
            collected_since: now - Duration::minutes(params.data_window_minutes),
            // raw rows shrink hardest, over-fetch them deeper still
            limit: over_fetch * 4,
        })
        .await?;

    let mut candidates = realtime::resolve_realtime_observations(&raw_observations, &admission);

    if params.use_fallback && candidates.len() < params.requested_limit {
        let scheduled_rows = store
            .scheduled_stop_entries(&ScheduleQuery {
                stop_ids: params.stop_ids.clone(),
                from_clock_time: clock_string_for(now, params.timezone),
                limit: over_fetch,
            })
            .await?;

        let live_trip_ids: AHashSet<CompactString> = candidates
            .iter()
            .map(|departure| departure.trip_id.clone())
            .collect();

        candidates.extend(theoretical::theoretical_departures(
            &scheduled_rows,
            &live_trip_ids,
            params.route_id.as_deref(),
            params.direction_id,
            now,
            params.timezone,
        ));
    }

    let merged = merge::merge_minute_buckets(candidates, params.timezone);
    let allocated =
        allocation::allocate_fairly(&merged, params.max_per_route_stop, params.requested_limit);

    Ok(format::format_departures(
        allocated,
        params.requested_limit,
        params.timezone,
    ))
}
