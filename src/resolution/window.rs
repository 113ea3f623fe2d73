use crate::models::RealtimeObservation;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

/// How far forward the board looks. Rows past this are noise for a "next
/// departures" answer regardless of the caller's limit.
pub const FORWARD_HORIZON_HOURS: i64 = 3;

/// Time window an observation must fall in to be worth resolving. Computed
/// once per request and reused by the later stages.
#[derive(Clone, Copy, Debug)]
pub struct AdmissionWindow {
    pub min_timestamp: DateTime<Utc>,
    pub max_timestamp: DateTime<Utc>,
}

impl AdmissionWindow {
    pub fn new(now: DateTime<Utc>, min_time_threshold_seconds: i64) -> Self {
        AdmissionWindow {
            min_timestamp: now + Duration::seconds(min_time_threshold_seconds),
            max_timestamp: now + Duration::hours(FORWARD_HORIZON_HOURS),
        }
    }

    /// Best-effort admission: a resolvable time strictly inside the window,
    /// or no time yet but a known positive delay (worth surfacing once the
    /// estimate resolves). Everything else is silently discarded.
    pub fn admits(&self, observation: &RealtimeObservation) -> bool {
        match observation
            .actual_epoch_seconds
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
        {
            Some(actual) => actual > self.min_timestamp && actual < self.max_timestamp,
            None => observation.delay_seconds.is_some_and(|delay| delay > 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use compact_str::CompactString;

    fn observation(actual: Option<i64>, delay: Option<i64>) -> RealtimeObservation {
        RealtimeObservation {
            trip_id: CompactString::from("trip-1"),
            route_id: CompactString::from("route-1"),
            stop_id: CompactString::from("stop-1"),
            delay_seconds: delay,
            actual_epoch_seconds: actual,
            collected_at: Utc.timestamp_opt(1_000_000, 0).unwrap(),
            route_short_name: None,
            route_long_name: None,
            route_color: None,
            route_type: 3,
            stop_name: None,
            stop_code: None,
            trip_headsign: None,
            direction_id: None,
        }
    }

    fn window() -> (DateTime<Utc>, AdmissionWindow) {
        let now = Utc.timestamp_opt(1_000_000, 0).unwrap();
        (now, AdmissionWindow::new(now, 0))
    }

    #[test]
    fn admits_times_inside_window() {
        let (now, window) = window();
        assert!(window.admits(&observation(Some(now.timestamp() + 600), None)));
    }

    #[test]
    fn window_bounds_are_strict() {
        let (now, window) = window();
        assert!(!window.admits(&observation(Some(now.timestamp()), None)));
        assert!(!window.admits(&observation(Some(now.timestamp() + 3 * 3600), None)));
        assert!(window.admits(&observation(Some(now.timestamp() + 3 * 3600 - 1), None)));
    }

    #[test]
    fn threshold_shifts_lower_bound() {
        let now = Utc.timestamp_opt(1_000_000, 0).unwrap();
        let window = AdmissionWindow::new(now, 120);
        assert!(!window.admits(&observation(Some(now.timestamp() + 60), None)));
        assert!(window.admits(&observation(Some(now.timestamp() + 121), None)));
    }

    #[test]
    fn unresolved_time_admitted_only_when_running_late() {
        let (_, window) = window();
        assert!(window.admits(&observation(None, Some(90))));
        assert!(!window.admits(&observation(None, Some(0))));
        assert!(!window.admits(&observation(None, Some(-30))));
        assert!(!window.admits(&observation(None, None)));
    }

    #[test]
    fn unrepresentable_time_falls_back_to_delay_rule() {
        let (_, window) = window();
        assert!(window.admits(&observation(Some(i64::MAX), Some(90))));
        assert!(!window.admits(&observation(Some(i64::MAX), None)));
    }
}
