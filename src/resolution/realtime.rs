use super::ResolvedDeparture;
use super::window::AdmissionWindow;
use crate::models::RealtimeObservation;
use ahash::AHashMap;
use chrono::DateTime;
use chrono::Duration;
use compact_str::CompactString;
use std::collections::hash_map::Entry;

/// Map admitted observations into the canonical departure shape and collapse
/// to at most one entry per (trip, stop). A vehicle can emit overlapping
/// predictions for the same call; only the freshest one is meaningful, so
/// ties are broken by greatest `collected_at`.
pub fn resolve_realtime_observations(
    observations: &[RealtimeObservation],
    window: &AdmissionWindow,
) -> Vec<ResolvedDeparture> {
    let mut freshest: AHashMap<(CompactString, CompactString), ResolvedDeparture> = AHashMap::new();

    for observation in observations {
        if !window.admits(observation) {
            continue;
        }

        // Admission lets known-late rows through without a resolved time,
        // but nothing downstream can rank them until one exists.
        let estimated = match observation
            .actual_epoch_seconds
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
        {
            Some(estimated) => estimated,
            None => continue,
        };

        let scheduled = match observation.delay_seconds {
            Some(delay) => estimated - Duration::seconds(delay),
            None => estimated,
        };

        let departure = ResolvedDeparture {
            trip_id: observation.trip_id.clone(),
            route_id: observation.route_id.clone(),
            stop_id: observation.stop_id.clone(),
            headsign: observation.trip_headsign.clone(),
            estimated,
            scheduled,
            delay_seconds: observation.delay_seconds.unwrap_or(0),
            realtime: true,
            collected_at: Some(observation.collected_at),
            route_short_name: observation.route_short_name.clone(),
            route_long_name: observation.route_long_name.clone(),
            route_color: observation.route_color.clone(),
            route_type: observation.route_type,
            stop_name: observation.stop_name.clone(),
            stop_code: observation.stop_code.clone(),
        };

        match freshest.entry(departure.trip_stop_key()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().collected_at < departure.collected_at {
                    occupied.insert(departure);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(departure);
            }
        }
    }

    freshest.into_values().collect()
}
