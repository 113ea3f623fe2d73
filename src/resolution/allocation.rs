use super::ResolvedDeparture;
use ahash::AHashMap;
use ahash::AHashSet;
use compact_str::CompactString;
use itertools::Itertools;

/// Raise the per-(route, stop) cap when it makes the requested count
/// mathematically unreachable: with `R` distinct routes on offer, a cap of
/// `ceil(limit / R)` is the smallest one that can still fill the board.
pub fn effective_route_cap(
    candidates: &[ResolvedDeparture],
    base_cap: usize,
    requested_limit: usize,
) -> usize {
    let distinct_routes = candidates
        .iter()
        .map(|departure| &departure.route_id)
        .unique()
        .count();

    if distinct_routes > 0 && distinct_routes * base_cap < requested_limit {
        requested_limit.div_ceil(distinct_routes)
    } else {
        base_cap
    }
}

/// Chronological walk admitting at most `cap` departures per (route, stop)
/// and at most one per trip, stopping once `limit` rows are admitted.
pub fn allocate_capped(
    candidates: &[ResolvedDeparture],
    cap: usize,
    limit: usize,
) -> Vec<ResolvedDeparture> {
    let mut per_route_stop: AHashMap<(CompactString, CompactString), usize> = AHashMap::new();
    let mut admitted_trips: AHashSet<CompactString> = AHashSet::new();
    let mut admitted: Vec<ResolvedDeparture> = Vec::new();

    for departure in candidates {
        if admitted.len() >= limit {
            break;
        }
        if admitted_trips.contains(&departure.trip_id) {
            continue;
        }

        let count = per_route_stop.entry(departure.route_stop_key()).or_insert(0);
        if *count < cap {
            *count += 1;
            admitted_trips.insert(departure.trip_id.clone());
            admitted.push(departure.clone());
        }
    }

    admitted
}

/// Second pass for an under-filled board: chronological, no per-route cap,
/// skipping trips already admitted.
pub fn allocate_unrestricted(
    candidates: &[ResolvedDeparture],
    already_admitted: &AHashSet<CompactString>,
    remaining_slots: usize,
) -> Vec<ResolvedDeparture> {
    let mut extra: Vec<ResolvedDeparture> = Vec::new();

    for departure in candidates {
        if extra.len() >= remaining_slots {
            break;
        }
        if already_admitted.contains(&departure.trip_id) {
            continue;
        }
        extra.push(departure.clone());
    }

    extra
}

/// Full fairness pass: relax the cap if needed, run the capped walk, then
/// top up without the cap. The relaxed pass can interleave trips out of
/// order, so the result is re-sorted by estimated time.
pub fn allocate_fairly(
    candidates: &[ResolvedDeparture],
    base_cap: usize,
    requested_limit: usize,
) -> Vec<ResolvedDeparture> {
    let cap = effective_route_cap(candidates, base_cap, requested_limit);
    let mut admitted = allocate_capped(candidates, cap, requested_limit);

    if admitted.len() < requested_limit {
        let admitted_trips: AHashSet<CompactString> = admitted
            .iter()
            .map(|departure| departure.trip_id.clone())
            .collect();
        let extra = allocate_unrestricted(
            candidates,
            &admitted_trips,
            requested_limit - admitted.len(),
        );
        admitted.extend(extra);
        admitted.sort_by_key(|departure| departure.estimated);
    }

    admitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    fn departure(trip_id: &str, route_id: &str, offset_minutes: i64) -> ResolvedDeparture {
        let estimated = Utc
            .timestamp_opt(1_700_000_000 + offset_minutes * 60, 0)
            .unwrap();
        ResolvedDeparture {
            trip_id: trip_id.into(),
            route_id: route_id.into(),
            stop_id: "s1".into(),
            headsign: None,
            estimated,
            scheduled: estimated,
            delay_seconds: 0,
            realtime: true,
            collected_at: None,
            route_short_name: Some(route_id.to_string()),
            route_long_name: None,
            route_color: None,
            route_type: 3,
            stop_name: None,
            stop_code: None,
        }
    }

    /// One candidate per minute, `per_route` of them for each named route,
    /// interleaved chronologically across routes.
    fn grid(routes: &[&str], per_route: usize) -> Vec<ResolvedDeparture> {
        let mut candidates: Vec<ResolvedDeparture> = Vec::new();
        for slot in 0..per_route {
            for (route_index, route) in routes.iter().enumerate() {
                let trip = format!("{route}-{slot}");
                candidates.push(departure(
                    &trip,
                    route,
                    (slot * routes.len() + route_index) as i64,
                ));
            }
        }
        candidates
    }

    #[test]
    fn cap_relaxes_when_limit_unreachable() {
        let candidates = grid(&["r1", "r2", "r3"], 4);
        assert_eq!(effective_route_cap(&candidates, 2, 10), 4);
    }

    #[test]
    fn cap_untouched_when_limit_reachable() {
        let candidates = grid(&["r1", "r2", "r3", "r4", "r5"], 4);
        assert_eq!(effective_route_cap(&candidates, 2, 10), 2);
    }

    #[test]
    fn no_candidates_keeps_base_cap() {
        assert_eq!(effective_route_cap(&[], 2, 10), 2);
    }

    #[test]
    fn capped_pass_limits_each_route() {
        let candidates = grid(&["r1", "r2"], 5);

        let admitted = allocate_capped(&candidates, 2, 10);

        assert_eq!(admitted.len(), 4);
        let r1_count = admitted.iter().filter(|d| d.route_id == "r1").count();
        assert_eq!(r1_count, 2);
    }

    #[test]
    fn capped_pass_stops_at_limit() {
        let candidates = grid(&["r1", "r2", "r3"], 4);
        let admitted = allocate_capped(&candidates, 4, 5);
        assert_eq!(admitted.len(), 5);
    }

    #[test]
    fn unrestricted_pass_skips_admitted_trips() {
        let candidates = grid(&["r1"], 4);
        let mut already: AHashSet<CompactString> = AHashSet::new();
        already.insert("r1-0".into());
        already.insert("r1-1".into());

        let extra = allocate_unrestricted(&candidates, &already, 10);

        assert_eq!(extra.len(), 2);
        assert_eq!(extra[0].trip_id, "r1-2");
    }

    #[test]
    fn three_routes_relax_to_four_each() {
        // 3 routes x 4 candidates, limit 10, base cap 2: the effective cap
        // rises to ceil(10/3) = 4 and the board fills to 10.
        let candidates = grid(&["r1", "r2", "r3"], 4);

        let admitted = allocate_fairly(&candidates, 2, 10);

        assert_eq!(admitted.len(), 10);
        for route in ["r1", "r2", "r3"] {
            let count = admitted.iter().filter(|d| d.route_id == route).count();
            assert!(count <= 4, "route {route} exceeded relaxed cap: {count}");
        }
    }

    #[test]
    fn dominant_route_cannot_crowd_out_others() {
        let mut candidates = grid(&["busy"], 8);
        candidates.extend(grid(&["quiet"], 2).into_iter().map(|mut d| {
            d.estimated = d.estimated + chrono::Duration::minutes(30);
            d.scheduled = d.estimated;
            d
        }));
        candidates.sort_by_key(|d| d.estimated);

        let admitted = allocate_fairly(&candidates, 2, 6);

        // capped pass takes 2+2, relaxed pass tops up from the busy route
        assert_eq!(admitted.len(), 6);
        let quiet_count = admitted.iter().filter(|d| d.route_id == "quiet").count();
        assert_eq!(quiet_count, 2);
    }

    #[test]
    fn result_is_chronological_after_relaxed_pass() {
        let candidates = grid(&["r1"], 5);

        let admitted = allocate_fairly(&candidates, 2, 4);

        assert_eq!(admitted.len(), 4);
        for pair in admitted.windows(2) {
            assert!(pair[0].estimated <= pair[1].estimated);
        }
    }

    #[test]
    fn no_duplicate_trips_across_passes() {
        let candidates = grid(&["r1", "r2"], 3);

        let admitted = allocate_fairly(&candidates, 1, 6);

        let unique: AHashSet<&CompactString> =
            admitted.iter().map(|d| &d.trip_id).collect();
        assert_eq!(unique.len(), admitted.len());
    }
}
