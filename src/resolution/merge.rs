use super::ResolvedDeparture;
use ahash::AHashMap;
use chrono_tz::Tz;
use std::collections::hash_map::Entry;

/// Merge live and theoretical candidates and collapse near-duplicates keyed
/// by (route number, headsign, minute of estimated departure). The same
/// physical departure is often reported at slightly different second-level
/// timestamps by the two sources.
///
/// Iteration is earliest-first, so the first entry seen for a bucket is the
/// chronologically earliest; it is only ever displaced by a live entry
/// arriving over a theoretical one.
pub fn merge_minute_buckets(
    mut candidates: Vec<ResolvedDeparture>,
    tz: Tz,
) -> Vec<ResolvedDeparture> {
    candidates.sort_by_key(|departure| departure.estimated);

    let mut buckets: AHashMap<String, ResolvedDeparture> = AHashMap::new();
    let mut bucket_order: Vec<String> = Vec::new();

    for departure in candidates {
        let key = departure.minute_bucket_key(tz);

        match buckets.entry(key) {
            Entry::Occupied(mut occupied) => {
                if departure.realtime && !occupied.get().realtime {
                    occupied.insert(departure);
                }
            }
            Entry::Vacant(vacant) => {
                bucket_order.push(vacant.key().clone());
                vacant.insert(departure);
            }
        }
    }

    let mut merged: Vec<ResolvedDeparture> = bucket_order
        .into_iter()
        .filter_map(|key| buckets.remove(&key))
        .collect();

    // a displacement can move a bucket by a few seconds within its minute
    merged.sort_by_key(|departure| departure.estimated);

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use chrono::TimeZone;
    use chrono::Utc;

    fn departure(
        trip_id: &str,
        route_short_name: &str,
        headsign: &str,
        estimated: DateTime<Utc>,
        realtime: bool,
    ) -> ResolvedDeparture {
        ResolvedDeparture {
            trip_id: trip_id.into(),
            route_id: route_short_name.into(),
            stop_id: "s1".into(),
            headsign: Some(headsign.to_string()),
            estimated,
            scheduled: estimated,
            delay_seconds: 0,
            realtime,
            collected_at: None,
            route_short_name: Some(route_short_name.to_string()),
            route_long_name: None,
            route_color: None,
            route_type: 3,
            stop_name: None,
            stop_code: None,
        }
    }

    fn at(secs_into_minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 14, 30, secs_into_minute)
            .unwrap()
    }

    #[test]
    fn live_displaces_theoretical_in_same_minute() {
        let merged = merge_minute_buckets(
            vec![
                departure("sched", "7", "Airport", at(0), false),
                departure("live", "7", "Airport", at(40), true),
            ],
            chrono_tz::UTC,
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].trip_id, "live");
    }

    #[test]
    fn theoretical_never_displaces_live() {
        let merged = merge_minute_buckets(
            vec![
                departure("live", "7", "Airport", at(10), true),
                departure("sched", "7", "Airport", at(50), false),
            ],
            chrono_tz::UTC,
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].trip_id, "live");
    }

    #[test]
    fn earliest_wins_between_same_source_entries() {
        let merged = merge_minute_buckets(
            vec![
                departure("later", "7", "Airport", at(45), true),
                departure("earlier", "7", "Airport", at(5), true),
            ],
            chrono_tz::UTC,
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].trip_id, "earlier");
    }

    #[test]
    fn different_buckets_all_survive() {
        let other_minute = Utc.with_ymd_and_hms(2024, 3, 10, 14, 31, 0).unwrap();
        let merged = merge_minute_buckets(
            vec![
                departure("a", "7", "Airport", at(0), true),
                departure("b", "7", "Centre", at(10), true),
                departure("c", "8", "Airport", at(20), true),
                departure("d", "7", "Airport", other_minute, true),
            ],
            chrono_tz::UTC,
        );

        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn output_is_chronological() {
        let later = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let merged = merge_minute_buckets(
            vec![
                departure("b", "8", "Centre", later, false),
                departure("a", "7", "Airport", at(0), true),
            ],
            chrono_tz::UTC,
        );

        assert_eq!(merged[0].trip_id, "a");
        assert_eq!(merged[1].trip_id, "b");
    }
}
