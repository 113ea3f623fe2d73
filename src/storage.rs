use crate::models::RealtimeObservation;
use crate::models::ScheduledStopEntry;
use chrono::DateTime;
use chrono::Utc;
use compact_str::CompactString;
use serde::Deserialize;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage query failed: {0}")]
    Query(String),
}

/// Range query for live observations. `stop_ids` has OR semantics, the other
/// filters are optional narrowing, `collected_since` bounds observation
/// freshness and `limit` truncates after ascending estimated-time sort.
#[derive(Clone, Debug)]
pub struct RealtimeQuery {
    pub stop_ids: Option<Vec<CompactString>>,
    pub route_id: Option<CompactString>,
    pub direction_id: Option<i16>,
    pub collected_since: DateTime<Utc>,
    pub limit: usize,
}

/// Range query for static-timetable rows at the requested stops, restricted
/// server-side to departure clocks at or after `from_clock_time`. The clock
/// comparison is textual, which is correct for zero-padded `HH:MM:SS` strings
/// including the 24+-hour rollover forms.
#[derive(Clone, Debug)]
pub struct ScheduleQuery {
    pub stop_ids: Option<Vec<CompactString>>,
    pub from_clock_time: String,
    pub limit: usize,
}

/// The storage collaborator the resolution engine reads from. Implementations
/// return immutable snapshots; the engine never writes back.
pub trait DepartureStore: Send + Sync {
    fn realtime_observations(
        &self,
        query: &RealtimeQuery,
    ) -> impl Future<Output = Result<Vec<RealtimeObservation>, StorageError>> + Send;

    fn scheduled_stop_entries(
        &self,
        query: &ScheduleQuery,
    ) -> impl Future<Output = Result<Vec<ScheduledStopEntry>, StorageError>> + Send;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub observations: Vec<RealtimeObservation>,
    pub timetable: Vec<ScheduledStopEntry>,
}

/// Snapshot-backed store used by the osier binary and by tests. Writers swap
/// whole snapshots in; readers clone matching rows out under a short lock.
#[derive(Clone, Default)]
pub struct MemoryDepartureStore {
    inner: Arc<RwLock<MemorySnapshot>>,
}

impl MemoryDepartureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: MemorySnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub fn replace_observations(&self, rows: Vec<RealtimeObservation>) {
        if let Ok(mut snapshot) = self.inner.write() {
            snapshot.observations = rows;
        }
    }

    pub fn replace_timetable(&self, rows: Vec<ScheduledStopEntry>) {
        if let Ok(mut snapshot) = self.inner.write() {
            snapshot.timetable = rows;
        }
    }
}

fn stop_id_matches(stop_ids: &Option<Vec<CompactString>>, stop_id: &CompactString) -> bool {
    match stop_ids {
        Some(ids) => ids.contains(stop_id),
        None => true,
    }
}

impl DepartureStore for MemoryDepartureStore {
    async fn realtime_observations(
        &self,
        query: &RealtimeQuery,
    ) -> Result<Vec<RealtimeObservation>, StorageError> {
        let snapshot = self
            .inner
            .read()
            .map_err(|_| StorageError::Unavailable(String::from("snapshot lock poisoned")))?;

        let mut rows: Vec<RealtimeObservation> = snapshot
            .observations
            .iter()
            .filter(|obs| stop_id_matches(&query.stop_ids, &obs.stop_id))
            .filter(|obs| match &query.route_id {
                Some(route_id) => obs.route_id == *route_id,
                None => true,
            })
            .filter(|obs| match query.direction_id {
                Some(direction_id) => obs.direction_id == Some(direction_id),
                None => true,
            })
            .filter(|obs| obs.collected_at >= query.collected_since)
            .cloned()
            .collect();

        rows.sort_by_key(|obs| obs.actual_epoch_seconds.unwrap_or(i64::MAX));
        rows.truncate(query.limit);

        Ok(rows)
    }

    async fn scheduled_stop_entries(
        &self,
        query: &ScheduleQuery,
    ) -> Result<Vec<ScheduledStopEntry>, StorageError> {
        let snapshot = self
            .inner
            .read()
            .map_err(|_| StorageError::Unavailable(String::from("snapshot lock poisoned")))?;

        let mut rows: Vec<ScheduledStopEntry> = snapshot
            .timetable
            .iter()
            .filter(|entry| stop_id_matches(&query.stop_ids, &entry.stop_id))
            .filter(|entry| entry.scheduled_departure_clock.as_str() >= query.from_clock_time.as_str())
            .cloned()
            .collect();

        rows.sort_by(|a, b| a.scheduled_departure_clock.cmp(&b.scheduled_departure_clock));
        rows.truncate(query.limit);

        Ok(rows)
    }
}
