use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, StoredEvent, validate_events_for_append},
};

/// In-memory event store for tests and single-process deployments.
///
/// Events are kept in one commit-ordered log behind a write lock, so the
/// version check and the append happen under the same guard.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
    reject_appends: Arc<AtomicBool>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events across all streams.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Makes every subsequent append fail with `Unavailable` until reset.
    pub fn set_reject_appends(&self, reject: bool) {
        self.reject_appends.store(reject, Ordering::SeqCst);
    }

    fn current_version(log: &[EventEnvelope], aggregate_id: AggregateId) -> Version {
        log.iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or(Version::initial())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        if self.reject_appends.load(Ordering::SeqCst) {
            return Err(EventStoreError::Unavailable(
                "appends are currently rejected".to_string(),
            ));
        }

        let aggregate_id = events[0].aggregate_id;
        let mut log = self.events.write().await;
        let current = Self::current_version(&log, aggregate_id);

        if let Some(expected) = options.expected_version
            && current != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current,
            });
        }

        // Same guarantee the unique (aggregate_id, version) index gives Postgres.
        if events[0].version <= current {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        let last_version = events[events.len() - 1].version;
        log.extend(events);
        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.events.read().await;
        let mut events: Vec<_> = log
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let log = self.events.read().await;
        let version = Self::current_version(&log, aggregate_id);
        Ok((version != Version::initial()).then_some(version))
    }

    async fn stream_events_after(&self, position: u64) -> Result<EventStream<'_>> {
        let log = self.events.read().await;
        let skip = usize::try_from(position).unwrap_or(usize::MAX).min(log.len());
        // Position is the 1-based index in the log.
        let events: Vec<StoredEvent> = log[skip..]
            .iter()
            .zip(position + 1..)
            .map(|(envelope, position)| StoredEvent {
                position,
                envelope: envelope.clone(),
            })
            .collect();
        Ok(Box::pin(futures_util::stream::iter(events.into_iter().map(Ok))))
    }
}
