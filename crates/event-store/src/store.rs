use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// Options for appending events to a stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Version the stream must be at for the append to succeed.
    /// `None` skips the check.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// The stream must not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// An event together with its place in the global log.
///
/// Positions increase in commit order and may have gaps.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub position: u64,
    pub envelope: EventEnvelope,
}

/// A stream of events across all aggregates, in commit order.
pub type EventStream<'a> = Pin<Box<dyn Stream<Item = Result<StoredEvent>> + Send + 'a>>;

/// Storage contract for aggregate event streams.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch to one stream atomically and returns the new version.
    ///
    /// Fails with [`EventStoreError::ConcurrencyConflict`] when
    /// `options.expected_version` does not match the stream.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Returns one stream, oldest event first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Returns the current version of a stream, or `None` if it does not exist.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Streams the events committed after `position`, in commit order.
    ///
    /// An event is never visible at a position lower than one already
    /// returned, so a reader can resume from the last position it saw.
    async fn stream_events_after(&self, position: u64) -> Result<EventStream<'_>>;

    /// Streams every stored event in commit order.
    async fn stream_all_events(&self) -> Result<EventStream<'_>> {
        self.stream_events_after(0).await
    }
}

/// Checks that a batch targets a single stream with consecutive versions.
pub(crate) fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected = first.version;
    for event in &events[1..] {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "all events must belong to the same aggregate".to_string(),
            ));
        }
        expected = expected.next();
        if event.version != expected {
            return Err(EventStoreError::InvalidAppend(format!(
                "versions must be consecutive: expected {expected}, got {}",
                event.version
            )));
        }
    }

    Ok(())
}
