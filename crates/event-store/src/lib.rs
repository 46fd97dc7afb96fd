//! Persistence for event-sourced aggregates.
//!
//! Each aggregate owns one stream of [`EventEnvelope`]s ordered by
//! [`Version`]. Appends are guarded by an expected version so that two
//! writers racing on the same aggregate cannot both succeed.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStream, StoredEvent};
