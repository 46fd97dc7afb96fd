//! Projection processor for feeding events to projections.

use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Reads the global event log and delivers it to registered projections.
///
/// Catch-up runs are serialized so two concurrent readers of a view cannot
/// both deliver the same event.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    catch_up: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams the events after the least advanced projection's position and
    /// delivers each one to every projection that has not handled it yet.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let _guard = self.catch_up.lock().await;

        let mut start = u64::MAX;
        for projection in &self.projections {
            start = start.min(projection.position().await.last_position);
        }
        if start == u64::MAX {
            return Ok(());
        }

        let mut stream = self.store.stream_events_after(start).await?;
        let mut seen: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let stored = result?;
            seen += 1;

            for projection in &self.projections {
                if projection.position().await.is_behind(stored.position) {
                    projection.handle(stored.position, &stored.envelope).await?;
                    delivered += 1;
                }
            }
        }

        if delivered > 0 {
            metrics::counter!("projection_events_processed_total").increment(delivered);
            tracing::debug!(from = start, events = seen, delivered, "catch-up complete");
        }

        Ok(())
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            tracing::info!(projection = projection.name(), "resetting projection");
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
