//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// Global log position of the last event a projection has handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition {
    pub last_position: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self { last_position: 0 }
    }

    /// Moves forward to `position`. Never moves backwards.
    pub fn advance_to(&self, position: u64) -> Self {
        Self {
            last_position: self.last_position.max(position),
        }
    }

    /// True if the event at log `position` has not been handled yet.
    pub fn is_behind(&self, position: u64) -> bool {
        self.last_position < position
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.last_position)
    }
}

/// Folds stored events into a read model.
///
/// `handle` is called once per event of the global log, in commit order,
/// with the event's log position. It must advance to that position even
/// for events it ignores.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, position: u64, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all state and rewinds to position zero.
    async fn reset(&self) -> Result<()>;
}
