//! Read model trait for query-side views.

/// A query-side view kept up to date by a projection.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of entries currently held, or 0 while the view is being written.
    fn count(&self) -> usize;
}
