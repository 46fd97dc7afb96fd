//! Read side for order listings.
//!
//! - [`Projection`] trait for folding stored events into a read model
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`ProjectionProcessor`] for feeding events from the store to projections
//! - [`CustomerOrdersView`]: each user's orders, newest first

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{CustomerOrdersView, OrderSummary};
