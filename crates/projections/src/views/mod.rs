//! Read model views.

mod customer_orders;

pub use customer_orders::{CustomerOrdersView, OrderSummary};
