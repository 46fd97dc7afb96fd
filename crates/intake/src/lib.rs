//! Order intake: turns a cart into a priced, stock-reserved order.
//!
//! Intake runs per line item, in request order:
//! 1. Look the product up in the catalog
//! 2. Resolve the channel price and minimum-order rule
//! 3. Reserve stock with an atomic conditional decrement
//!
//! If any item fails, or the final persist fails, every reservation made so
//! far for the request is released in reverse order before the error is
//! returned. Releases that cannot be applied are recorded for reconciliation.

pub mod assembler;
pub mod catalog;
pub mod error;
pub mod lifecycle;
pub mod reconciliation;
pub mod request;
pub mod reservation;

pub use assembler::OrderAssembler;
pub use catalog::{
    Catalog, CatalogError, InMemoryCatalog, PostgresCatalog, StockUpdate, load_seed_file,
};
pub use error::{IntakeError, Result};
pub use lifecycle::OrderLifecycle;
pub use reconciliation::{ReconciliationEntry, ReconciliationLog, ReconciliationReason};
pub use request::{CreateOrderRequest, OrderItemRequest, OrderReceipt};
pub use reservation::{DEFAULT_CATALOG_TIMEOUT, Inventory, Reservation, ReservationLedger};
