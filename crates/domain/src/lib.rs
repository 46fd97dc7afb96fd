//! Domain layer for order intake.
//!
//! - [`Order`] aggregate: a placed, priced order and its status lifecycle
//! - [`pricing`]: channel price resolution and tax / shipping / discount policies
//! - [`Principal`] and [`Role`]: the authenticated caller as seen by the core
//! - [`OrderService`]: command execution against the event store

pub mod aggregate;
pub mod catalog;
pub mod command;
pub mod error;
pub mod order;
pub mod pricing;
pub mod principal;

pub use aggregate::{Aggregate, DomainEvent};
pub use catalog::{ProductId, ProductSnapshot};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use order::{
    Address, InventoryReleasedData, LineItem, Money, Order, OrderDraft, OrderError, OrderEvent,
    OrderPlacedData, OrderService, OrderStatus, PaymentStatus, PaymentStatusRecordedData,
    PlaceOrder, RecordPaymentStatus, StatusChangedData, TransitionStatus,
};
pub use pricing::{
    Channel, DiscountPolicy, FlatRateTax, NoDiscount, OrderTotals, PriceQuote, PricingError,
    PricingPolicy, ShippingPolicy, TaxPolicy, ThresholdShipping, resolve_price,
};
pub use principal::{Principal, Role, UnknownRole};
