//! Inventory reservation with compensation.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use common::AggregateId;
use domain::{LineItem, ProductId, ProductSnapshot};

use crate::catalog::{Catalog, CatalogError, StockUpdate};
use crate::error::{IntakeError, Result};
use crate::reconciliation::{ReconciliationEntry, ReconciliationLog, ReconciliationReason};

pub const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_secs(2);

/// Stock taken out of the catalog for one line of an order attempt.
///
/// Not `Clone`: releasing consumes the token, so the same decrement cannot be
/// given back twice.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be released or committed"]
pub struct Reservation {
    product_id: ProductId,
    sku: String,
    quantity: u32,
}

impl Reservation {
    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// Bounded access to catalog stock.
///
/// Every call is cut off after `timeout`. Stock that may have been taken
/// without being given back is recorded in the reconciliation log.
#[derive(Debug, Clone)]
pub struct Inventory<C> {
    catalog: C,
    timeout: Duration,
    reconciliation: ReconciliationLog,
}

impl<C: Catalog> Inventory<C> {
    pub fn new(catalog: C, reconciliation: ReconciliationLog) -> Self {
        Self {
            catalog,
            timeout: DEFAULT_CATALOG_TIMEOUT,
            reconciliation,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn reconciliation(&self) -> &ReconciliationLog {
        &self.reconciliation
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = std::result::Result<T, CatalogError>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "catalog call timed out"
                );
                Err(IntakeError::Timeout { operation })
            }
        }
    }

    /// Fetches a product, failing with `ProductNotFound` if it does not exist.
    pub async fn lookup(&self, product_id: &ProductId) -> Result<ProductSnapshot> {
        self.bounded("get_product", self.catalog.get_product(product_id))
            .await?
            .ok_or_else(|| IntakeError::ProductNotFound {
                product_id: product_id.clone(),
            })
    }

    /// Atomically takes `quantity` units of `product` out of stock.
    ///
    /// A timed-out decrement may still have been applied, so it is recorded
    /// as uncertain before the timeout is returned.
    #[tracing::instrument(skip(self, product), fields(product_id = %product.id, sku = %product.sku))]
    pub async fn reserve(
        &self,
        product: &ProductSnapshot,
        quantity: u32,
        order_id: AggregateId,
    ) -> Result<Reservation> {
        let outcome = self
            .bounded("decrement_stock", self.catalog.decrement_stock(&product.id, quantity))
            .await;

        match outcome {
            Ok(StockUpdate::Applied { remaining }) => {
                tracing::debug!(remaining, "stock reserved");
                Ok(Reservation {
                    product_id: product.id.clone(),
                    sku: product.sku.clone(),
                    quantity,
                })
            }
            Ok(StockUpdate::Insufficient { available }) => Err(IntakeError::InsufficientStock {
                sku: product.sku.clone(),
                available,
                requested: quantity,
            }),
            Err(IntakeError::Catalog(CatalogError::NotFound(product_id))) => {
                Err(IntakeError::ProductNotFound { product_id })
            }
            Err(err @ IntakeError::Timeout { .. }) => {
                self.flag(
                    order_id,
                    &product.id,
                    &product.sku,
                    quantity,
                    ReconciliationReason::UncertainReservation,
                    &err,
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Gives a reservation's stock back.
    ///
    /// On failure the stock is recorded for reconciliation and the error is
    /// still returned.
    #[tracing::instrument(skip(self, reservation), fields(product_id = %reservation.product_id, quantity = reservation.quantity))]
    pub async fn release(&self, reservation: Reservation, order_id: AggregateId) -> Result<()> {
        let Reservation {
            product_id,
            sku,
            quantity,
        } = reservation;

        let result = self
            .bounded("increment_stock", self.catalog.increment_stock(&product_id, quantity))
            .await;

        if let Err(err) = &result {
            let reason = match err {
                IntakeError::Timeout { .. } => ReconciliationReason::ReleaseTimedOut,
                _ => ReconciliationReason::ReleaseFailed,
            };
            self.flag(order_id, &product_id, &sku, quantity, reason, err);
        }
        result
    }

    /// Puts a placed order's line back into stock after cancellation.
    #[tracing::instrument(skip(self, item), fields(product_id = %item.product_id, quantity = item.quantity))]
    pub async fn restock(&self, item: &LineItem, order_id: AggregateId) -> Result<()> {
        let result = self
            .bounded(
                "increment_stock",
                self.catalog.increment_stock(&item.product_id, item.quantity),
            )
            .await;

        if let Err(err) = &result {
            self.flag(
                order_id,
                &item.product_id,
                &item.sku,
                item.quantity,
                ReconciliationReason::RestockFailed,
                err,
            );
        }
        result
    }

    fn flag(
        &self,
        order_id: AggregateId,
        product_id: &ProductId,
        sku: &str,
        quantity: u32,
        reason: ReconciliationReason,
        err: &IntakeError,
    ) {
        self.reconciliation.record(ReconciliationEntry {
            order_id,
            product_id: product_id.clone(),
            sku: sku.to_string(),
            quantity,
            reason,
            detail: err.to_string(),
            recorded_at: Utc::now(),
        });
    }
}

impl<C: Catalog + Clone + 'static> Inventory<C> {
    /// Starts an empty compensation list for one order attempt.
    pub fn ledger(&self, order_id: AggregateId) -> ReservationLedger<C> {
        ReservationLedger::new(self.clone(), order_id)
    }

    /// Puts every line of a cancelled order back into stock and returns how
    /// many lines were restocked.
    ///
    /// The work runs on its own task, so it finishes even if the caller stops
    /// waiting. Lines the task never gets to are recorded for reconciliation.
    pub async fn restock_order(&self, items: Vec<LineItem>, order_id: AggregateId) -> usize {
        let lines = items.len();
        let pending = PendingRestock {
            inventory: self.clone(),
            order_id,
            items,
        };

        match tokio::spawn(pending.run()).await {
            Ok(restocked) => restocked,
            Err(err) => {
                tracing::error!(%order_id, lines, error = %err, "restock task did not finish");
                0
            }
        }
    }
}

/// Lines of a cancelled order still waiting to go back into stock.
struct PendingRestock<C: Catalog + Clone + 'static> {
    inventory: Inventory<C>,
    order_id: AggregateId,
    items: Vec<LineItem>,
}

impl<C: Catalog + Clone + 'static> PendingRestock<C> {
    async fn run(mut self) -> usize {
        let mut restocked = 0;
        // A line leaves `items` only once its increment has returned.
        while let Some(item) = self.items.first() {
            if self.inventory.restock(item, self.order_id).await.is_ok() {
                restocked += 1;
            }
            self.items.remove(0);
        }
        restocked
    }
}

impl<C: Catalog + Clone + 'static> Drop for PendingRestock<C> {
    fn drop(&mut self) {
        for item in self.items.drain(..) {
            self.inventory.reconciliation.record(ReconciliationEntry {
                order_id: self.order_id,
                product_id: item.product_id,
                sku: item.sku,
                quantity: item.quantity,
                reason: ReconciliationReason::RestockFailed,
                detail: "restock interrupted before completion".to_string(),
                recorded_at: Utc::now(),
            });
        }
    }
}

/// Reservations made so far for one order attempt.
///
/// Must end in [`ReservationLedger::commit`] or
/// [`ReservationLedger::release_all`]. A ledger dropped with live
/// reservations (for instance because the request was cancelled) releases
/// them on a background task, or records them for reconciliation when no
/// runtime is available.
pub struct ReservationLedger<C: Catalog + Clone + 'static> {
    inventory: Inventory<C>,
    order_id: AggregateId,
    reservations: Vec<Reservation>,
}

impl<C: Catalog + Clone + 'static> ReservationLedger<C> {
    pub fn new(inventory: Inventory<C>, order_id: AggregateId) -> Self {
        Self {
            inventory,
            order_id,
            reservations: Vec::new(),
        }
    }

    pub fn order_id(&self) -> AggregateId {
        self.order_id
    }

    pub fn push(&mut self, reservation: Reservation) {
        self.reservations.push(reservation);
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    /// Releases every reservation, most recent first, and returns how many
    /// were given back. Failures are already in the reconciliation log.
    pub async fn release_all(mut self) -> usize {
        let mut released = 0;
        while let Some(reservation) = self.reservations.pop() {
            if self.inventory.release(reservation, self.order_id).await.is_ok() {
                released += 1;
            }
        }
        released
    }

    /// Hands the reservations over to the persisted order.
    pub fn commit(mut self) -> usize {
        let committed = self.reservations.len();
        self.reservations.clear();
        committed
    }
}

impl<C: Catalog + Clone + 'static> Drop for ReservationLedger<C> {
    fn drop(&mut self) {
        if self.reservations.is_empty() {
            return;
        }

        let reservations = std::mem::take(&mut self.reservations);
        let order_id = self.order_id;
        tracing::warn!(%order_id, count = reservations.len(), "ledger dropped with live reservations");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inventory = self.inventory.clone();
                handle.spawn(async move {
                    for reservation in reservations.into_iter().rev() {
                        // release records its own failures
                        let _ = inventory.release(reservation, order_id).await;
                    }
                });
            }
            Err(_) => {
                for reservation in reservations {
                    self.inventory.reconciliation.record(ReconciliationEntry {
                        order_id,
                        product_id: reservation.product_id,
                        sku: reservation.sku,
                        quantity: reservation.quantity,
                        reason: ReconciliationReason::AbandonedReservation,
                        detail: "ledger dropped outside a runtime".to_string(),
                        recorded_at: Utc::now(),
                    });
                }
            }
        }
    }
}
