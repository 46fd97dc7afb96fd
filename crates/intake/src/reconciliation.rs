//! Record of stock mutations whose outcome is unknown or could not be undone.
//!
//! An entry means the catalog's stock for that product may be off by
//! `quantity` and needs to be checked by an operator.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::ProductId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationReason {
    /// A compensating release returned an error. Stock is under-counted.
    ReleaseFailed,
    /// A compensating release timed out and may or may not have applied.
    ReleaseTimedOut,
    /// A decrement timed out and may or may not have applied.
    UncertainReservation,
    /// Restocking a cancelled order failed. Stock is under-counted.
    RestockFailed,
    /// A reservation was dropped without being released or committed.
    AbandonedReservation,
}

impl ReconciliationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationReason::ReleaseFailed => "release_failed",
            ReconciliationReason::ReleaseTimedOut => "release_timed_out",
            ReconciliationReason::UncertainReservation => "uncertain_reservation",
            ReconciliationReason::RestockFailed => "restock_failed",
            ReconciliationReason::AbandonedReservation => "abandoned_reservation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationEntry {
    pub order_id: AggregateId,
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: u32,
    pub reason: ReconciliationReason,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

/// Shared, append-only list of entries needing reconciliation.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationLog {
    entries: Arc<Mutex<Vec<ReconciliationEntry>>>,
}

impl ReconciliationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the entry, logs it at error level and counts it.
    ///
    /// Synchronous so it can be called from `Drop`.
    pub fn record(&self, entry: ReconciliationEntry) {
        tracing::error!(
            order_id = %entry.order_id,
            product_id = %entry.product_id,
            sku = %entry.sku,
            quantity = entry.quantity,
            reason = entry.reason.as_str(),
            detail = %entry.detail,
            "stock requires reconciliation"
        );
        metrics::counter!("stock_reconciliation_required_total", "reason" => entry.reason.as_str())
            .increment(1);
        self.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<ReconciliationEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns every entry, e.g. once an operator has handled them.
    pub fn drain(&self) -> Vec<ReconciliationEntry> {
        std::mem::take(&mut *self.lock())
    }

    // A panic while holding the lock leaves the list intact, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Vec<ReconciliationEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
