//! Integration tests: OrderAssembler + OrderLifecycle over in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use common::UserId;
use domain::{
    Address, Channel, Money, OrderService, OrderStatus, PricingPolicy, Principal, ProductId,
    ProductSnapshot, Role,
};
use event_store::InMemoryEventStore;
use intake::{
    CreateOrderRequest, InMemoryCatalog, IntakeError, Inventory, OrderAssembler, OrderItemRequest,
    OrderLifecycle, ReconciliationLog, ReconciliationReason,
};

struct Harness {
    assembler: Arc<OrderAssembler<InMemoryEventStore, InMemoryCatalog>>,
    lifecycle: OrderLifecycle<InMemoryEventStore, InMemoryCatalog>,
    orders: OrderService<InMemoryEventStore>,
    store: InMemoryEventStore,
    catalog: InMemoryCatalog,
    reconciliation: ReconciliationLog,
}

fn product(id: &str, base_cents: i64, b2b_cents: i64, stock: u32) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        sku: format!("SKU-{}", id.to_uppercase()),
        image: None,
        base_price: Money::from_cents(base_cents),
        b2b_price: Money::from_cents(b2b_cents),
        b2b_minimum_order: 10,
        stock,
    }
}

async fn harness(products: Vec<ProductSnapshot>) -> Harness {
    let store = InMemoryEventStore::new();
    let catalog = InMemoryCatalog::with_products(products).await;
    let reconciliation = ReconciliationLog::new();
    let inventory = Inventory::new(catalog.clone(), reconciliation.clone())
        .with_timeout(Duration::from_millis(100));

    Harness {
        assembler: Arc::new(OrderAssembler::new(
            store.clone(),
            inventory.clone(),
            PricingPolicy::default(),
        )),
        lifecycle: OrderLifecycle::new(store.clone(), inventory),
        orders: OrderService::new(store.clone()),
        store,
        catalog,
        reconciliation,
    }
}

fn address() -> Address {
    Address {
        first_name: "Katherine".to_string(),
        last_name: "Johnson".to_string(),
        address1: "1 NASA Drive".to_string(),
        address2: Some("Building 1244".to_string()),
        city: "Hampton".to_string(),
        state: "VA".to_string(),
        zip_code: "23666".to_string(),
        country: "US".to_string(),
        phone: "7575550123".to_string(),
    }
}

fn request(items: &[(&str, i64)]) -> CreateOrderRequest {
    CreateOrderRequest {
        items: items
            .iter()
            .map(|(id, qty)| OrderItemRequest::new(*id, *qty))
            .collect(),
        shipping_address: address(),
        billing_address: address(),
        payment_method: "invoice".to_string(),
        notes: None,
    }
}

fn b2c() -> Principal {
    Principal::new(UserId::new(), Role::B2cCustomer)
}

fn b2b() -> Principal {
    Principal::new(UserId::new(), Role::B2bCustomer)
}

async fn stock(h: &Harness, id: &str) -> u32 {
    h.catalog.stock_of(&ProductId::new(id)).await.unwrap()
}

mod pricing {
    use super::*;

    #[tokio::test]
    async fn test_unit_price_follows_channel() {
        let h = harness(vec![product("bolt", 150, 90, 500)]).await;

        let consumer = h
            .assembler
            .create_order(&b2c(), request(&[("bolt", 12)]))
            .await
            .unwrap();
        let business = h
            .assembler
            .create_order(&b2b(), request(&[("bolt", 12)]))
            .await
            .unwrap();

        let consumer = h.orders.get_order(consumer.order_id).await.unwrap().unwrap();
        let business = h.orders.get_order(business.order_id).await.unwrap().unwrap();
        assert_eq!(consumer.channel(), Channel::B2c);
        assert_eq!(consumer.items()[0].unit_price, Money::from_cents(150));
        assert_eq!(business.channel(), Channel::B2b);
        assert_eq!(business.items()[0].unit_price, Money::from_cents(90));
    }

    #[tokio::test]
    async fn test_totals_add_up() {
        let h = harness(vec![product("a", 1_999, 1_500, 50), product("b", 333, 250, 50)]).await;

        let receipt = h
            .assembler
            .create_order(&b2c(), request(&[("a", 3), ("b", 7)]))
            .await
            .unwrap();

        let order = h.orders.get_order(receipt.order_id).await.unwrap().unwrap();
        let totals = order.totals();
        assert_eq!(totals.subtotal, Money::from_cents(3 * 1_999 + 7 * 333));
        assert_eq!(
            totals.total,
            totals.subtotal + totals.tax + totals.shipping - totals.discount
        );
        assert_eq!(receipt.total, totals.total);
        assert_eq!(order.items().len(), 2);
        assert_eq!(order.items()[1].sku, "SKU-B");
    }

    #[tokio::test]
    async fn test_free_shipping_just_above_threshold() {
        let h = harness(vec![product("a", 10_001, 10_001, 5)]).await;

        let receipt = h
            .assembler
            .create_order(&b2c(), request(&[("a", 1)]))
            .await
            .unwrap();

        let totals = h.orders.get_order(receipt.order_id).await.unwrap().unwrap().totals();
        assert_eq!(totals.shipping, Money::zero());
        assert_eq!(totals.tax, Money::from_cents(1_000));
        assert_eq!(receipt.total, Money::from_cents(11_001));
    }

    #[tokio::test]
    async fn test_flat_shipping_just_below_threshold() {
        let h = harness(vec![product("a", 9_999, 9_999, 5)]).await;

        let receipt = h
            .assembler
            .create_order(&b2c(), request(&[("a", 1)]))
            .await
            .unwrap();

        let totals = h.orders.get_order(receipt.order_id).await.unwrap().unwrap().totals();
        assert_eq!(totals.shipping, Money::from_cents(500));
        assert_eq!(receipt.total, Money::from_cents(9_999 + 1_000 + 500));
    }

    #[tokio::test]
    async fn test_b2b_below_minimum_mutates_no_stock() {
        let h = harness(vec![product("a", 1_000, 800, 40), product("b", 1_000, 800, 40)]).await;

        let err = h
            .assembler
            .create_order(&b2b(), request(&[("a", 10), ("b", 4)]))
            .await
            .unwrap_err();

        match err {
            IntakeError::MinimumOrderNotMet {
                sku,
                required,
                requested,
            } => {
                assert_eq!(sku, "SKU-B");
                assert_eq!(required, 10);
                assert_eq!(requested, 4);
            }
            other => panic!("expected MinimumOrderNotMet, got {other:?}"),
        }
        assert_eq!(stock(&h, "a").await, 40);
        assert_eq!(stock(&h, "b").await, 40);
        assert_eq!(h.store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_b2c_has_no_minimum() {
        let h = harness(vec![product("a", 1_000, 800, 40)]).await;

        assert!(
            h.assembler
                .create_order(&b2c(), request(&[("a", 1)]))
                .await
                .is_ok()
        );
    }
}

mod compensation {
    use super::*;

    #[tokio::test]
    async fn test_third_item_missing_restores_first_two() {
        let h = harness(vec![product("a", 1_000, 800, 10), product("b", 2_000, 1_600, 10)]).await;

        let err = h
            .assembler
            .create_order(&b2c(), request(&[("a", 2), ("b", 3), ("ghost", 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::ProductNotFound { ref product_id } if product_id.as_str() == "ghost"));
        assert!(err.is_client_error());
        assert_eq!(stock(&h, "a").await, 10);
        assert_eq!(stock(&h, "b").await, 10);
        assert_eq!(h.store.event_count().await, 0);
        assert!(h.reconciliation.is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_releases_every_reservation() {
        let h = harness(vec![product("a", 1_000, 800, 10), product("b", 2_000, 1_600, 10)]).await;
        h.store.set_reject_appends(true);

        let err = h
            .assembler
            .create_order(&b2c(), request(&[("a", 2), ("b", 3)]))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(stock(&h, "a").await, 10);
        assert_eq!(stock(&h, "b").await, 10);
        assert_eq!(h.store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_release_is_flagged_not_swallowed() {
        let h = harness(vec![product("a", 1_000, 800, 5), product("b", 1_000, 800, 1)]).await;
        h.catalog.set_fail_increments(true);

        let err = h
            .assembler
            .create_order(&b2c(), request(&[("a", 3), ("b", 2)]))
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::InsufficientStock { .. }));
        assert_eq!(stock(&h, "a").await, 2);
        let entries = h.reconciliation.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].product_id, ProductId::new("a"));
        assert_eq!(entries[0].quantity, 3);
        assert_eq!(entries[0].reason, ReconciliationReason::ReleaseFailed);
    }

    #[tokio::test]
    async fn test_catalog_timeout_is_transient() {
        let h = harness(vec![product("a", 1_000, 800, 5)]).await;
        h.catalog.set_lookup_delay(Duration::from_millis(500));

        let err = h
            .assembler
            .create_order(&b2c(), request(&[("a", 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, IntakeError::Timeout { .. }));
        assert!(err.is_transient());
        assert_eq!(stock(&h, "a").await, 5);
        assert_eq!(h.store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_catalog_outage_is_transient() {
        let h = harness(vec![product("a", 1_000, 800, 5)]).await;
        h.catalog.set_unavailable(true);

        let err = h
            .assembler
            .create_order(&b2c(), request(&[("a", 1)]))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(err.kind(), "catalog_unavailable");
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_orders_race_for_five_units() {
        let h = harness(vec![product("a", 1_000, 800, 5)]).await;

        let first = tokio::spawn({
            let assembler = Arc::clone(&h.assembler);
            async move { assembler.create_order(&b2c(), request(&[("a", 3)])).await }
        });
        let second = tokio::spawn({
            let assembler = Arc::clone(&h.assembler);
            async move { assembler.create_order(&b2c(), request(&[("a", 3)])).await }
        });
        let results = [first.await.unwrap(), second.await.unwrap()];

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(IntakeError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            })
        )));
        assert_eq!(stock(&h, "a").await, 2);
        assert_eq!(h.store.event_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stock_never_goes_negative_under_load() {
        let h = harness(vec![product("a", 1_000, 800, 20), product("b", 1_000, 800, 1_000)]).await;

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let assembler = Arc::clone(&h.assembler);
                tokio::spawn(async move {
                    assembler
                        .create_order(&b2c(), request(&[("b", 1), ("a", 1)]))
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 20);
        assert_eq!(stock(&h, "a").await, 0);
        // rejected orders gave their "b" unit back
        assert_eq!(stock(&h, "b").await, 1_000 - 20);
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_placed_then_cancelled_order_returns_stock() {
        let h = harness(vec![product("a", 1_000, 800, 8)]).await;
        let admin = Principal::new(UserId::new(), Role::Admin);
        let receipt = h
            .assembler
            .create_order(&b2c(), request(&[("a", 5)]))
            .await
            .unwrap();
        assert_eq!(stock(&h, "a").await, 3);

        let order = h
            .lifecycle
            .transition(&admin, receipt.order_id, "processing")
            .await
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Processing);

        let order = h
            .lifecycle
            .transition(&admin, receipt.order_id, "cancelled")
            .await
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(stock(&h, "a").await, 8);

        h.lifecycle
            .transition(&admin, receipt.order_id, "pending")
            .await
            .unwrap();
        h.lifecycle
            .transition(&admin, receipt.order_id, "cancelled")
            .await
            .unwrap();
        assert_eq!(stock(&h, "a").await, 8);
    }

    #[tokio::test]
    async fn test_every_status_is_assignable_from_every_status() {
        let h = harness(vec![product("a", 1_000, 800, 8)]).await;
        let admin = Principal::new(UserId::new(), Role::Admin);
        let receipt = h
            .assembler
            .create_order(&b2c(), request(&[("a", 1)]))
            .await
            .unwrap();

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                h.lifecycle
                    .transition(&admin, receipt.order_id, from.as_str())
                    .await
                    .unwrap();
                let order = h
                    .lifecycle
                    .transition(&admin, receipt.order_id, to.as_str())
                    .await
                    .unwrap();
                assert_eq!(order.status(), to);
            }
        }
        // only the first cancellation from pending gave stock back
        assert_eq!(stock(&h, "a").await, 8);
    }
}
