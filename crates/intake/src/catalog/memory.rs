use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::{ProductId, ProductSnapshot};
use tokio::sync::Mutex;

use super::{Catalog, CatalogError, StockUpdate};

#[derive(Debug, Default)]
struct Faults {
    unavailable: AtomicBool,
    fail_increments: AtomicBool,
    lookup_delay_ms: AtomicU64,
    decrement_delay_ms: AtomicU64,
    increment_delay_ms: AtomicU64,
}

/// In-memory catalog. Every stock change happens under a single lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<Mutex<HashMap<ProductId, ProductSnapshot>>>,
    faults: Arc<Faults>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_products(products: impl IntoIterator<Item = ProductSnapshot>) -> Self {
        let catalog = Self::new();
        for product in products {
            catalog.upsert_product(product).await;
        }
        catalog
    }

    /// Inserts or replaces a product, stock included.
    pub async fn upsert_product(&self, product: ProductSnapshot) {
        self.products.lock().await.insert(product.id.clone(), product);
    }

    pub async fn stock_of(&self, id: &ProductId) -> Option<u32> {
        self.products.lock().await.get(id).map(|p| p.stock)
    }

    /// Makes every call fail as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes stock increments fail while lookups and decrements still work.
    pub fn set_fail_increments(&self, fail: bool) {
        self.faults.fail_increments.store(fail, Ordering::SeqCst);
    }

    /// Delays product lookups before they read anything.
    pub fn set_lookup_delay(&self, delay: Duration) {
        self.faults
            .lookup_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Delays the answer of a decrement after it has been applied.
    pub fn set_decrement_delay(&self, delay: Duration) {
        self.faults
            .decrement_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Delays stock increments before they are applied.
    pub fn set_increment_delay(&self, delay: Duration) {
        self.faults
            .increment_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), CatalogError> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable(
                "catalog is rejecting requests".to_string(),
            ));
        }
        Ok(())
    }

    async fn pause(delay_ms: &AtomicU64) {
        let ms = delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, CatalogError> {
        Self::pause(&self.faults.lookup_delay_ms).await;
        self.check_available()?;
        Ok(self.products.lock().await.get(id).cloned())
    }

    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockUpdate, CatalogError> {
        self.check_available()?;
        let update = {
            let mut products = self.products.lock().await;
            let product = products
                .get_mut(id)
                .ok_or_else(|| CatalogError::NotFound(id.clone()))?;

            if product.stock >= quantity {
                product.stock -= quantity;
                StockUpdate::Applied {
                    remaining: product.stock,
                }
            } else {
                StockUpdate::Insufficient {
                    available: product.stock,
                }
            }
        };
        Self::pause(&self.faults.decrement_delay_ms).await;
        Ok(update)
    }

    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<(), CatalogError> {
        Self::pause(&self.faults.increment_delay_ms).await;
        self.check_available()?;
        if self.faults.fail_increments.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable(
                "stock increments are failing".to_string(),
            ));
        }

        let mut products = self.products.lock().await;
        let product = products
            .get_mut(id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        product.stock = product.stock.saturating_add(quantity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Money;

    fn product(id: &str, stock: u32) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            sku: format!("SKU-{id}"),
            image: None,
            base_price: Money::from_cents(1_000),
            b2b_price: Money::from_cents(800),
            b2b_minimum_order: 10,
            stock,
        }
    }

    #[tokio::test]
    async fn test_decrement_applies_only_when_covered() {
        let catalog = InMemoryCatalog::with_products([product("a", 5)]).await;
        let id = ProductId::new("a");

        assert_eq!(
            catalog.decrement_stock(&id, 3).await.unwrap(),
            StockUpdate::Applied { remaining: 2 }
        );
        assert_eq!(
            catalog.decrement_stock(&id, 3).await.unwrap(),
            StockUpdate::Insufficient { available: 2 }
        );
        assert_eq!(catalog.stock_of(&id).await, Some(2));
    }

    #[tokio::test]
    async fn test_decrement_to_exactly_zero() {
        let catalog = InMemoryCatalog::with_products([product("a", 4)]).await;
        let id = ProductId::new("a");

        assert_eq!(
            catalog.decrement_stock(&id, 4).await.unwrap(),
            StockUpdate::Applied { remaining: 0 }
        );
    }

    #[tokio::test]
    async fn test_increment_restores_stock() {
        let catalog = InMemoryCatalog::with_products([product("a", 1)]).await;
        let id = ProductId::new("a");

        catalog.increment_stock(&id, 4).await.unwrap();

        assert_eq!(catalog.stock_of(&id).await, Some(5));
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let catalog = InMemoryCatalog::new();
        let id = ProductId::new("ghost");

        assert!(catalog.get_product(&id).await.unwrap().is_none());
        assert!(matches!(
            catalog.decrement_stock(&id, 1).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let catalog = InMemoryCatalog::with_products([product("a", 5)]).await;
        let id = ProductId::new("a");

        catalog.set_fail_increments(true);
        assert!(catalog.increment_stock(&id, 1).await.is_err());
        assert!(catalog.decrement_stock(&id, 1).await.is_ok());

        catalog.set_unavailable(true);
        assert!(matches!(
            catalog.get_product(&id).await,
            Err(CatalogError::Unavailable(_))
        ));
        assert_eq!(catalog.stock_of(&id).await, Some(4));
    }
}
