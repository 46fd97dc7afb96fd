use async_trait::async_trait;
use domain::{Money, ProductId, ProductSnapshot};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{Catalog, CatalogError, StockUpdate};

const SELECT_COLUMNS: &str =
    "id, name, sku, image, base_price_cents, b2b_price_cents, b2b_minimum_order, stock";

/// PostgreSQL-backed catalog over the `products` table.
///
/// Stock changes are single conditional statements; the row lock taken by
/// `UPDATE` serializes concurrent decrements of the same product.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts a product or overwrites an existing one, stock included.
    pub async fn upsert_product(&self, product: &ProductSnapshot) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, sku, image, base_price_cents, b2b_price_cents, b2b_minimum_order, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                sku = EXCLUDED.sku,
                image = EXCLUDED.image,
                base_price_cents = EXCLUDED.base_price_cents,
                b2b_price_cents = EXCLUDED.b2b_price_cents,
                b2b_minimum_order = EXCLUDED.b2b_minimum_order,
                stock = EXCLUDED.stock,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.image)
        .bind(product.base_price.cents())
        .bind(product.b2b_price.cents())
        .bind(i32::try_from(product.b2b_minimum_order).unwrap_or(i32::MAX))
        .bind(i64::from(product.stock))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<ProductSnapshot, CatalogError> {
        let minimum: i32 = row.try_get("b2b_minimum_order")?;
        Ok(ProductSnapshot {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            image: row.try_get("image")?,
            base_price: Money::from_cents(row.try_get("base_price_cents")?),
            b2b_price: Money::from_cents(row.try_get("b2b_price_cents")?),
            b2b_minimum_order: u32::try_from(minimum).unwrap_or(1),
            stock: stock_from_column(row.try_get("stock")?),
        })
    }
}

// The table's CHECK constraint keeps stock non-negative.
fn stock_from_column(stock: i64) -> u32 {
    u32::try_from(stock.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl Catalog for PostgresCatalog {
    #[tracing::instrument(skip(self))]
    async fn get_product(&self, id: &ProductId) -> Result<Option<ProductSnapshot>, CatalogError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_product).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockUpdate, CatalogError> {
        let remaining: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2 RETURNING stock",
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(StockUpdate::Applied {
                remaining: stock_from_column(remaining),
            });
        }

        // Nothing was updated: either the product is gone or stock was short.
        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match available {
            Some(available) => Ok(StockUpdate::Insufficient {
                available: stock_from_column(available),
            }),
            None => Err(CatalogError::NotFound(id.clone())),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<(), CatalogError> {
        let updated = sqlx::query(
            "UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id.clone()));
        }
        Ok(())
    }
}
