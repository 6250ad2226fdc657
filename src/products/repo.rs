use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::products::repo_types::{NewProduct, Product, ProductChanges};

#[async_trait]
pub trait ProductRepo: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<Product>>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Product>>;
    async fn create(&self, product: NewProduct) -> anyhow::Result<Product>;
    /// `None` if the row no longer exists.
    async fn update(&self, id: Uuid, changes: ProductChanges) -> anyhow::Result<Option<Product>>;
    /// Returns `true` if a row was removed.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgProductRepo {
    db: PgPool,
}

impl PgProductRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepo for PgProductRepo {
    async fn list(&self) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category, price, stock, created_at, updated_at
            FROM products
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category, price, stock, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create(&self, product: NewProduct) -> anyhow::Result<Product> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, category, price, stock)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, category, price, stock, created_at, updated_at
            "#,
        )
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.stock)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, changes: ProductChanges) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
               SET name = $2,
                   category = $3,
                   price = $4,
                   stock = COALESCE($5, stock),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, category, price, stock, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.category)
        .bind(changes.price)
        .bind(changes.stock)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
