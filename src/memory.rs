//! In-memory persistence for tests and `STORAGE_BACKEND=memory`.
//!
//! Each store guards its rows with a `RwLock`; every trait method takes the
//! lock once, so single operations are atomic just like a single SQL
//! statement.

use std::sync::RwLock;

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        repo::{EmailTaken, TokenRepo, UserRepo},
        repo_types::{AuthToken, NewUser, User},
    },
    products::{
        repo::ProductRepo,
        repo_types::{NewProduct, Product, ProductChanges},
    },
};

fn poisoned<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("lock poisoned: {e}")
}

#[derive(Default)]
pub struct InMemoryUsers {
    rows: RwLock<Vec<User>>,
}

#[async_trait]
impl UserRepo for InMemoryUsers {
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.iter().find(|u| u.email == email).cloned())
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        if rows.iter().any(|u| u.email == user.email) {
            return Err(EmailTaken.into());
        }
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(created.clone());
        Ok(created)
    }
}

#[derive(Default)]
pub struct InMemoryTokens {
    rows: RwLock<Vec<AuthToken>>,
}

impl InMemoryTokens {
    /// Number of token rows ever issued, revoked ones included.
    #[cfg(test)]
    pub fn issued(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or_default()
    }
}

#[async_trait]
impl TokenRepo for InMemoryTokens {
    async fn issue(&self, user_id: Uuid) -> anyhow::Result<AuthToken> {
        let token = AuthToken {
            id: Uuid::new_v4(),
            user_id,
            created_at: OffsetDateTime::now_utc(),
            revoked: false,
            revoked_at: None,
        };
        self.rows.write().map_err(poisoned)?.push(token.clone());
        Ok(token)
    }

    async fn find_active(&self, id: Uuid) -> anyhow::Result<Option<AuthToken>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.iter().find(|t| t.id == id && !t.revoked).cloned())
    }

    async fn revoke(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        match rows.iter_mut().find(|t| t.id == id && !t.revoked) {
            Some(t) => {
                t.revoked = true;
                t.revoked_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Keeps insertion order so listings are stable.
#[derive(Default)]
pub struct InMemoryProducts {
    rows: RwLock<Vec<Product>>,
}

#[async_trait]
impl ProductRepo for InMemoryProducts {
    async fn list(&self) -> anyhow::Result<Vec<Product>> {
        Ok(self.rows.read().map_err(poisoned)?.clone())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Product>> {
        let rows = self.rows.read().map_err(poisoned)?;
        Ok(rows.iter().find(|p| p.id == id).cloned())
    }

    async fn create(&self, product: NewProduct) -> anyhow::Result<Product> {
        let now = OffsetDateTime::now_utc();
        let created = Product {
            id: Uuid::new_v4(),
            name: product.name,
            category: product.category,
            price: product.price,
            stock: product.stock,
            created_at: now,
            updated_at: now,
        };
        self.rows.write().map_err(poisoned)?.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: ProductChanges) -> anyhow::Result<Option<Product>> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let Some(p) = rows.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        p.name = changes.name;
        p.category = changes.category;
        p.price = changes.price;
        if let Some(stock) = changes.stock {
            p.stock = stock;
        }
        p.updated_at = OffsetDateTime::now_utc();
        Ok(Some(p.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let before = rows.len();
        rows.retain(|p| p.id != id);
        Ok(rows.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lamp() -> NewProduct {
        NewProduct {
            name: "Lamp".into(),
            category: "Lighting".into(),
            price: 20,
            stock: true,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let users = InMemoryUsers::default();
        let new = || NewUser {
            name: "Jane".into(),
            email: "jane@example.com".into(),
            password_hash: "x".into(),
        };
        users.create(new()).await.unwrap();
        let err = users.create(new()).await.unwrap_err();
        assert!(err.is::<EmailTaken>());
    }

    #[tokio::test]
    async fn revoke_reports_only_first_call() {
        let tokens = InMemoryTokens::default();
        let t = tokens.issue(Uuid::new_v4()).await.unwrap();
        assert!(tokens.find_active(t.id).await.unwrap().is_some());
        assert!(tokens.revoke(t.id).await.unwrap());
        assert!(!tokens.revoke(t.id).await.unwrap());
        assert!(tokens.find_active(t.id).await.unwrap().is_none());
        assert!(!tokens.revoke(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn product_update_and_delete() {
        let products = InMemoryProducts::default();
        let p = products.create(lamp()).await.unwrap();

        let changes = ProductChanges {
            name: "Desk lamp".into(),
            category: "Lighting".into(),
            price: 25,
            stock: None,
        };
        let updated = products.update(p.id, changes.clone()).await.unwrap().unwrap();
        assert_eq!(updated.price, 25);
        assert!(updated.stock);
        assert!(updated.updated_at >= p.updated_at);

        assert!(products.delete(p.id).await.unwrap());
        assert!(!products.delete(p.id).await.unwrap());
        assert!(products.update(p.id, changes).await.unwrap().is_none());
        assert!(products.list().await.unwrap().is_empty());
    }
}
