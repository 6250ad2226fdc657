use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::products::repo_types::Product;

/// Client-facing view of a [`Product`].
#[derive(Debug, Serialize)]
pub struct ProductResource {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub price: i64,
    pub stock: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Product> for ProductResource {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            category: p.category,
            price: p.price,
            stock: p.stock,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}
