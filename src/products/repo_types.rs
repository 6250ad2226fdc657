use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub price: i64,
    pub stock: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub price: i64,
    pub stock: bool,
}

/// Full replacement of the validated fields. `stock: None` keeps the
/// stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductChanges {
    pub name: String,
    pub category: String,
    pub price: i64,
    pub stock: Option<bool>,
}
