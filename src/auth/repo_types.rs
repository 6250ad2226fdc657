use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,              // unique, stored lowercased
    #[serde(skip_serializing)]
    pub password_hash: String,      // Argon2 PHC string, never exposed
    pub created_at: OffsetDateTime,
}

/// Insert payload for [`User`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Issued bearer token. The id travels as the JWT `jti` claim.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuthToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub revoked: bool,
    pub revoked_at: Option<OffsetDateTime>,
}
