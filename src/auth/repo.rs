use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{AuthToken, NewUser, User};

/// Returned (inside `anyhow::Error`) when an insert collides with an
/// existing email.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct EmailTaken;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Fails with [`EmailTaken`] when the email is already in use.
    async fn create(&self, user: NewUser) -> anyhow::Result<User>;
}

#[async_trait]
pub trait TokenRepo: Send + Sync {
    async fn issue(&self, user_id: Uuid) -> anyhow::Result<AuthToken>;
    /// Token by id, only if it has not been revoked.
    async fn find_active(&self, id: Uuid) -> anyhow::Result<Option<AuthToken>>;
    /// Returns `true` if a live token was revoked by this call.
    async fn revoke(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await;

        match created {
            Ok(u) => Ok(u),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(EmailTaken.into()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Clone)]
pub struct PgTokenRepo {
    db: PgPool,
}

impl PgTokenRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenRepo for PgTokenRepo {
    async fn issue(&self, user_id: Uuid) -> anyhow::Result<AuthToken> {
        let token = sqlx::query_as::<_, AuthToken>(
            r#"
            INSERT INTO auth_tokens (id, user_id)
            VALUES ($1, $2)
            RETURNING id, user_id, created_at, revoked, revoked_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(token)
    }

    async fn find_active(&self, id: Uuid) -> anyhow::Result<Option<AuthToken>> {
        let token = sqlx::query_as::<_, AuthToken>(
            r#"
            SELECT id, user_id, created_at, revoked, revoked_at
            FROM auth_tokens
            WHERE id = $1 AND NOT revoked
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(token)
    }

    async fn revoke(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE auth_tokens
               SET revoked = TRUE, revoked_at = now()
             WHERE id = $1 AND NOT revoked
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
