use std::sync::Arc;

use crate::auth::repo::{PgTokenRepo, PgUserRepo, TokenRepo, UserRepo};
use crate::config::{AppConfig, StorageBackend};
use crate::memory::{InMemoryProducts, InMemoryTokens, InMemoryUsers};
use crate::products::repo::{PgProductRepo, ProductRepo};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub tokens: Arc<dyn TokenRepo>,
    pub products: Arc<dyn ProductRepo>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        match config.storage {
            StorageBackend::Postgres => {
                let db = crate::db::connect(&config).await?;
                Ok(Self {
                    users: Arc::new(PgUserRepo::new(db.clone())),
                    tokens: Arc::new(PgTokenRepo::new(db.clone())),
                    products: Arc::new(PgProductRepo::new(db)),
                    config,
                })
            }
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage; data is lost on restart");
                Ok(Self::in_memory(config))
            }
        }
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            users: Arc::new(InMemoryUsers::default()),
            tokens: Arc::new(InMemoryTokens::default()),
            products: Arc::new(InMemoryProducts::default()),
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            storage: StorageBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
        });
        Self::in_memory(config)
    }
}
