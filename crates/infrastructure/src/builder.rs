use std::sync::Arc;

use application::PasswordHasher;
use thiserror::Error;

use crate::{
    password::BcryptPasswordHasher,
    repository::{apply_schema, create_sqlite_pool, SqliteStorage},
};

#[derive(Debug, Clone)]
pub struct InfrastructureConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bcrypt_cost: Option<u32>,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://rooms.db?mode=rwc".to_string(),
            max_connections: 5,
            bcrypt_cost: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct Infrastructure {
    pub storage: Arc<SqliteStorage>,
    pub password_hasher: Arc<BcryptPasswordHasher>,
}

impl Infrastructure {
    pub async fn connect(config: InfrastructureConfig) -> Result<Self, InfrastructureError> {
        let pool = create_sqlite_pool(&config.database_url, config.max_connections).await?;
        apply_schema(&pool).await?;

        tracing::info!(max_connections = config.max_connections, "SQLite 存储就绪");

        let storage = Arc::new(SqliteStorage::new(pool));
        let password_hasher = Arc::new(BcryptPasswordHasher::new(config.bcrypt_cost));

        Ok(Self {
            storage,
            password_hasher,
        })
    }

    pub fn password_hasher_trait(&self) -> Arc<dyn PasswordHasher> {
        self.password_hasher.clone()
    }
}
