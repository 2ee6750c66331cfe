//! Shared application state for all routes. Built once at startup and torn down on shutdown.

use crate::cache::{self, CacheStore};
use crate::config::Settings;
use crate::error::AppError;
use crate::model::EntitySchema;
use crate::store;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub cache: Arc<dyn CacheStore>,
    pub settings: Arc<Settings>,
    /// Every entity exposed over REST; `/reset/` and startup DDL walk this list.
    pub schemas: Arc<[&'static EntitySchema]>,
}

impl AppState {
    /// Connect the store, ensure tables exist and open the configured cache backend.
    pub async fn open(
        settings: Settings,
        schemas: Vec<&'static EntitySchema>,
    ) -> Result<Self, AppError> {
        let pool = store::connect(&settings.database_url).await?;
        store::create_all(&pool, &schemas).await?;
        let cache = cache::open(&settings).await?;
        Ok(AppState {
            pool,
            cache,
            settings: Arc::new(settings),
            schemas: schemas.into(),
        })
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("store closed");
    }
}
