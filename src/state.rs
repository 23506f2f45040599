use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};
use tokio::task;

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    storage::ObjectStorage,
};

pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Shared by every handler and the worker. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        jwt: JwtService,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            storage,
            jwt,
        }
    }

    pub fn db(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }

    /// Runs `f` with a pooled connection on the blocking thread pool.
    pub async fn with_db<F, T, E>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<AppError>,
    {
        let state = self.clone();
        task::spawn_blocking(move || -> AppResult<T> {
            let mut conn = state.db()?;
            f(&mut conn).map_err(Into::into)
        })
        .await
        .map_err(|err| AppError::internal(format!("database task failed: {err}")))?
    }
}
