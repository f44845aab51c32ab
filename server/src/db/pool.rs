//! Async connection pool for Diesel PostgreSQL connections.
//!
//! Wraps `diesel-async`'s bb8 integration so the session factory can check
//! out validated connections without blocking the runtime. Checkout failures
//! surface as [`SessionError::Checkout`] so callers see one error surface for
//! the whole session lifecycle.

use std::time::Duration;

use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

use crate::config::{Settings, SettingsError};

use super::SessionError;

/// Sizing and checkout limits for the connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    database_url: String,
    max_size: u32,
    min_idle: Option<u32>,
    connection_timeout: Duration,
}

impl PoolConfig {
    /// Configuration with default limits: 10 connections, 2 kept idle,
    /// 30 second checkout timeout.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_size: 10,
            min_idle: Some(2),
            connection_timeout: Duration::from_secs(30),
        }
    }

    /// Configuration from deployment settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        Ok(Self::new(settings.database_url()?))
    }

    /// Cap the number of pooled connections.
    #[must_use]
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Adjust the checkout timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// The configured database URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

/// Shared PostgreSQL connection pool.
#[derive(Clone)]
pub struct DbPool {
    inner: Pool<AsyncPgConnection>,
}

impl DbPool {
    /// Build the pool.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Build`] when the pool cannot be constructed,
    /// e.g. for an unreachable database.
    pub async fn new(config: PoolConfig) -> Result<Self, SessionError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
        let inner = Pool::builder()
            .max_size(config.max_size)
            .min_idle(config.min_idle)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|err| SessionError::build(err.to_string()))?;
        Ok(Self { inner })
    }

    /// Check out a connection not tied to the pool handle's lifetime, as the
    /// request session owns its connection until the request completes.
    pub(crate) async fn checkout_owned(
        &self,
    ) -> Result<PooledConnection<'static, AsyncPgConnection>, SessionError> {
        self.inner
            .get_owned()
            .await
            .map_err(|err| SessionError::checkout(err.to_string()))
    }
}
