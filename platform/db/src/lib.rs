//! Database primitives: connection settings, connect, and the SeaORM-backed
//! [`DealStore`](products_crm::DealStore).

use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use serde::Deserialize;
use thiserror::Error;

mod store;

pub use store::SeaOrmDealStore;

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing")]
    MissingUrl,
    #[error("database connection failed: {0}")]
    Connect(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self::new(default_url_key())
    }
}

impl DatabaseSettings {
    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
            url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Reads `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`. A malformed
    /// connection count falls back to the default.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.url = std::env::var(&settings.env_key).ok();
        if let Some(max) = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|max| *max > 0)
        {
            settings.max_connections = max;
        }
        settings
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn database_url(&self) -> DbResult<String> {
        match &self.url {
            Some(url) if !url.trim().is_empty() => Ok(url.clone()),
            Some(_) => Err(DbError::MissingUrl),
            None => std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl),
        }
    }

    pub async fn connect(&self) -> DbResult<DbPool> {
        let url = self.database_url()?;
        // Every pooled connection to `sqlite::memory:` opens its own database.
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            self.max_connections
        };
        let mut options = ConnectOptions::new(url);
        options
            .max_connections(max_connections)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);
        let pool = Database::connect(options).await?;
        tracing::debug!(max_connections, "database connected");
        Ok(pool)
    }
}

/// Round-trips a trivial query; used by the health endpoint.
pub async fn ping(db: &DbPool) -> DbResult<()> {
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(backend, "SELECT 1".to_owned()))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_url_wins_over_env() {
        let settings = DatabaseSettings::new("PIPELINE_TEST_UNSET_URL").with_url("sqlite::memory:");
        assert_eq!(settings.database_url().unwrap(), "sqlite::memory:");
    }

    #[test]
    fn blank_url_is_missing() {
        let settings = DatabaseSettings::new("PIPELINE_TEST_UNSET_URL").with_url("  ");
        assert!(matches!(settings.database_url(), Err(DbError::MissingUrl)));
        let unset = DatabaseSettings::new("PIPELINE_TEST_UNSET_URL");
        assert!(matches!(unset.database_url(), Err(DbError::MissingUrl)));
    }

    #[tokio::test]
    async fn connects_and_pings_sqlite() {
        let db = DatabaseSettings::default()
            .with_url("sqlite::memory:")
            .connect()
            .await
            .unwrap();
        ping(&db).await.unwrap();
    }
}
