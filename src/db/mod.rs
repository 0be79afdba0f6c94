//! Database layer
//!
//! A local SQLite store with the same four tables the Hasura deployment
//! exposes. It backs development setups and the test suite.

pub mod audit_repository;
pub mod tenant_repository;
pub mod user_repository;

pub use audit_repository::AuditRepository;
pub use tenant_repository::TenantRepository;
pub use user_repository::UserRepository;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::models::{AuditLogEntry, NewUser, Tenant, TenantUsageRecord, User};
use crate::services::Backend;

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool and run migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid database URL: {}", config.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    // Every connection to `:memory:` is a separate database, so keep exactly one alive
    let in_memory = config.url.contains(":memory:");
    let mut pool_options = SqlitePoolOptions::new()
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));
    pool_options = if in_memory {
        pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// [`Backend`] over the local SQLite store
#[derive(Clone)]
pub struct SqliteBackend {
    pool: DbPool,
}

impl SqliteBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        UserRepository::new(&self.pool).find_by_email(email).await
    }

    async fn insert_user(&self, user: &NewUser) -> Result<User> {
        UserRepository::new(&self.pool).insert(user).await
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> Result<bool> {
        UserRepository::new(&self.pool)
            .update_password(user_id, password_hash)
            .await
    }

    async fn list_audit_logs(&self) -> Result<Vec<AuditLogEntry>> {
        AuditRepository::new(&self.pool).list().await
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        TenantRepository::new(&self.pool).list().await
    }

    async fn list_tenant_usage(&self, tenant_id: &str) -> Result<Vec<TenantUsageRecord>> {
        TenantRepository::new(&self.pool).list_usage(tenant_id).await
    }
}
