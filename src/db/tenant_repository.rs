//! Tenant and daily usage repository

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::models::{Tenant, TenantUsageRecord};

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: String,
    name: String,
    data_usage_gb: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    usage_date: String,
    data_usage_gb: f64,
}

pub struct TenantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TenantRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, tenant: &Tenant) -> Result<()> {
        sqlx::query("INSERT INTO tenants (id, name, data_usage_gb) VALUES (?, ?, ?)")
            .bind(&tenant.id)
            .bind(&tenant.name)
            .bind(tenant.data_usage_gb)
            .execute(self.pool)
            .await
            .context("Failed to insert tenant")?;
        Ok(())
    }

    /// Highest id first
    pub async fn list(&self) -> Result<Vec<Tenant>> {
        let rows = sqlx::query_as::<_, TenantRow>(
            "SELECT id, name, data_usage_gb FROM tenants ORDER BY id DESC",
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list tenants")?;

        Ok(rows
            .into_iter()
            .map(|row| Tenant {
                id: row.id,
                name: row.name,
                data_usage_gb: row.data_usage_gb,
            })
            .collect())
    }

    pub async fn insert_usage(&self, tenant_id: &str, record: &TenantUsageRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO tenant_data_usage_daily (tenant_id, usage_date, data_usage_gb) VALUES (?, ?, ?)",
        )
        .bind(tenant_id)
        .bind(record.usage_date.format("%Y-%m-%d").to_string())
        .bind(record.data_usage_gb)
        .execute(self.pool)
        .await
        .context("Failed to insert tenant usage")?;
        Ok(())
    }

    /// Newest first
    pub async fn list_usage(&self, tenant_id: &str) -> Result<Vec<TenantUsageRecord>> {
        let rows = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT usage_date, data_usage_gb
            FROM tenant_data_usage_daily
            WHERE tenant_id = ?
            ORDER BY usage_date DESC, id ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(self.pool)
        .await
        .context("Failed to list tenant usage")?;

        rows.into_iter()
            .map(|row| {
                let usage_date = NaiveDate::parse_from_str(&row.usage_date, "%Y-%m-%d")
                    .with_context(|| format!("Invalid usage date: {}", row.usage_date))?;
                Ok(TenantUsageRecord::new(usage_date, row.data_usage_gb))
            })
            .collect()
    }
}
