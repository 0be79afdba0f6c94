//! Audit log repository

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use sqlx::SqlitePool;

use crate::models::{parse_timestamp, AuditEvent, AuditLogEntry};

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: String,
    time: String,
    description: String,
    event: String,
    category: String,
    performed_by: String,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = anyhow::Error;

    fn try_from(row: AuditRow) -> Result<Self> {
        let time = parse_timestamp(&row.time)
            .with_context(|| format!("Invalid time on audit entry {}: {}", row.id, row.time))?;
        let event = row
            .event
            .parse::<AuditEvent>()
            .map_err(anyhow::Error::msg)?;

        Ok(AuditLogEntry {
            id: row.id,
            time,
            description: row.description,
            event,
            category: row.category,
            performed_by: row.performed_by,
        })
    }
}

pub struct AuditRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &AuditLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, time, description, event, category, performed_by)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.time.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(&entry.description)
        .bind(entry.event.as_str())
        .bind(&entry.category)
        .bind(&entry.performed_by)
        .execute(self.pool)
        .await
        .context("Failed to insert audit log entry")?;

        Ok(())
    }

    /// Newest first
    pub async fn list(&self) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, time, description, event, category, performed_by
            FROM audit_logs
            ORDER BY time DESC, rowid ASC
            "#,
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list audit log entries")?;

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }
}
