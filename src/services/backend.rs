//! Data backend abstraction
//!
//! The console reads and writes through one trait so the same handlers run
//! against the production Hasura GraphQL engine or a local SQLite store.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AuditLogEntry, NewUser, Tenant, TenantUsageRecord, User};

#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name for logs and the readiness probe
    fn name(&self) -> &'static str;

    /// Cheap round trip proving the backend answers
    async fn ping(&self) -> Result<()>;

    /// Accounts whose email equals `email`, ignoring case
    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>>;

    async fn insert_user(&self, user: &NewUser) -> Result<User>;

    /// Replace the stored hash; `false` when no account has that id
    async fn update_password(&self, user_id: &str, password_hash: &str) -> Result<bool>;

    /// Every audit entry, newest first
    async fn list_audit_logs(&self) -> Result<Vec<AuditLogEntry>>;

    /// Every tenant, highest id first
    async fn list_tenants(&self) -> Result<Vec<Tenant>>;

    /// Daily usage of one tenant, newest first
    async fn list_tenant_usage(&self, tenant_id: &str) -> Result<Vec<TenantUsageRecord>>;
}
