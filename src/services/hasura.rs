//! Hasura GraphQL client
//!
//! Implements [`Backend`] over the Hasura schema the dashboard was built on:
//! `Users`, `audit_logs`, `tenants` and `tenant_data_usage_daily`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::HasuraConfig;
use crate::models::{
    deserialize_opaque_id, AuditLogEntry, NewUser, Tenant, TenantUsageRecord, User,
};
use crate::services::Backend;

const ADMIN_SECRET_HEADER: &str = "x-hasura-admin-secret";

const AUDIT_LOGS_QUERY: &str = r#"
query GetAuditLogs {
  audit_logs(order_by: {time: desc}) {
    id
    time
    description
    event
    category
    performed_by
  }
}"#;

const TENANTS_QUERY: &str = r#"
query GetTenants {
  tenants(order_by: {id: desc}) {
    id
    name
    data_usage_gb
  }
}"#;

const PING_QUERY: &str = "query Ping { __typename }";

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

/// `Users` row; the hash column is called `password` in this schema
#[derive(Deserialize)]
struct UserRow {
    #[serde(deserialize_with = "deserialize_opaque_id")]
    id: String,
    username: String,
    email: String,
    #[serde(default)]
    password: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct UsersData {
    #[serde(rename = "Users")]
    users: Vec<UserRow>,
}

#[derive(Deserialize)]
struct InsertUsersData {
    #[serde(rename = "insert_Users")]
    insert_users: Option<Returning<UserRow>>,
}

#[derive(Deserialize)]
struct Returning<T> {
    returning: Vec<T>,
}

#[derive(Deserialize)]
struct UpdateUserData {
    #[serde(rename = "update_Users_by_pk")]
    update_users_by_pk: Option<Value>,
}

#[derive(Deserialize)]
struct AuditLogsData {
    audit_logs: Vec<AuditLogEntry>,
}

#[derive(Deserialize)]
struct TenantsData {
    tenants: Vec<Tenant>,
}

#[derive(Deserialize)]
struct UsageData {
    tenant_data_usage_daily: Vec<TenantUsageRecord>,
}

/// Escape `%`, `_` and `\` so user input matches literally in `_ilike`
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Hasura GraphQL client
pub struct HasuraClient {
    client: Client,
    endpoint: String,
    admin_secret: Option<String>,
    user_id_type: String,
    tenant_id_type: String,
}

impl HasuraClient {
    pub fn new(config: &HasuraConfig) -> Result<Self> {
        info!("Initializing Hasura client for {}", config.url);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.url.clone(),
            admin_secret: config.admin_secret.clone(),
            user_id_type: config.user_id_type.clone(),
            tenant_id_type: config.tenant_id_type.clone(),
        })
    }

    /// Integer-typed ids must travel as JSON numbers
    fn id_value(id: &str, graphql_type: &str) -> Value {
        if graphql_type == "Int" {
            if let Ok(n) = id.parse::<i64>() {
                return json!(n);
            }
        }
        json!(id)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T> {
        debug!(operation, "Hasura: sending GraphQL request");

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&GraphQlRequest { query, variables });
        if let Some(ref secret) = self.admin_secret {
            request = request.header(ADMIN_SECRET_HEADER, secret);
        }

        let response = request.send().await.map_err(|e| {
            error!(
                operation,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "Hasura: HTTP request failed: {}",
                e
            );
            e
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Hasura response body")?;

        if !status.is_success() {
            anyhow::bail!("Hasura {} returned HTTP {}: {}", operation, status, body);
        }

        let parsed: GraphQlResponse<T> = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse Hasura {} response", operation))?;

        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
            anyhow::bail!("Hasura {} failed: {}", operation, messages.join("; "));
        }

        parsed
            .data
            .with_context(|| format!("Hasura {} response has no data", operation))
    }
}

#[async_trait]
impl Backend for HasuraClient {
    fn name(&self) -> &'static str {
        "hasura"
    }

    async fn ping(&self) -> Result<()> {
        self.execute::<Value>("Ping", PING_QUERY, json!({})).await?;
        Ok(())
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        let query = r#"
query GetUserByEmail($email: String!) {
  Users(where: {email: {_ilike: $email}}) {
    id
    username
    email
    password
  }
}"#;
        let data: UsersData = self
            .execute("GetUserByEmail", query, json!({ "email": escape_like(email) }))
            .await?;
        Ok(data.users.into_iter().map(User::from).collect())
    }

    async fn insert_user(&self, user: &NewUser) -> Result<User> {
        let query = r#"
mutation InsertUser($username: String!, $email: String!, $password: String!) {
  insert_Users(objects: {username: $username, email: $email, password: $password}) {
    returning {
      id
      username
      email
    }
  }
}"#;
        let data: InsertUsersData = self
            .execute(
                "InsertUser",
                query,
                json!({
                    "username": user.username,
                    "email": user.email,
                    "password": user.password_hash,
                }),
            )
            .await?;

        let row = data
            .insert_users
            .and_then(|r| r.returning.into_iter().next())
            .context("Hasura insert_Users returned no row")?;

        Ok(User {
            password_hash: user.password_hash.clone(),
            ..User::from(row)
        })
    }

    async fn update_password(&self, user_id: &str, password_hash: &str) -> Result<bool> {
        let query = format!(
            r#"
mutation UpdatePassword($id: {}!, $password: String!) {{
  update_Users_by_pk(pk_columns: {{id: $id}}, _set: {{password: $password}}) {{
    id
  }}
}}"#,
            self.user_id_type
        );
        let data: UpdateUserData = self
            .execute(
                "UpdatePassword",
                &query,
                json!({
                    "id": Self::id_value(user_id, &self.user_id_type),
                    "password": password_hash,
                }),
            )
            .await?;
        Ok(data.update_users_by_pk.is_some_and(|v| !v.is_null()))
    }

    async fn list_audit_logs(&self) -> Result<Vec<AuditLogEntry>> {
        let data: AuditLogsData = self
            .execute("GetAuditLogs", AUDIT_LOGS_QUERY, json!({}))
            .await?;
        Ok(data.audit_logs)
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let data: TenantsData = self
            .execute("GetTenants", TENANTS_QUERY, json!({}))
            .await?;
        Ok(data.tenants)
    }

    async fn list_tenant_usage(&self, tenant_id: &str) -> Result<Vec<TenantUsageRecord>> {
        let query = format!(
            r#"
query GetTenantUsage($tenantId: {}!) {{
  tenant_data_usage_daily(where: {{tenant_id: {{_eq: $tenantId}}}}, order_by: {{usage_date: desc}}) {{
    usage_date
    data_usage_gb
  }}
}}"#,
            self.tenant_id_type
        );
        let data: UsageData = self
            .execute(
                "GetTenantUsage",
                &query,
                json!({ "tenantId": Self::id_value(tenant_id, &self.tenant_id_type) }),
            )
            .await?;
        Ok(data.tenant_data_usage_daily)
    }
}
