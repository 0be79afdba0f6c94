//! User repository
//!
//! Emails are stored normalized (trimmed, Unicode-lowercased) and matched
//! exactly; SQLite's `lower()` only folds ASCII.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{NewUser, User};
use crate::utils::validation::normalize_credential;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
        }
    }
}

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash FROM users WHERE email = ?",
        )
        .bind(normalize_credential(email))
        .fetch_all(self.pool)
        .await
        .context("Failed to look up users by email")?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    pub async fn insert(&self, user: &NewUser) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let email = normalize_credential(&user.email);
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&user.username)
        .bind(&email)
        .bind(&user.password_hash)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .context("Failed to insert user")?;

        Ok(User {
            id,
            username: user.username.clone(),
            email,
            password_hash: user.password_hash.clone(),
        })
    }

    pub async fn update_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(self.pool)
            .await
            .context("Failed to update password")?;

        Ok(result.rows_affected() > 0)
    }
}
