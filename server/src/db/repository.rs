use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::SqlitePool;

use super::bounded;
use super::models::{Snippet, SnippetRow, User, UserRow};
use crate::auth::CredentialVerifier;
use crate::error::{AppError, Result};

pub const DEFAULT_LATEST_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct SnippetRepository {
    pool: SqlitePool,
    timeout: Duration,
}

impl SnippetRepository {
    pub(crate) fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub async fn insert(&self, title: &str, content: &str, retention_days: i64) -> Result<i64> {
        self.insert_at(title, content, retention_days, Utc::now())
            .await
    }

    /// Inserts with `created = now` and `expires = now + retention_days`.
    pub async fn insert_at(
        &self,
        title: &str,
        content: &str,
        retention_days: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        if retention_days <= 0 {
            return Err(AppError::Validation(format!(
                "retention period must be a positive number of days, got {}",
                retention_days
            )));
        }

        let expires = TimeDelta::try_days(retention_days)
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "retention period of {} days is too long",
                    retention_days
                ))
            })?;

        let result = bounded(
            self.timeout,
            sqlx::query(
                "INSERT INTO snippets (title, content, created, expires) VALUES (?, ?, ?, ?)",
            )
            .bind(title)
            .bind(content)
            .bind(now.timestamp_millis())
            .bind(expires.timestamp_millis())
            .execute(&self.pool),
        )
        .await?;

        let id = result.last_insert_rowid();
        log::debug!("Inserted snippet {} expiring at {}", id, expires);
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Snippet> {
        self.get_at(id, Utc::now()).await
    }

    /// Fails with `NotFound` for unknown ids and for rows that expired at or
    /// before `now`, whether or not they are still stored.
    pub async fn get_at(&self, id: i64, now: DateTime<Utc>) -> Result<Snippet> {
        let row: Option<SnippetRow> = bounded(
            self.timeout,
            sqlx::query_as(
                "SELECT id, title, content, created, expires FROM snippets
                 WHERE id = ? AND expires > ?",
            )
            .bind(id)
            .bind(now.timestamp_millis())
            .fetch_optional(&self.pool),
        )
        .await?;

        row.map(Snippet::from).ok_or(AppError::NotFound)
    }

    pub async fn latest(&self, limit: i64) -> Result<Vec<Snippet>> {
        self.latest_at(limit, Utc::now()).await
    }

    /// Up to `limit` live snippets, newest id first.
    pub async fn latest_at(&self, limit: i64, now: DateTime<Utc>) -> Result<Vec<Snippet>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<SnippetRow> = bounded(
            self.timeout,
            sqlx::query_as(
                "SELECT id, title, content, created, expires FROM snippets
                 WHERE expires > ? ORDER BY id DESC LIMIT ?",
            )
            .bind(now.timestamp_millis())
            .bind(limit)
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.into_iter().map(Snippet::from).collect())
    }
}

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    timeout: Duration,
    password_cost: u32,
    dummy_hash: Arc<OnceLock<String>>,
}

impl UserRepository {
    pub(crate) fn new(
        pool: SqlitePool,
        timeout: Duration,
        password_cost: u32,
        dummy_hash: Arc<OnceLock<String>>,
    ) -> Self {
        Self {
            pool,
            timeout,
            password_cost,
            dummy_hash,
        }
    }

    pub async fn insert(&self, name: &str, email: &str, password: &str) -> Result<i64> {
        let hashed_password = bcrypt::hash(password, self.password_cost)?;

        let result = bounded(
            self.timeout,
            sqlx::query(
                "INSERT INTO users (name, email, hashed_password, created) VALUES (?, ?, ?, ?)",
            )
            .bind(name)
            .bind(email)
            .bind(&hashed_password)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool),
        )
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(AppError::Database(sqlx::Error::Database(db_err)))
                if db_err.is_unique_violation() =>
            {
                Err(AppError::DuplicateEmail)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        let count: i64 = bounded(
            self.timeout,
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool),
        )
        .await?;

        Ok(count > 0)
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        let row: Option<UserRow> = bounded(
            self.timeout,
            sqlx::query_as(
                "SELECT id, name, email, hashed_password, created FROM users WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.map(User::from).ok_or(AppError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = bounded(
            self.timeout,
            sqlx::query_as(
                "SELECT id, name, email, hashed_password, created FROM users WHERE email = ?",
            )
            .bind(email)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(User::from))
    }

    pub async fn update_password(
        &self,
        id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let user = self.get(id).await?;
        if !user.verify_password(current_password)? {
            return Err(AppError::InvalidCredentials);
        }

        let hashed_password = bcrypt::hash(new_password, self.password_cost)?;
        bounded(
            self.timeout,
            sqlx::query("UPDATE users SET hashed_password = ? WHERE id = ?")
                .bind(&hashed_password)
                .bind(id)
                .execute(&self.pool),
        )
        .await?;

        log::info!("Password updated for user {}", id);
        Ok(())
    }

    fn dummy_hash(&self) -> &str {
        self.dummy_hash.get_or_init(|| {
            bcrypt::hash("snipper-timing-guard", self.password_cost).unwrap_or_default()
        })
    }
}

#[async_trait]
impl CredentialVerifier for UserRepository {
    async fn verify(&self, email: &str, password: &str) -> Result<Option<i64>> {
        match self.find_by_email(email).await? {
            Some(user) => {
                if user.verify_password(password)? {
                    Ok(Some(user.id))
                } else {
                    Ok(None)
                }
            }
            None => {
                // Same bcrypt work as a real mismatch; the outcome is ignored.
                let _ = bcrypt::verify(password, self.dummy_hash());
                Ok(None)
            }
        }
    }
}
