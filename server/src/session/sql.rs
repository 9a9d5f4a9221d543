use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::store::{SessionData, SessionRecord, SessionStore};
use crate::db::{bounded, models::from_millis, DbContext};
use crate::error::Result;

/// Session store backed by the `sessions` table.
#[derive(Clone)]
pub struct SqlSessionStore {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqlSessionStore {
    pub fn new(db: &DbContext) -> Self {
        Self {
            pool: db.pool().clone(),
            timeout: db.timeout(),
        }
    }
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    async fn load(&self, token: &str) -> Result<Option<SessionRecord>> {
        let row: Option<(Vec<u8>, i64)> = bounded(
            self.timeout,
            sqlx::query_as("SELECT data, expiry FROM sessions WHERE token = ? AND expiry > ?")
                .bind(token)
                .bind(Utc::now().timestamp_millis())
                .fetch_optional(&self.pool),
        )
        .await?;

        match row {
            Some((data, expiry)) => Ok(Some(SessionRecord {
                data: SessionData::from_bytes(&data)?,
                expiry: from_millis(expiry),
            })),
            None => Ok(None),
        }
    }

    async fn save(&self, token: &str, data: &SessionData, expiry: DateTime<Utc>) -> Result<()> {
        let bytes = data.to_bytes()?;
        bounded(
            self.timeout,
            sqlx::query(
                "INSERT INTO sessions (token, data, expiry) VALUES (?, ?, ?)
                 ON CONFLICT(token) DO UPDATE SET data = excluded.data, expiry = excluded.expiry",
            )
            .bind(token)
            .bind(bytes)
            .bind(expiry.timestamp_millis())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<bool> {
        let result = bounded(
            self.timeout,
            sqlx::query("DELETE FROM sessions WHERE token = ? AND expiry > ?")
                .bind(token)
                .bind(Utc::now().timestamp_millis())
                .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let result = bounded(
            self.timeout,
            sqlx::query("DELETE FROM sessions WHERE expiry <= ?")
                .bind(Utc::now().timestamp_millis())
                .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() as usize)
    }
}
