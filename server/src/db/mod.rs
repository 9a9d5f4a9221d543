pub mod models;
pub mod repository;

use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseSettings;
use crate::error::{AppError, Result};

pub use models::{Snippet, User};
pub use repository::{SnippetRepository, UserRepository, DEFAULT_LATEST_LIMIT};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS snippets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        created INTEGER NOT NULL,
        expires INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_snippets_expires ON snippets (expires)",
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        hashed_password TEXT NOT NULL,
        created INTEGER NOT NULL,
        CONSTRAINT users_uc_email UNIQUE (email)
    )",
    "CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        data BLOB NOT NULL,
        expiry INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions (expiry)",
];

#[derive(Clone)]
pub struct DbContext {
    pool: SqlitePool,
    timeout: Duration,
    password_cost: u32,
    // Verified against when an email is unknown so both login failures cost the same.
    dummy_hash: Arc<OnceLock<String>>,
}

impl DbContext {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self {
            pool,
            timeout,
            password_cost: bcrypt::DEFAULT_COST,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let options = SqliteConnectOptions::from_str(&settings.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool, timeout))
    }

    /// Single-connection in-memory database. Every connection to `:memory:`
    /// is its own database, so the pool must never open a second one.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self::new(pool, Duration::from_secs(5)))
    }

    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn snippets(&self) -> SnippetRepository {
        SnippetRepository::new(self.pool.clone(), self.timeout)
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(
            self.pool.clone(),
            self.timeout,
            self.password_cost,
            self.dummy_hash.clone(),
        )
    }

    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            bounded(self.timeout, sqlx::query(statement).execute(&self.pool)).await?;
        }

        log::info!("Database schema ready");
        Ok(())
    }
}

/// Runs one store call under `limit`. The call is dropped, and thereby
/// abandoned, when the limit elapses or the caller's future is dropped.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::Timeout(limit)),
    }
}
