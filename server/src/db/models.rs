use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl Snippet {
    pub fn is_expired(&self, reference: DateTime<Utc>) -> bool {
        reference >= self.expires
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub created: DateTime<Utc>,
}

impl User {
    pub fn verify_password(&self, password: &str) -> crate::error::Result<bool> {
        Ok(bcrypt::verify(password, &self.hashed_password)?)
    }
}

// Rows carry timestamps as UTC unix milliseconds.

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SnippetRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: i64,
    pub expires: i64,
}

impl From<SnippetRow> for Snippet {
    fn from(row: SnippetRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            created: from_millis(row.created),
            expires: from_millis(row.expires),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub created: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            hashed_password: row.hashed_password,
            created: from_millis(row.created),
        }
    }
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
