use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Key/value state carried by one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData(BTreeMap<String, Value>);

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub data: SessionData,
    pub expiry: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, reference: DateTime<Utc>) -> bool {
        reference >= self.expiry
    }
}

/// Token-keyed session persistence.
///
/// An expired record must read exactly like a missing one.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, token: &str) -> Result<Option<SessionRecord>>;

    /// Inserts or replaces the record for `token`.
    async fn save(&self, token: &str, data: &SessionData, expiry: DateTime<Utc>) -> Result<()>;

    /// Returns whether a live record was removed.
    async fn delete(&self, token: &str) -> Result<bool>;

    /// Physically removes expired records, returning how many went.
    async fn cleanup_expired(&self) -> Result<usize>;
}
