use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use super::store::{SessionData, SessionRecord, SessionStore};
use crate::error::Result;

/// Process-local session store. Records vanish on restart.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    // token -> record
    sessions: Arc<DashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_session_count(&self) -> usize {
        let now = Utc::now();
        self.sessions
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, token: &str) -> Result<Option<SessionRecord>> {
        let now = Utc::now();
        let session = match self.sessions.get(token) {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired(now) {
            drop(session);
            self.sessions
                .remove_if(token, |_, session| session.is_expired(now));
            return Ok(None);
        }

        Ok(Some(session.clone()))
    }

    async fn save(&self, token: &str, data: &SessionData, expiry: DateTime<Utc>) -> Result<()> {
        self.sessions.insert(
            token.to_string(),
            SessionRecord {
                data: data.clone(),
                expiry,
            },
        );
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<bool> {
        Ok(self
            .sessions
            .remove(token)
            .map(|(_, session)| !session.is_expired(Utc::now()))
            .unwrap_or(false))
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;

        self.sessions.retain(|_, session| {
            if session.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        Ok(removed)
    }
}
