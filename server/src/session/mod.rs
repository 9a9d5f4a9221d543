pub mod manager;
pub mod memory;
pub mod sql;
pub mod store;

use std::cell::RefCell;
use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, Result};

pub use manager::{CookieSettings, SessionManager};
pub use memory::MemorySessionStore;
pub use sql::SqlSessionStore;
pub use store::{SessionData, SessionRecord, SessionStore};

pub const USER_ID_KEY: &str = "authenticatedUserID";
pub const FLASH_KEY: &str = "flash";
pub const REDIRECT_AFTER_LOGIN_KEY: &str = "redirectPathAfterLogin";
pub const CSRF_SEED_KEY: &str = "csrfSeed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unchanged,
    Changed,
    /// Token rotated; the previous token is deleted on commit.
    Renewed,
}

#[derive(Debug)]
struct SessionInner {
    token: Option<String>,
    stale_tokens: Vec<String>,
    data: SessionData,
    status: SessionStatus,
}

/// Per-request view of the session, shared between the session stage and
/// the handler through request extensions.
#[derive(Debug, Clone)]
pub struct Session(Rc<RefCell<SessionInner>>);

impl Session {
    pub(crate) fn new(token: Option<String>, data: SessionData) -> Self {
        Self(Rc::new(RefCell::new(SessionInner {
            token,
            stale_tokens: Vec::new(),
            data,
            status: SessionStatus::Unchanged,
        })))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0.borrow().data.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.borrow().data.contains(key)
    }

    pub fn insert(&self, key: &str, value: impl Into<Value>) {
        let mut inner = self.0.borrow_mut();
        inner.data.insert(key, value);
        inner.mark_changed();
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut inner = self.0.borrow_mut();
        let removed = inner.data.remove(key);
        if removed.is_some() {
            inner.mark_changed();
        }
        removed
    }

    /// Reads and removes `key`; the one-shot read used for flash messages.
    pub fn pop<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key);
        self.remove(key);
        value
    }

    pub fn clear(&self) {
        let mut inner = self.0.borrow_mut();
        if !inner.data.is_empty() {
            inner.data.clear();
            inner.mark_changed();
        }
    }

    /// Issues a new token on commit, keeping the data. The old token stops
    /// resolving once the response is written.
    pub fn renew(&self) {
        let mut inner = self.0.borrow_mut();
        if let Some(old) = inner.token.take() {
            inner.stale_tokens.push(old);
        }
        inner.status = SessionStatus::Renewed;
    }

    pub fn token(&self) -> Option<String> {
        self.0.borrow().token.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.0.borrow().status
    }

    pub(crate) fn data(&self) -> SessionData {
        self.0.borrow().data.clone()
    }

    pub(crate) fn assign_token(&self, token: String) {
        self.0.borrow_mut().token = Some(token);
    }

    pub(crate) fn take_stale_tokens(&self) -> Vec<String> {
        std::mem::take(&mut self.0.borrow_mut().stale_tokens)
    }

    pub(crate) fn mark_committed(&self) {
        self.0.borrow_mut().status = SessionStatus::Unchanged;
    }
}

impl SessionInner {
    fn mark_changed(&mut self) {
        if self.status == SessionStatus::Unchanged {
            self.status = SessionStatus::Changed;
        }
    }
}

impl FromRequest for Session {
    type Error = AppError;
    type Future = Ready<Result<Self>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(session_from_extensions(req))
    }
}

pub(crate) fn session_from_extensions(req: &impl HttpMessage) -> Result<Session> {
    req.extensions()
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session stage is not mounted on this route".into()))
}
