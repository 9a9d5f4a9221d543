use std::sync::Arc;
use std::time::Duration;

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{TimeDelta, Utc};

use super::store::{SessionData, SessionStore};
use super::{Session, SessionStatus};
use crate::error::{AppError, Result};

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            secure: true,
        }
    }
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    lifetime: Duration,
    cookie: CookieSettings,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, lifetime: Duration, cookie: CookieSettings) -> Self {
        Self {
            store,
            lifetime,
            cookie,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie.name
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Resolves the session named by the request cookie. Unknown or expired
    /// tokens yield a fresh anonymous session without a token; the client's
    /// value is never adopted.
    pub async fn load(&self, token: Option<&str>) -> Result<Session> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => return Ok(Session::new(None, SessionData::new())),
        };

        match self.store.load(token).await? {
            Some(record) => Ok(Session::new(Some(token.to_string()), record.data)),
            None => {
                log::debug!("Session token not found or expired, starting anonymous session");
                Ok(Session::new(None, SessionData::new()))
            }
        }
    }

    /// Persists the request's session changes and returns the cookie to send,
    /// if any. Rotated-away tokens are deleted first.
    pub async fn commit(&self, session: &Session) -> Result<Option<Cookie<'static>>> {
        let mut removed_any = false;
        for stale in session.take_stale_tokens() {
            if self.store.delete(&stale).await? {
                removed_any = true;
            } else {
                log::debug!("Rotated session token was already gone");
            }
        }

        if session.status() == SessionStatus::Unchanged {
            return Ok(None);
        }

        let data = session.data();
        if data.is_empty() {
            // Nothing left worth keeping: drop the record and the cookie.
            if let Some(token) = session.token() {
                removed_any |= self.store.delete(&token).await?;
            }
            session.mark_committed();
            return Ok(removed_any.then(|| self.removal_cookie()));
        }

        let token = match session.token() {
            Some(token) => token,
            None => {
                let token = generate_token();
                session.assign_token(token.clone());
                token
            }
        };

        let lifetime = TimeDelta::from_std(self.lifetime)
            .map_err(|e| AppError::Internal(format!("session lifetime out of range: {}", e)))?;
        self.store.save(&token, &data, Utc::now() + lifetime).await?;
        session.mark_committed();

        Ok(Some(self.session_cookie(token)))
    }

    fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(self.cookie.name.clone(), token)
            .path("/")
            .http_only(true)
            .secure(self.cookie.secure)
            .same_site(SameSite::Lax)
            .max_age(CookieDuration::seconds(self.lifetime.as_secs() as i64))
            .finish()
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build(self.cookie.name.clone(), "")
            .path("/")
            .http_only(true)
            .secure(self.cookie.secure)
            .same_site(SameSite::Lax)
            .max_age(CookieDuration::seconds(0))
            .finish()
    }
}

/// 256 bits from the thread RNG, URL-safe base64.
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}
