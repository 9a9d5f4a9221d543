use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use async_trait::async_trait;

use crate::error::{AppError, Result};

/// Checks a submitted email and password against stored users.
///
/// Unknown emails and wrong passwords both come back as `Ok(None)`; errors
/// are reserved for store failures.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, email: &str, password: &str) -> Result<Option<i64>>;
}

/// Authentication state of the current request, resolved once by the
/// authenticate stage. Anonymous unless the session names a live user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthContext {
    user_id: Option<i64>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn authenticated(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    /// The user id for handlers mounted behind the protected chain.
    pub fn require_user(&self) -> Result<i64> {
        self.user_id
            .ok_or_else(|| AppError::Internal("protected handler reached without a user".into()))
    }
}

impl FromRequest for AuthContext {
    type Error = AppError;
    type Future = Ready<Result<Self>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(req
            .extensions()
            .get::<AuthContext>()
            .copied()
            .unwrap_or_default()))
    }
}
