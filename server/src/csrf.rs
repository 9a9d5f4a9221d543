use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{AppError, Result};
use crate::session::{manager::generate_token, session_from_extensions, Session, CSRF_SEED_KEY};

type HmacSha256 = Hmac<Sha256>;

const MIN_SECRET_LEN: usize = 32;

pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const CSRF_FIELD: &str = "csrf_token";

#[derive(Debug, thiserror::Error)]
pub enum CsrfError {
    #[error("csrf secret is too short (min {MIN_SECRET_LEN} bytes)")]
    SecretTooShort,

    #[error("csrf secret is unusable as a MAC key")]
    InvalidKey,
}

/// Issues and checks anti-forgery tokens.
///
/// Each session holds a random seed; the form token is the HMAC of that seed
/// under the server secret, so a token is only valid for the session it was
/// rendered in.
#[derive(Clone)]
pub struct CsrfGuard {
    secret: Arc<[u8]>,
}

impl CsrfGuard {
    pub fn new(secret: Vec<u8>) -> std::result::Result<Self, CsrfError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(CsrfError::SecretTooShort);
        }

        Ok(Self {
            secret: Arc::<[u8]>::from(secret),
        })
    }

    /// Guard with a process-lifetime secret; tokens die with the process.
    pub fn random() -> Self {
        let secret: [u8; 32] = rand::random();
        Self {
            secret: Arc::<[u8]>::from(secret.to_vec()),
        }
    }

    /// Token for `session`, creating the session seed on first use.
    pub fn token_for(&self, session: &Session) -> std::result::Result<String, CsrfError> {
        let seed = match session.get::<String>(CSRF_SEED_KEY) {
            Some(seed) => seed,
            None => {
                let seed = generate_token();
                session.insert(CSRF_SEED_KEY, seed.clone());
                seed
            }
        };

        let signature = self.sign(seed.as_bytes())?;
        Ok(URL_SAFE_NO_PAD.encode(signature))
    }

    /// Constant-time check of `submitted` against the session's seed. A
    /// session without a seed never validates.
    pub fn verify(&self, session: &Session, submitted: &str) -> bool {
        let seed = match session.get::<String>(CSRF_SEED_KEY) {
            Some(seed) => seed,
            None => return false,
        };

        let signature = match URL_SAFE_NO_PAD.decode(submitted.trim()) {
            Ok(signature) => signature,
            Err(_) => return false,
        };

        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(seed.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }

    fn sign(&self, bytes: &[u8]) -> std::result::Result<Vec<u8>, CsrfError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| CsrfError::InvalidKey)?;
        mac.update(bytes);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Form field carrying the token in urlencoded bodies.
#[derive(Debug, Default, Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    pub csrf_token: Option<String>,
}

/// Token for the current session, for embedding in rendered forms.
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

impl FromRequest for CsrfToken {
    type Error = AppError;
    type Future = Ready<Result<Self>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(token_from_request(req))
    }
}

pub(crate) fn token_from_request(req: &HttpRequest) -> Result<CsrfToken> {
    let guard = req
        .app_data::<web::Data<CsrfGuard>>()
        .ok_or_else(|| AppError::Internal("csrf guard not configured".into()))?;
    let session = session_from_extensions(req)?;
    let token = guard
        .token_for(&session)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(CsrfToken(token))
}
