use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::{
        header::{self, HeaderValue},
        Method,
    },
    middleware::Next,
    web, HttpMessage, HttpResponse,
};

use crate::auth::AuthContext;
use crate::db::DbContext;
use crate::error::AppError;
use crate::session::{session_from_extensions, FLASH_KEY, REDIRECT_AFTER_LOGIN_KEY, USER_ID_KEY};

pub const LOGIN_PATH: &str = "/user/login";

/// Attaches the request's `AuthContext`. Never rejects; a session naming a
/// user that no longer exists is treated as anonymous.
pub async fn authenticate(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, actix_web::Error> {
    let auth = match resolve_auth(&req).await {
        Ok(auth) => auth,
        Err(err) => return Ok(req.error_response(err)),
    };

    req.extensions_mut().insert(auth);
    Ok(next.call(req).await?.map_into_boxed_body())
}

async fn resolve_auth(req: &ServiceRequest) -> Result<AuthContext, AppError> {
    let session = session_from_extensions(req)?;
    let Some(user_id) = session.get::<i64>(USER_ID_KEY) else {
        return Ok(AuthContext::anonymous());
    };

    let db = req
        .app_data::<web::Data<DbContext>>()
        .ok_or_else(|| AppError::Internal("database not configured".into()))?;

    if db.users().exists(user_id).await? {
        Ok(AuthContext::authenticated(user_id))
    } else {
        log::debug!("Session refers to missing user {}", user_id);
        Ok(AuthContext::anonymous())
    }
}

pub async fn require_authentication(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, actix_web::Error> {
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .copied()
        .unwrap_or_default();

    if !auth.is_authenticated() {
        let session = match session_from_extensions(&req) {
            Ok(session) => session,
            Err(err) => return Ok(req.error_response(err)),
        };

        // Only idempotent requests are worth replaying after login.
        if *req.method() == Method::GET || *req.method() == Method::HEAD {
            let target = match req.query_string() {
                "" => req.path().to_string(),
                query => format!("{}?{}", req.path(), query),
            };
            session.insert(REDIRECT_AFTER_LOGIN_KEY, target);
        }
        session.insert(FLASH_KEY, "Please log in to continue.");

        let res = HttpResponse::SeeOther()
            .insert_header((header::LOCATION, LOGIN_PATH))
            .finish();
        return Ok(req.into_response(res));
    }

    let mut res = next.call(req).await?.map_into_boxed_body();
    res.headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(res)
}
