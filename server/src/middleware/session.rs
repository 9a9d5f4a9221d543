use std::panic::{resume_unwind, AssertUnwindSafe};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::header::{self, HeaderValue},
    middleware::Next,
    web, HttpMessage,
};
use futures_util::FutureExt;

use crate::error::AppError;
use crate::session::SessionManager;

/// Loads the cookie's session before the handler and commits it afterwards,
/// on success, error and panic alike. A panic is re-raised after the commit
/// so `recover` still answers it.
pub async fn load_and_save(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, actix_web::Error> {
    let Some(manager) = req.app_data::<web::Data<SessionManager>>().cloned() else {
        let err = AppError::Internal("session manager not configured".into());
        return Ok(req.error_response(err));
    };

    let token = req
        .cookie(manager.cookie_name())
        .map(|cookie| cookie.value().to_string());
    let session = match manager.load(token.as_deref()).await {
        Ok(session) => session,
        Err(err) => return Ok(req.error_response(err)),
    };
    req.extensions_mut().insert(session.clone());

    let outcome = AssertUnwindSafe(next.call(req)).catch_unwind().await;
    let committed = manager.commit(&session).await;

    let res = match outcome {
        Ok(res) => res,
        Err(panic) => {
            if let Err(err) = committed {
                log::error!("Failed to save session after panic: {}", err);
            }
            resume_unwind(panic);
        }
    };
    let mut res = res?.map_into_boxed_body();

    match committed {
        Ok(Some(cookie)) => {
            if let Err(err) = res.response_mut().add_cookie(&cookie) {
                let (req, _) = res.into_parts();
                let err = AppError::Internal(format!("invalid session cookie: {}", err));
                return Ok(ServiceResponse::from_err(err, req));
            }
            res.headers_mut()
                .append(header::VARY, HeaderValue::from_static("Cookie"));
            Ok(res)
        }
        Ok(None) => Ok(res),
        Err(err) => {
            let (req, _) = res.into_parts();
            Ok(ServiceResponse::from_err(err, req))
        }
    }
}
