use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::Method,
    middleware::Next,
    web, HttpMessage,
};

use crate::csrf::{CsrfForm, CsrfGuard, CSRF_HEADER};
use crate::error::AppError;
use crate::session::session_from_extensions;

pub async fn verify_csrf(
    mut req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, actix_web::Error> {
    if is_safe_method(req.method()) {
        return Ok(next.call(req).await?.map_into_boxed_body());
    }

    let Some(guard) = req.app_data::<web::Data<CsrfGuard>>().cloned() else {
        let err = AppError::Internal("csrf guard not configured".into());
        return Ok(req.error_response(err));
    };
    let session = match session_from_extensions(&req) {
        Ok(session) => session,
        Err(err) => return Ok(req.error_response(err)),
    };

    let submitted = match header_token(&req) {
        Some(token) => Some(token),
        None => match form_token(&mut req).await {
            Ok(token) => token,
            Err(err) => return Ok(req.error_response(err)),
        },
    };

    let valid = submitted
        .map(|token| guard.verify(&session, &token))
        .unwrap_or(false);
    if !valid {
        log::warn!("Rejected {} {}: CSRF token missing or invalid", req.method(), req.path());
        return Ok(req.error_response(AppError::CsrfMismatch));
    }

    Ok(next.call(req).await?.map_into_boxed_body())
}

pub fn is_safe_method(method: &Method) -> bool {
    *method == Method::GET
        || *method == Method::HEAD
        || *method == Method::OPTIONS
        || *method == Method::TRACE
}

fn header_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

// Reads the token out of a urlencoded body, then puts the body back so the
// handler's form extractor still sees it.
async fn form_token(req: &mut ServiceRequest) -> Result<Option<String>, actix_web::Error> {
    if !req
        .content_type()
        .eq_ignore_ascii_case("application/x-www-form-urlencoded")
    {
        return Ok(None);
    }

    let body = req.extract::<web::Bytes>().await?;
    let token = std::str::from_utf8(&body)
        .ok()
        .and_then(|query| web::Query::<CsrfForm>::from_query(query).ok())
        .and_then(|form| form.into_inner().csrf_token);

    let (_, mut payload) = actix_http::h1::Payload::create(true);
    payload.unread_data(body);
    req.set_payload(payload.into());

    Ok(token)
}
