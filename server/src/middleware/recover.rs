use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::AssertUnwindSafe;

use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::{header, StatusCode},
    middleware::Next,
    HttpResponse, ResponseError,
};
use futures_util::FutureExt;

use super::headers::apply_secure_headers;

/// Outermost stage. Turns panics and bubbled errors into responses and is the
/// only place 5xx detail gets logged.
///
/// The request is not kept around while inner stages run: routing needs sole
/// ownership of it. Failures leave as `Unhandled` errors and actix renders
/// them through `ResponseError`.
pub async fn recover(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let method = req.method().clone();
    let uri = req.uri().clone();

    match AssertUnwindSafe(next.call(req)).catch_unwind().await {
        Ok(Ok(res)) => {
            if res.status().is_server_error() {
                if let Some(err) = res.response().error() {
                    log::error!("{} {} failed with {}: {:?}", method, uri, res.status(), err);
                }
            }
            Ok(res)
        }
        Ok(Err(err)) => {
            let status = err.as_response_error().status_code();
            if status.is_server_error() {
                log::error!("{} {} failed with {}: {:?}", method, uri, status, err);
            }
            Err(Unhandled::Error(err).into())
        }
        Err(panic) => {
            log::error!(
                "panic serving {} {}: {}\n{}",
                method,
                uri,
                panic_message(panic.as_ref()),
                Backtrace::force_capture()
            );
            Err(Unhandled::Panic.into())
        }
    }
}

/// A failure that escaped every inner stage.
#[derive(Debug)]
enum Unhandled {
    Panic,
    Error(actix_web::Error),
}

impl fmt::Display for Unhandled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unhandled::Panic => f.write_str("handler panicked"),
            Unhandled::Error(err) => write!(f, "{}", err),
        }
    }
}

impl ResponseError for Unhandled {
    fn status_code(&self) -> StatusCode {
        match self {
            Unhandled::Panic => StatusCode::INTERNAL_SERVER_ERROR,
            Unhandled::Error(err) => err.as_response_error().status_code(),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut res = match self {
            Unhandled::Panic => HttpResponse::InternalServerError()
                .insert_header((header::CONNECTION, "close"))
                .content_type("text/plain; charset=utf-8")
                .body("Internal Server Error"),
            Unhandled::Error(err) => err.error_response(),
        };
        apply_secure_headers(res.headers_mut());
        res
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
