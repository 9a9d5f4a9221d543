use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::{Logger, Next},
};

/// Completion line, written once the response body has been sent.
pub const ACCESS_LOG_FORMAT: &str = "%a \"%r\" %s %b %T";

/// Logs the request as it enters the chain, before anything can fail.
pub async fn log_request(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let remote = req
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    log::info!(
        "{} - {:?} {} {}",
        remote,
        req.version(),
        req.method(),
        req.uri()
    );

    next.call(req).await
}

pub fn access_logger() -> Logger {
    Logger::new(ACCESS_LOG_FORMAT)
}
