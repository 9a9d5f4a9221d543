use actix_web::{http::StatusCode, web, HttpResponse};

use crate::{
    assets,
    error::{AppError, Result},
    templates::{Page, Templates},
};

pub async fn about(page: Page, templates: web::Data<Templates>) -> Result<HttpResponse> {
    templates.page(StatusCode::OK, "about", &page.data())
}

/// Liveness probe.
pub async fn ping() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("OK")
}

pub async fn static_asset(path: web::Path<String>) -> Result<HttpResponse> {
    let asset = assets::lookup(&path).ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok()
        .content_type(asset.content_type)
        .body(asset.body))
}

pub async fn not_found() -> Result<HttpResponse> {
    Err(AppError::NotFound)
}
