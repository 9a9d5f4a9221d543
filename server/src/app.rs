use std::sync::Arc;

use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    error::UrlencodedError,
    middleware::from_fn,
    web, App, HttpRequest,
};

use crate::csrf::CsrfGuard;
use crate::db::DbContext;
use crate::error::AppError;
use crate::handlers;
use crate::middleware::{access_logger, log_request, recover, secure_headers};
use crate::routes::RouteTable;
use crate::session::SessionManager;
use crate::templates::Templates;

/// Everything a worker's `App` shares. Built once in `main`, cloned per worker.
#[derive(Clone)]
pub struct AppState {
    pub db: DbContext,
    pub sessions: SessionManager,
    pub templates: web::Data<Templates>,
    pub csrf: CsrfGuard,
    pub routes: Arc<RouteTable>,
}

/// The standard stages wrap the whole app, the 404 fallback included. The
/// last `wrap` is the outermost, so `recover` sees everything.
pub fn build_app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let routes = state.routes.clone();

    App::new()
        .app_data(web::Data::new(state.db))
        .app_data(web::Data::new(state.sessions))
        .app_data(web::Data::new(state.csrf))
        .app_data(state.templates)
        .app_data(web::FormConfig::default().error_handler(form_error))
        .configure(|cfg| routes.configure(cfg))
        .default_service(web::to(handlers::not_found))
        .wrap(from_fn(secure_headers))
        .wrap(from_fn(log_request))
        .wrap(access_logger())
        .wrap(from_fn(recover))
}

fn form_error(err: UrlencodedError, _: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}
