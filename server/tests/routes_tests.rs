mod common;

use actix_web::{
    http::{header, Method, StatusCode},
    middleware::from_fn,
    test, web, App, HttpResponse,
};
use common::{test_env, Browser};
use snipper::app::build_app;
use snipper::middleware::{log_request, recover, secure_headers};

#[actix_web::test]
async fn test_ping_returns_ok_without_session() {
    let env = test_env().await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    let reply = browser.get(&app, "/ping").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "OK");
    assert!(browser.cookie.is_none());
    assert_eq!(env.store.active_session_count(), 0);
}

#[actix_web::test]
async fn test_static_assets_are_served_verbatim() {
    let env = test_env().await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    let reply = browser.get(&app, "/static/css/main.css").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.headers.get(header::CONTENT_TYPE).unwrap(),
        "text/css"
    );
    assert_eq!(
        reply.body,
        include_str!("../ui/static/css/main.css")
    );

    let reply = browser.get(&app, "/static/css/missing.css").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body, "Not Found");
}

#[actix_web::test]
async fn test_secure_headers_on_every_response() {
    let env = test_env().await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    for path in ["/", "/ping", "/about", "/does-not-exist", "/static/js/main.js"] {
        let reply = browser.get(&app, path).await;
        let headers = &reply.headers;
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "deny", "{}", path);
        assert_eq!(
            headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff",
            "{}",
            path
        );
        assert_eq!(
            headers.get(header::REFERRER_POLICY).unwrap(),
            "origin-when-cross-origin",
            "{}",
            path
        );
        assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY), "{}", path);
    }
}

#[actix_web::test]
async fn test_wrong_method_is_not_routed_to_handler() {
    let env = test_env().await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    let reply = browser
        .send(&app, test::TestRequest::post().uri("/ping"))
        .await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);

    // Unsafe methods on dynamic routes hit the CSRF check first.
    let reply = browser
        .send(
            &app,
            test::TestRequest::default()
                .method(Method::DELETE)
                .uri("/snippet/view/1"),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_about_page_is_public() {
    let env = test_env().await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    let reply = browser.get(&app, "/about").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains("About"));
    assert!(reply.body.contains("/user/login"));
}

async fn explode() -> HttpResponse {
    panic!("handler blew up");
}

async fn fail() -> Result<HttpResponse, snipper::error::AppError> {
    Err(snipper::error::AppError::Internal(
        "connection string with secrets".into(),
    ))
}

#[actix_web::test]
async fn test_recover_turns_panic_into_generic_500() {
    let app = test::init_service(
        App::new()
            .route("/explode", web::get().to(explode))
            .route("/fail", web::get().to(fail))
            .route("/ok", web::get().to(|| async { HttpResponse::Ok().body("fine") }))
            .wrap(from_fn(secure_headers))
            .wrap(from_fn(log_request))
            .wrap(from_fn(recover)),
    )
    .await;
    let mut browser = Browser::default();

    let reply = browser.get(&app, "/explode").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body, "Internal Server Error");
    assert_eq!(reply.headers.get(header::CONNECTION).unwrap(), "close");
    assert_eq!(reply.headers.get(header::X_FRAME_OPTIONS).unwrap(), "deny");
    assert_eq!(
        reply.headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );

    let reply = browser.get(&app, "/fail").await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body, "Internal Server Error");
    assert!(!reply.body.contains("secrets"));
    assert!(reply.headers.contains_key(header::X_FRAME_OPTIONS));

    // The worker keeps serving after a panic.
    let reply = browser.get(&app, "/ok").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "fine");
}
