mod common;

use actix_web::{http::StatusCode, test};
use common::{create_user, snippet_count, test_env, Browser};
use snipper::app::build_app;
use snipper::session::{SessionStore, USER_ID_KEY};

const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "correct horse battery";

#[actix_web::test]
async fn test_protected_route_redirects_to_login_and_back() {
    let env = test_env().await;
    create_user(&env, EMAIL, PASSWORD).await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    let reply = browser.get(&app, "/snippet/create").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some("/user/login"));

    let login_page = browser.get(&app, "/user/login").await;
    assert!(login_page.body.contains("Please log in to continue."));

    let reply = browser.login(&app, EMAIL, PASSWORD).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some("/snippet/create"));

    let reply = browser.get(&app, "/account/view").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains(EMAIL));
    assert_eq!(
        reply.headers.get("cache-control").unwrap(),
        "no-store"
    );
}

#[actix_web::test]
async fn test_post_login_redirect_returns_to_original_page() {
    let env = test_env().await;
    create_user(&env, EMAIL, PASSWORD).await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    browser.get(&app, "/account/password/update").await;
    let reply = browser.login(&app, EMAIL, PASSWORD).await;
    assert_eq!(reply.location(), Some("/account/password/update"));

    // The stored path is one-shot.
    browser
        .submit(&app, "/", "/user/logout", &[])
        .await;
    let reply = browser.login(&app, EMAIL, PASSWORD).await;
    assert_eq!(reply.location(), Some("/snippet/create"));
}

#[actix_web::test]
async fn test_login_rotates_session_token() {
    let env = test_env().await;
    let user_id = create_user(&env, EMAIL, PASSWORD).await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    let page = browser.get(&app, "/user/login").await;
    let anonymous_token = browser.token().expect("anonymous session cookie");

    let reply = browser
        .post_form(
            &app,
            "/user/login",
            &[
                ("email", EMAIL),
                ("password", PASSWORD),
                ("csrf_token", page.csrf_token().as_str()),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);

    let authenticated_token = browser.token().expect("authenticated session cookie");
    assert_ne!(anonymous_token, authenticated_token);
    assert!(env.store.load(&anonymous_token).await.unwrap().is_none());

    let record = env.store.load(&authenticated_token).await.unwrap().unwrap();
    assert_eq!(record.data.get::<i64>(USER_ID_KEY), Some(user_id));

    // A client replaying the pre-login cookie is anonymous.
    let mut replay = Browser::default();
    replay.cookie = Some(actix_web::cookie::Cookie::new(
        common::COOKIE_NAME,
        anonymous_token,
    ));
    let reply = replay.get(&app, "/snippet/create").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
}

#[actix_web::test]
async fn test_failed_login_rerenders_with_generic_error() {
    let env = test_env().await;
    create_user(&env, EMAIL, PASSWORD).await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    let wrong_password = browser.login(&app, EMAIL, "not the password").await;
    let unknown_email = browser
        .login(&app, "nobody@example.com", "not the password")
        .await;

    for reply in [&wrong_password, &unknown_email] {
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(reply.body.contains("Email or password is incorrect"));
    }
    assert!(wrong_password.body.contains(EMAIL));
    assert!(!wrong_password.body.contains("not the password"));
}

#[actix_web::test]
async fn test_logout_invalidates_token_and_resets_to_anonymous() {
    let env = test_env().await;
    create_user(&env, EMAIL, PASSWORD).await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    browser.login(&app, EMAIL, PASSWORD).await;
    let authenticated_token = browser.token().unwrap();

    let reply = browser.submit(&app, "/", "/user/logout", &[]).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some("/"));

    assert!(env.store.load(&authenticated_token).await.unwrap().is_none());
    let anonymous_token = browser.token().expect("flash keeps a session");
    assert_ne!(anonymous_token, authenticated_token);
    let record = env.store.load(&anonymous_token).await.unwrap().unwrap();
    assert_eq!(record.data.get::<i64>(USER_ID_KEY), None);

    let home = browser.get(&app, "/").await;
    assert!(home.body.contains("You&#x27;ve been logged out successfully!")
        || home.body.contains("You've been logged out successfully!"));

    let reply = browser.get(&app, "/account/view").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
}

#[actix_web::test]
async fn test_second_logout_with_consumed_token_does_not_fail() {
    let env = test_env().await;
    create_user(&env, EMAIL, PASSWORD).await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    browser.login(&app, EMAIL, PASSWORD).await;
    let token = browser.get(&app, "/").await.csrf_token();
    let stale_cookie = browser.cookie.clone();

    let first = browser
        .post_form(&app, "/user/logout", &[("csrf_token", token.as_str())])
        .await;
    assert_eq!(first.status, StatusCode::SEE_OTHER);

    let mut replay = Browser {
        cookie: stale_cookie,
    };
    let second = replay
        .post_form(&app, "/user/logout", &[("csrf_token", token.as_str())])
        .await;
    assert!(second.status.is_client_error() || second.status.is_redirection());
    assert!(!second.status.is_server_error());
}

#[actix_web::test]
async fn test_missing_csrf_token_is_rejected_before_write() {
    let env = test_env().await;
    create_user(&env, EMAIL, PASSWORD).await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();
    browser.login(&app, EMAIL, PASSWORD).await;

    let form = [("title", "Forged"), ("content", "Body"), ("expires", "7")];

    let reply = browser.post_form(&app, "/snippet/create", &form).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body, "Bad Request");

    let mut forged = form.to_vec();
    forged.push(("csrf_token", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"));
    let reply = browser.post_form(&app, "/snippet/create", &forged).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    assert_eq!(snippet_count(&env).await, 0);
}

#[actix_web::test]
async fn test_csrf_token_from_another_session_is_rejected() {
    let env = test_env().await;
    create_user(&env, EMAIL, PASSWORD).await;
    let app = test::init_service(build_app(env.state.clone())).await;

    let mut attacker = Browser::default();
    let foreign_token = attacker.get(&app, "/user/login").await.csrf_token();

    let mut victim = Browser::default();
    victim.login(&app, EMAIL, PASSWORD).await;
    let reply = victim
        .post_form(
            &app,
            "/snippet/create",
            &[
                ("title", "Forged"),
                ("content", "Body"),
                ("expires", "7"),
                ("csrf_token", foreign_token.as_str()),
            ],
        )
        .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(snippet_count(&env).await, 0);
}

#[actix_web::test]
async fn test_csrf_header_is_accepted() {
    let env = test_env().await;
    create_user(&env, EMAIL, PASSWORD).await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();
    browser.login(&app, EMAIL, PASSWORD).await;

    let token = browser.get(&app, "/snippet/create").await.csrf_token();
    let req = test::TestRequest::post()
        .uri("/snippet/create")
        .insert_header(("X-CSRF-Token", token))
        .set_form([("title", "Via header"), ("content", "Body"), ("expires", "1")]);
    let reply = browser.send(&app, req).await;

    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(snippet_count(&env).await, 1);
}

#[actix_web::test]
async fn test_signup_then_login() {
    let env = test_env().await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();

    let reply = browser
        .submit(
            &app,
            "/user/signup",
            "/user/signup",
            &[("name", "Bob"), ("email", "bob@example.com"), ("password", "long enough pw")],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some("/user/login"));

    let page = browser.get(&app, "/user/login").await;
    assert!(page.body.contains("Your signup was successful. Please log in."));

    let reply = browser.login(&app, "bob@example.com", "long enough pw").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);

    let duplicate = browser
        .submit(
            &app,
            "/user/signup",
            "/user/signup",
            &[("name", "Bob"), ("email", "bob@example.com"), ("password", "long enough pw")],
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(duplicate.body.contains("Email address is already in use"));
}

#[actix_web::test]
async fn test_password_update() {
    let env = test_env().await;
    create_user(&env, EMAIL, PASSWORD).await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();
    browser.login(&app, EMAIL, PASSWORD).await;

    let wrong = browser
        .submit(
            &app,
            "/account/password/update",
            "/account/password/update",
            &[
                ("current_password", "guess"),
                ("new_password", "brand new password"),
                ("new_password_confirmation", "brand new password"),
            ],
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(wrong.body.contains("Current password is incorrect"));

    let reply = browser
        .submit(
            &app,
            "/account/password/update",
            "/account/password/update",
            &[
                ("current_password", PASSWORD),
                ("new_password", "brand new password"),
                ("new_password_confirmation", "brand new password"),
            ],
        )
        .await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some("/account/view"));

    let mut other = Browser::default();
    let reply = other.login(&app, EMAIL, "brand new password").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
}

#[actix_web::test]
async fn test_deleted_user_session_is_anonymous() {
    let env = test_env().await;
    let user_id = create_user(&env, EMAIL, PASSWORD).await;
    let app = test::init_service(build_app(env.state.clone())).await;
    let mut browser = Browser::default();
    browser.login(&app, EMAIL, PASSWORD).await;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(env.state.db.pool())
        .await
        .unwrap();

    let reply = browser.get(&app, "/snippet/create").await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some("/user/login"));
}
