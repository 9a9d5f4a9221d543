#![allow(dead_code)]

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use actix_http::Request;
use actix_web::{
    body::{self, MessageBody},
    cookie::Cookie,
    dev::{Service, ServiceResponse},
    http::{header::HeaderMap, StatusCode},
    test, web,
};
use regex::Regex;

use snipper::app::AppState;
use snipper::csrf::CsrfGuard;
use snipper::db::DbContext;
use snipper::routes::app_routes;
use snipper::session::{CookieSettings, MemorySessionStore, SessionManager};
use snipper::templates::Templates;

pub const CSRF_SECRET: &[u8] = b"integration-tests-csrf-secret-0123456789";
pub const COOKIE_NAME: &str = "session";

static CSRF_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="csrf_token" value="([^"]+)""#).unwrap());

pub struct TestEnv {
    pub state: AppState,
    pub store: MemorySessionStore,
}

pub async fn test_env() -> TestEnv {
    let db = DbContext::in_memory()
        .await
        .expect("in-memory database")
        .with_password_cost(snipper::config::MIN_PASSWORD_COST);
    db.init_schema().await.expect("schema");

    let store = MemorySessionStore::new();
    let sessions = SessionManager::new(
        Arc::new(store.clone()),
        Duration::from_secs(3600),
        CookieSettings {
            name: COOKIE_NAME.to_string(),
            secure: false,
        },
    );

    let state = AppState {
        db,
        sessions,
        templates: web::Data::new(Templates::new().expect("templates")),
        csrf: CsrfGuard::new(CSRF_SECRET.to_vec()).expect("csrf guard"),
        routes: Arc::new(app_routes().expect("routes")),
    };

    TestEnv { state, store }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get("location")
            .and_then(|value| value.to_str().ok())
    }

    pub fn csrf_token(&self) -> String {
        CSRF_FIELD
            .captures(&self.body)
            .map(|caps| caps[1].to_string())
            .expect("page should embed a csrf token")
    }
}

/// Keeps the session cookie between requests, like a browser would.
#[derive(Default)]
pub struct Browser {
    pub cookie: Option<Cookie<'static>>,
}

impl Browser {
    pub fn token(&self) -> Option<String> {
        self.cookie.as_ref().map(|cookie| cookie.value().to_string())
    }

    pub async fn send<S, B>(&mut self, app: &S, req: test::TestRequest) -> Reply
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody + 'static,
    {
        let req = match &self.cookie {
            Some(cookie) => req.cookie(cookie.clone()),
            None => req,
        };

        // Errors leaving the outermost stage are rendered by the server
        // itself; do the same here.
        let res = match test::try_call_service(app, req.to_request()).await {
            Ok(res) => res.into_parts().1.map_into_boxed_body(),
            Err(err) => err.error_response(),
        };

        let issued = res
            .cookies()
            .find(|cookie| cookie.name() == COOKIE_NAME)
            .map(|cookie| cookie.into_owned());
        if let Some(cookie) = issued {
            self.cookie = if cookie.value().is_empty() {
                None
            } else {
                Some(cookie)
            };
        }

        let status = res.status();
        let headers = res.headers().clone();
        let body = body::to_bytes(res.into_body())
            .await
            .expect("response body");

        Reply {
            status,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }

    pub async fn get<S, B>(&mut self, app: &S, uri: &str) -> Reply
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody + 'static,
    {
        self.send(app, test::TestRequest::get().uri(uri)).await
    }

    pub async fn post_form<S, B>(&mut self, app: &S, uri: &str, form: &[(&str, &str)]) -> Reply
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody + 'static,
    {
        self.send(app, test::TestRequest::post().uri(uri).set_form(form))
            .await
    }

    /// Fetches `page` for a fresh token, then posts `form` with it.
    pub async fn submit<S, B>(
        &mut self,
        app: &S,
        page: &str,
        action: &str,
        form: &[(&str, &str)],
    ) -> Reply
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody + 'static,
    {
        let token = self.get(app, page).await.csrf_token();
        let mut fields = form.to_vec();
        fields.push(("csrf_token", token.as_str()));
        self.post_form(app, action, &fields).await
    }

    pub async fn login<S, B>(&mut self, app: &S, email: &str, password: &str) -> Reply
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
        B: MessageBody + 'static,
    {
        self.submit(
            app,
            "/user/login",
            "/user/login",
            &[("email", email), ("password", password)],
        )
        .await
    }
}

pub async fn create_user(env: &TestEnv, email: &str, password: &str) -> i64 {
    env.state
        .db
        .users()
        .insert("Test User", email, password)
        .await
        .expect("user insert")
}

pub async fn snippet_count(env: &TestEnv) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM snippets")
        .fetch_one(env.state.db.pool())
        .await
        .expect("count snippets")
}
