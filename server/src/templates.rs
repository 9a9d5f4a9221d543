use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::StatusCode, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use chrono::{DateTime, Datelike, Utc};
use handlebars::{Handlebars, TemplateError};
use serde::Serialize;
use serde_json::Value;

use crate::auth::AuthContext;
use crate::csrf::{token_from_request, CsrfToken};
use crate::db::{Snippet, User};
use crate::error::{AppError, Result};
use crate::session::{session_from_extensions, Session, FLASH_KEY};

const BASE: &str = include_str!("../ui/html/base.hbs");
const NAV: &str = include_str!("../ui/html/partials/nav.hbs");

const PAGES: &[(&str, &str)] = &[
    ("home", include_str!("../ui/html/pages/home.hbs")),
    ("view", include_str!("../ui/html/pages/view.hbs")),
    ("create", include_str!("../ui/html/pages/create.hbs")),
    ("signup", include_str!("../ui/html/pages/signup.hbs")),
    ("login", include_str!("../ui/html/pages/login.hbs")),
    ("about", include_str!("../ui/html/pages/about.hbs")),
    ("account", include_str!("../ui/html/pages/account.hbs")),
    ("password", include_str!("../ui/html/pages/password.hbs")),
];

/// Page templates, parsed once at startup and read-only afterwards.
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> std::result::Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_partial("base", BASE)?;
        registry.register_partial("nav", NAV)?;
        for (name, source) in PAGES {
            registry.register_template_string(name, source)?;
        }

        Ok(Self { registry })
    }

    pub fn has_page(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    pub fn render(&self, name: &str, data: &TemplateData) -> Result<String> {
        Ok(self.registry.render(name, data)?)
    }

    /// Renders fully before building the response, so a template failure
    /// never leaves a half-written page.
    pub fn page(&self, status: StatusCode, name: &str, data: &TemplateData) -> Result<HttpResponse> {
        let body = self.render(name, data)?;
        Ok(HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(body))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnippetView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: String,
    pub expires: String,
}

impl From<&Snippet> for SnippetView {
    fn from(snippet: &Snippet) -> Self {
        Self {
            id: snippet.id,
            title: snippet.title.clone(),
            content: snippet.content.clone(),
            created: human_date(snippet.created),
            expires: human_date(snippet.expires),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub name: String,
    pub email: String,
    pub created: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            created: human_date(user.created),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct TemplateData {
    pub current_year: i32,
    pub flash: Option<String>,
    pub is_authenticated: bool,
    pub csrf_token: String,
    pub snippet: Option<SnippetView>,
    pub snippets: Vec<SnippetView>,
    pub form: Option<Value>,
    pub user: Option<UserView>,
}

impl TemplateData {
    pub fn with_form<F: Serialize>(mut self, form: &F) -> Result<Self> {
        self.form = Some(serde_json::to_value(form)?);
        Ok(self)
    }
}

pub fn human_date(at: DateTime<Utc>) -> String {
    at.format("%d %b %Y at %H:%M").to_string()
}

/// Request state a rendered page needs. Extracting it does not consume the
/// flash; `data()` does.
pub struct Page {
    session: Session,
    auth: AuthContext,
    csrf_token: String,
}

impl Page {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn auth(&self) -> AuthContext {
        self.auth
    }

    pub fn data(&self) -> TemplateData {
        TemplateData {
            current_year: Utc::now().year(),
            flash: self.session.pop(FLASH_KEY),
            is_authenticated: self.auth.is_authenticated(),
            csrf_token: self.csrf_token.clone(),
            ..TemplateData::default()
        }
    }
}

impl FromRequest for Page {
    type Error = AppError;
    type Future = Ready<Result<Self>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(page_from_request(req))
    }
}

fn page_from_request(req: &HttpRequest) -> Result<Page> {
    let session = session_from_extensions(req)?;
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .copied()
        .unwrap_or_default();
    let CsrfToken(csrf_token) = token_from_request(req)?;

    Ok(Page {
        session,
        auth,
        csrf_token,
    })
}
