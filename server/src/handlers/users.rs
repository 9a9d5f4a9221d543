use actix_web::{http::StatusCode, web, HttpResponse};

use super::see_other;
use crate::{
    auth::CredentialVerifier,
    db::DbContext,
    error::{AppError, Result},
    forms::{UserLoginForm, UserSignupForm},
    middleware::auth::LOGIN_PATH,
    session::{FLASH_KEY, REDIRECT_AFTER_LOGIN_KEY, USER_ID_KEY},
    templates::{Page, Templates},
};

const DEFAULT_AFTER_LOGIN: &str = "/snippet/create";

pub async fn user_signup(page: Page, templates: web::Data<Templates>) -> Result<HttpResponse> {
    let data = page.data().with_form(&UserSignupForm::default())?;
    templates.page(StatusCode::OK, "signup", &data)
}

pub async fn user_signup_post(
    page: Page,
    form: web::Form<UserSignupForm>,
    db: web::Data<DbContext>,
    templates: web::Data<Templates>,
) -> Result<HttpResponse> {
    let mut form = form.into_inner();
    if form.validate() {
        match db.users().insert(&form.name, &form.email, &form.password).await {
            Ok(id) => {
                log::info!("New user {} signed up", id);
                page.session().insert(FLASH_KEY, "Your signup was successful. Please log in.");
                return Ok(see_other(LOGIN_PATH));
            }
            Err(AppError::DuplicateEmail) => {
                form.validator.add_field_error("email", "Email address is already in use");
            }
            Err(err) => return Err(err),
        }
    }

    let data = page.data().with_form(&form)?;
    templates.page(StatusCode::UNPROCESSABLE_ENTITY, "signup", &data)
}

pub async fn user_login(page: Page, templates: web::Data<Templates>) -> Result<HttpResponse> {
    let data = page.data().with_form(&UserLoginForm::default())?;
    templates.page(StatusCode::OK, "login", &data)
}

pub async fn user_login_post(
    page: Page,
    form: web::Form<UserLoginForm>,
    db: web::Data<DbContext>,
    templates: web::Data<Templates>,
) -> Result<HttpResponse> {
    let mut form = form.into_inner();
    if form.validate() {
        let verifier = db.users();
        match verifier.verify(&form.email, &form.password).await? {
            Some(user_id) => {
                let session = page.session();

                // New token for the new privilege level.
                session.renew();
                session.insert(USER_ID_KEY, user_id);

                let target = session
                    .pop::<String>(REDIRECT_AFTER_LOGIN_KEY)
                    .filter(|path| is_local_path(path))
                    .unwrap_or_else(|| DEFAULT_AFTER_LOGIN.to_string());

                log::info!("User {} logged in", user_id);
                return Ok(see_other(&target));
            }
            None => {
                log::warn!("Failed login attempt for {}", form.email);
                form.validator.add_non_field_error("Email or password is incorrect");
            }
        }
    }

    let data = page.data().with_form(&form)?;
    templates.page(StatusCode::UNPROCESSABLE_ENTITY, "login", &data)
}

pub async fn user_logout_post(page: Page) -> Result<HttpResponse> {
    let session = page.session();
    let user_id = page.auth().require_user()?;

    session.renew();
    session.clear();
    session.insert(FLASH_KEY, "You've been logged out successfully!");

    log::info!("User {} logged out", user_id);
    Ok(see_other("/"))
}

/// Paths on this site only; rejects absolute and protocol-relative URLs.
pub fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}
