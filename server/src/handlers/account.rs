use actix_web::{http::StatusCode, web, HttpResponse};

use super::see_other;
use crate::{
    db::DbContext,
    error::{AppError, Result},
    forms::AccountPasswordUpdateForm,
    middleware::auth::LOGIN_PATH,
    session::FLASH_KEY,
    templates::{Page, Templates, UserView},
};

pub async fn account_view(
    page: Page,
    db: web::Data<DbContext>,
    templates: web::Data<Templates>,
) -> Result<HttpResponse> {
    let user_id = page.auth().require_user()?;

    let user = match db.users().get(user_id).await {
        Ok(user) => user,
        // Deleted between the auth check and here.
        Err(AppError::NotFound) => return Ok(see_other(LOGIN_PATH)),
        Err(err) => return Err(err),
    };

    let mut data = page.data();
    data.user = Some(UserView::from(&user));
    templates.page(StatusCode::OK, "account", &data)
}

pub async fn account_password_update(
    page: Page,
    templates: web::Data<Templates>,
) -> Result<HttpResponse> {
    let data = page
        .data()
        .with_form(&AccountPasswordUpdateForm::default())?;
    templates.page(StatusCode::OK, "password", &data)
}

pub async fn account_password_update_post(
    page: Page,
    form: web::Form<AccountPasswordUpdateForm>,
    db: web::Data<DbContext>,
    templates: web::Data<Templates>,
) -> Result<HttpResponse> {
    let user_id = page.auth().require_user()?;

    let mut form = form.into_inner();
    if form.validate() {
        match db
            .users()
            .update_password(user_id, &form.current_password, &form.new_password)
            .await
        {
            Ok(()) => {
                page.session().insert(FLASH_KEY, "Your password has been updated!");
                return Ok(see_other("/account/view"));
            }
            Err(AppError::InvalidCredentials) => {
                form.validator.add_field_error("current_password", "Current password is incorrect");
            }
            Err(err) => return Err(err),
        }
    }

    let data = page.data().with_form(&form)?;
    templates.page(StatusCode::UNPROCESSABLE_ENTITY, "password", &data)
}
