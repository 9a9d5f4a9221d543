use actix_web::{http::StatusCode, web, HttpResponse};

use super::see_other;
use crate::{
    db::{DbContext, DEFAULT_LATEST_LIMIT},
    error::{AppError, Result},
    forms::SnippetCreateForm,
    session::FLASH_KEY,
    templates::{Page, SnippetView, Templates},
};

pub async fn home(
    page: Page,
    db: web::Data<DbContext>,
    templates: web::Data<Templates>,
) -> Result<HttpResponse> {
    let snippets = db.snippets().latest(DEFAULT_LATEST_LIMIT).await?;

    let mut data = page.data();
    data.snippets = snippets.iter().map(SnippetView::from).collect();
    templates.page(StatusCode::OK, "home", &data)
}

pub async fn snippet_view(
    page: Page,
    path: web::Path<String>,
    db: web::Data<DbContext>,
    templates: web::Data<Templates>,
) -> Result<HttpResponse> {
    let id = match path.parse::<i64>() {
        Ok(id) if id >= 1 => id,
        _ => return Err(AppError::NotFound),
    };

    let snippet = db.snippets().get(id).await?;

    let mut data = page.data();
    data.snippet = Some(SnippetView::from(&snippet));
    templates.page(StatusCode::OK, "view", &data)
}

pub async fn snippet_create(page: Page, templates: web::Data<Templates>) -> Result<HttpResponse> {
    let data = page.data().with_form(&SnippetCreateForm::blank())?;
    templates.page(StatusCode::OK, "create", &data)
}

pub async fn snippet_create_post(
    page: Page,
    form: web::Form<SnippetCreateForm>,
    db: web::Data<DbContext>,
    templates: web::Data<Templates>,
) -> Result<HttpResponse> {
    let mut form = form.into_inner();
    if !form.validate() {
        let data = page.data().with_form(&form)?;
        return templates.page(StatusCode::UNPROCESSABLE_ENTITY, "create", &data);
    }

    let id = db
        .snippets()
        .insert(&form.title, &form.content, form.expires)
        .await?;

    log::info!("Snippet {} created by user {:?}", id, page.auth().user_id());
    page.session().insert(FLASH_KEY, "Snippet successfully created!");

    Ok(see_other(&format!("/snippet/view/{}", id)))
}
