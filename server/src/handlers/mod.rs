pub mod account;
pub mod pages;
pub mod snippets;
pub mod users;

use actix_web::{http::header, HttpResponse};

pub use account::{account_password_update, account_password_update_post, account_view};
pub use pages::{about, not_found, ping, static_asset};
pub use snippets::{home, snippet_create, snippet_create_post, snippet_view};
pub use users::{user_login, user_login_post, user_logout_post, user_signup, user_signup_post};

/// 303 so that a refresh after a POST does not resubmit the form.
pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}
