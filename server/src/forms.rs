use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"#,
    )
    .expect("email regex should compile")
});

pub const PERMITTED_EXPIRES: &[i64] = &[1, 7, 365];
pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MAX_TITLE_CHARS: usize = 100;

pub const BLANK: &str = "This field cannot be blank";

/// Field and form level errors collected while checking a submission.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Validator {
    pub field_errors: BTreeMap<String, String>,
    pub non_field_errors: Vec<String>,
}

impl Validator {
    pub fn valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    /// Keeps the first error reported for a field.
    pub fn add_field_error(&mut self, field: &str, message: impl Into<String>) {
        self.field_errors
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn add_non_field_error(&mut self, message: impl Into<String>) {
        self.non_field_errors.push(message.into());
    }

    pub fn check_field(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.add_field_error(field, message);
        }
    }
}

pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn max_chars(value: &str, n: usize) -> bool {
    value.chars().count() <= n
}

pub fn min_chars(value: &str, n: usize) -> bool {
    value.chars().count() >= n
}

pub fn is_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetCreateForm {
    pub title: String,
    pub content: String,
    pub expires: i64,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl SnippetCreateForm {
    /// Form shown on a fresh create page.
    pub fn blank() -> Self {
        Self {
            expires: 365,
            ..Self::default()
        }
    }

    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(not_blank(&self.title), "title", BLANK);
        v.check_field(
            max_chars(&self.title, MAX_TITLE_CHARS),
            "title",
            format!("This field cannot be more than {} characters long", MAX_TITLE_CHARS),
        );
        v.check_field(not_blank(&self.content), "content", BLANK);
        v.check_field(
            PERMITTED_EXPIRES.contains(&self.expires),
            "expires",
            "This field must equal 1, 7 or 365",
        );
        v.valid()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSignupForm {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl UserSignupForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(not_blank(&self.name), "name", BLANK);
        v.check_field(not_blank(&self.email), "email", BLANK);
        v.check_field(
            is_email(&self.email),
            "email",
            "This field must be a valid email address",
        );
        v.check_field(not_blank(&self.password), "password", BLANK);
        v.check_field(
            min_chars(&self.password, MIN_PASSWORD_CHARS),
            "password",
            format!("This field must be at least {} characters long", MIN_PASSWORD_CHARS),
        );
        v.valid()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserLoginForm {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl UserLoginForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(not_blank(&self.email), "email", BLANK);
        v.check_field(
            is_email(&self.email),
            "email",
            "This field must be a valid email address",
        );
        v.check_field(not_blank(&self.password), "password", BLANK);
        v.valid()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountPasswordUpdateForm {
    #[serde(skip_serializing)]
    pub current_password: String,
    #[serde(skip_serializing)]
    pub new_password: String,
    #[serde(skip_serializing)]
    pub new_password_confirmation: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl AccountPasswordUpdateForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(not_blank(&self.current_password), "current_password", BLANK);
        v.check_field(not_blank(&self.new_password), "new_password", BLANK);
        v.check_field(
            min_chars(&self.new_password, MIN_PASSWORD_CHARS),
            "new_password",
            format!("This field must be at least {} characters long", MIN_PASSWORD_CHARS),
        );
        v.check_field(
            not_blank(&self.new_password_confirmation),
            "new_password_confirmation",
            BLANK,
        );
        v.check_field(
            self.new_password == self.new_password_confirmation,
            "new_password_confirmation",
            "Passwords do not match",
        );
        v.valid()
    }
}
