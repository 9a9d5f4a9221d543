pub mod auth;
pub mod csrf;
pub mod headers;
pub mod logging;
pub mod recover;
pub mod session;

pub use auth::{authenticate, require_authentication};
pub use csrf::verify_csrf;
pub use headers::secure_headers;
pub use logging::{access_logger, log_request};
pub use recover::recover;
pub use session::load_and_save;
