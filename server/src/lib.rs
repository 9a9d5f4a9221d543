// Library exports for the binary and the integration tests

pub mod app;
pub mod assets;
pub mod auth;
pub mod config;
pub mod csrf;
pub mod db;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod templates;
pub mod tls;
