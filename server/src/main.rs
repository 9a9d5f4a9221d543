use std::sync::Arc;

use actix_web::{web, HttpServer};
use anyhow::Context;
use tokio::time;

use snipper::app::{build_app, AppState};
use snipper::config::{AppConfig, SessionBackend};
use snipper::csrf::CsrfGuard;
use snipper::db::DbContext;
use snipper::routes::app_routes;
use snipper::session::{
    CookieSettings, MemorySessionStore, SessionManager, SessionStore, SqlSessionStore,
};
use snipper::templates::Templates;
use snipper::tls;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (for development)
    // Try loading from current directory first, then from server/ directory
    if dotenvy::dotenv().is_err() {
        dotenvy::from_filename("server/.env").ok();
    }

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting Snipper...");

    let config_path = std::env::var("SNIPPER_CONFIG")
        .unwrap_or_else(|_| "server/config/snipper.toml".to_string());
    let config = AppConfig::load(Some(&config_path))
        .with_context(|| format!("failed to load configuration from '{}'", config_path))?;

    log::info!("Connecting to database at {}...", config.database.url);
    let db = DbContext::connect(&config.database)
        .await
        .context("failed to connect to database")?
        .with_password_cost(config.security.password_cost)
        .with_timeout(config.store_timeout());

    db.init_schema()
        .await
        .context("failed to initialize database schema")?;

    let store: Arc<dyn SessionStore> = match config.session.backend {
        SessionBackend::Memory => {
            log::warn!("Using in-memory sessions; they do not survive a restart");
            Arc::new(MemorySessionStore::new())
        }
        SessionBackend::Database => Arc::new(SqlSessionStore::new(&db)),
    };

    let sessions = SessionManager::new(
        store.clone(),
        config.session_lifetime(),
        CookieSettings {
            name: config.session.cookie_name.clone(),
            secure: config.session.secure,
        },
    );
    log::info!(
        "Session lifetime set to {} hours",
        config.session.lifetime_hours
    );

    let csrf = match &config.security.csrf_secret {
        Some(secret) => CsrfGuard::new(secret.as_bytes().to_vec())
            .context("invalid security.csrf_secret")?,
        None => {
            log::warn!("security.csrf_secret not set, generated a per-process secret");
            CsrfGuard::random()
        }
    };

    let templates = Templates::new().context("failed to compile templates")?;
    let routes = app_routes().context("invalid route table")?;
    log::info!("Registered {} routes", routes.entries().len());

    let state = AppState {
        db,
        sessions,
        templates: web::Data::new(templates),
        csrf,
        routes: Arc::new(routes),
    };

    // Expired sessions are already invisible to reads; this only reclaims space.
    let cleanup_interval = config.cleanup_interval();
    tokio::spawn(async move {
        let mut interval = time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            match store.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => {
                    log::info!("Background cleanup: removed {} expired sessions", removed)
                }
                Err(err) => log::warn!("Background session cleanup failed: {}", err),
            }
        }
    });

    let bind_addr = config.bind_addr();
    let server = HttpServer::new(move || build_app(state.clone()));

    let server = if config.server.tls.enabled {
        let tls_config = tls::server_config(&config.server.tls)?;
        log::info!(
            "Starting HTTPS server at {}:{}...",
            bind_addr.0,
            bind_addr.1
        );
        server.bind_rustls_0_23(bind_addr, tls_config)?
    } else {
        log::info!("Starting HTTP server at {}:{}...", bind_addr.0, bind_addr.1);
        server.bind(bind_addr)?
    };

    server.run().await?;
    Ok(())
}
