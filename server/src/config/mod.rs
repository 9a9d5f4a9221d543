use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

/// Bounds bcrypt accepts for its cost factor.
pub const MIN_PASSWORD_COST: u32 = 4;
pub const MAX_PASSWORD_COST: u32 = 31;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub session: SessionSettings,
    pub security: SecuritySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub tls: TlsSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    pub enabled: bool,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Database,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub backend: SessionBackend,
    pub lifetime_hours: u64,
    pub cookie_name: String,
    pub secure: bool,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    pub csrf_secret: Option<String>,
    pub password_cost: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            tls: TlsSettings::default(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://snipper.db".to_string(),
            max_connections: 10,
            timeout_ms: 3_000,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Database,
            lifetime_hours: 12,
            cookie_name: "session".to_string(),
            secure: true,
            cleanup_interval_secs: 300,
        }
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            csrf_secret: None,
            password_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl AppConfig {
    /// Loads the optional TOML file at `path`, then applies `SNIPPER_*`
    /// environment overrides (`SNIPPER_SERVER__PORT=8080`).
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path.as_ref()).required(false));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("SNIPPER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(format!("Failed to read configuration: {}", e)))?;

        Self::finish(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to parse configuration: {}", e)))?;

        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self> {
        let parsed: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Invalid configuration: {}", e)))?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<()> {
        if self.session.lifetime_hours == 0 {
            return Err(AppError::Config(
                "session.lifetime_hours must be at least 1".to_string(),
            ));
        }
        if self.database.timeout_ms == 0 {
            return Err(AppError::Config(
                "database.timeout_ms must be positive".to_string(),
            ));
        }
        if !(MIN_PASSWORD_COST..=MAX_PASSWORD_COST).contains(&self.security.password_cost) {
            return Err(AppError::Config(format!(
                "security.password_cost must be between {} and {}",
                MIN_PASSWORD_COST,
                MAX_PASSWORD_COST
            )));
        }
        let tls = &self.server.tls;
        if tls.cert_path.is_some() != tls.key_path.is_some() {
            return Err(AppError::Config(
                "server.tls.cert_path and server.tls.key_path must be set together".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.database.timeout_ms)
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session.lifetime_hours * 3600)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.session.cleanup_interval_secs.max(1))
    }
}
