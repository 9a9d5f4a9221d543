use std::collections::{HashMap, HashSet};

use actix_web::{http::Method, middleware::from_fn, web, Route};

use crate::handlers;
use crate::middleware::{authenticate, load_and_save, require_authentication, verify_csrf};

/// One middleware stage, in the order a request passes through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Recover,
    AccessLog,
    SecureHeaders,
    SessionLoadSave,
    CsrfValidation,
    AuthenticateAttach,
    RequireAuthentication,
}

const STANDARD: &[Stage] = &[Stage::Recover, Stage::AccessLog, Stage::SecureHeaders];

const DYNAMIC: &[Stage] = &[
    Stage::Recover,
    Stage::AccessLog,
    Stage::SecureHeaders,
    Stage::SessionLoadSave,
    Stage::CsrfValidation,
    Stage::AuthenticateAttach,
];

const PROTECTED: &[Stage] = &[
    Stage::Recover,
    Stage::AccessLog,
    Stage::SecureHeaders,
    Stage::SessionLoadSave,
    Stage::CsrfValidation,
    Stage::AuthenticateAttach,
    Stage::RequireAuthentication,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKind {
    /// App-wide stages only.
    Standard,
    /// Session, CSRF and auth attach on top of the standard stages.
    Dynamic,
    /// Dynamic plus the authentication gate.
    Protected,
}

impl ChainKind {
    /// Every stage a request on this chain passes, outermost first.
    pub fn stages(self) -> &'static [Stage] {
        match self {
            ChainKind::Standard => STANDARD,
            ChainKind::Dynamic => DYNAMIC,
            ChainKind::Protected => PROTECTED,
        }
    }

    /// Stages mounted on the route itself; the standard ones wrap the whole app.
    pub fn route_stages(self) -> &'static [Stage] {
        &self.stages()[STANDARD.len()..]
    }
}

pub type MountFn = fn(Route) -> Route;

#[derive(Clone)]
pub struct RouteEntry {
    pub method: Method,
    pub pattern: &'static str,
    pub chain: ChainKind,
    mount: MountFn,
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("chain", &self.chain)
            .finish()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route {method} {pattern} registered twice")]
    Duplicate { method: Method, pattern: String },

    #[error("pattern {pattern} mounted on both {first:?} and {second:?} chains")]
    MixedChains {
        pattern: String,
        first: ChainKind,
        second: ChainKind,
    },

    #[error("invalid route pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },
}

#[derive(Default)]
pub struct RouteTableBuilder {
    entries: Vec<RouteEntry>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        method: Method,
        pattern: &'static str,
        chain: ChainKind,
        mount: MountFn,
    ) -> Self {
        self.entries.push(RouteEntry {
            method,
            pattern,
            chain,
            mount,
        });
        self
    }

    pub fn build(self) -> Result<RouteTable, RouteError> {
        let mut seen = HashSet::new();
        let mut chains: HashMap<&'static str, ChainKind> = HashMap::new();

        for entry in &self.entries {
            validate_pattern(entry.pattern)?;

            if !seen.insert((entry.method.clone(), entry.pattern)) {
                return Err(RouteError::Duplicate {
                    method: entry.method.clone(),
                    pattern: entry.pattern.to_string(),
                });
            }

            match chains.get(entry.pattern) {
                Some(&chain) if chain != entry.chain => {
                    return Err(RouteError::MixedChains {
                        pattern: entry.pattern.to_string(),
                        first: chain,
                        second: entry.chain,
                    });
                }
                Some(_) => {}
                None => {
                    chains.insert(entry.pattern, entry.chain);
                }
            }
        }

        Ok(RouteTable {
            entries: self.entries,
        })
    }
}

fn validate_pattern(pattern: &'static str) -> Result<(), RouteError> {
    let invalid = |reason| RouteError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    };

    if !pattern.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let segments: Vec<&str> = pattern[1..].split('/').collect();
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        let opens = segment.matches('{').count();
        let closes = segment.matches('}').count();
        if opens != closes || opens > 1 {
            return Err(invalid("malformed dynamic segment"));
        }
        if opens == 1 {
            if i != last {
                return Err(invalid("dynamic segment must be the last one"));
            }
            if !(segment.starts_with('{') && segment.ends_with('}')) || segment.len() < 3 {
                return Err(invalid("dynamic segment must be a whole segment"));
            }
        }
    }

    Ok(())
}

/// Validated mapping of (method, pattern) to handler and chain.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn lookup(&self, method: &Method, pattern: &str) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|entry| entry.method == *method && entry.pattern == pattern)
    }

    /// Registers one resource per pattern, wrapped in that pattern's chain.
    /// Wraps are listed innermost first.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        let mut patterns: Vec<(&'static str, ChainKind)> = Vec::new();
        for entry in &self.entries {
            if !patterns.iter().any(|(pattern, _)| *pattern == entry.pattern) {
                patterns.push((entry.pattern, entry.chain));
            }
        }

        for (pattern, chain) in patterns {
            let mut resource = web::resource(pattern);
            for entry in self.entries.iter().filter(|e| e.pattern == pattern) {
                resource = resource.route((entry.mount)(web::route().method(entry.method.clone())));
            }

            match chain {
                ChainKind::Standard => {
                    cfg.service(resource);
                }
                ChainKind::Dynamic => {
                    cfg.service(
                        resource
                            .wrap(from_fn(authenticate))
                            .wrap(from_fn(verify_csrf))
                            .wrap(from_fn(load_and_save)),
                    );
                }
                ChainKind::Protected => {
                    cfg.service(
                        resource
                            .wrap(from_fn(require_authentication))
                            .wrap(from_fn(authenticate))
                            .wrap(from_fn(verify_csrf))
                            .wrap(from_fn(load_and_save)),
                    );
                }
            }
        }
    }
}

pub fn app_routes() -> Result<RouteTable, RouteError> {
    use ChainKind::*;

    RouteTable::builder()
        .route(Method::GET, "/static/{filename:.*}", Standard, |r| {
            r.to(handlers::static_asset)
        })
        .route(Method::GET, "/ping", Standard, |r| r.to(handlers::ping))
        .route(Method::GET, "/", Dynamic, |r| r.to(handlers::home))
        .route(Method::GET, "/snippet/view/{id}", Dynamic, |r| {
            r.to(handlers::snippet_view)
        })
        .route(Method::GET, "/about", Dynamic, |r| r.to(handlers::about))
        .route(Method::GET, "/user/signup", Dynamic, |r| {
            r.to(handlers::user_signup)
        })
        .route(Method::POST, "/user/signup", Dynamic, |r| {
            r.to(handlers::user_signup_post)
        })
        .route(Method::GET, "/user/login", Dynamic, |r| r.to(handlers::user_login))
        .route(Method::POST, "/user/login", Dynamic, |r| {
            r.to(handlers::user_login_post)
        })
        .route(Method::GET, "/snippet/create", Protected, |r| {
            r.to(handlers::snippet_create)
        })
        .route(Method::POST, "/snippet/create", Protected, |r| {
            r.to(handlers::snippet_create_post)
        })
        .route(Method::POST, "/user/logout", Protected, |r| {
            r.to(handlers::user_logout_post)
        })
        .route(Method::GET, "/account/view", Protected, |r| {
            r.to(handlers::account_view)
        })
        .route(Method::GET, "/account/password/update", Protected, |r| {
            r.to(handlers::account_password_update)
        })
        .route(Method::POST, "/account/password/update", Protected, |r| {
            r.to(handlers::account_password_update_post)
        })
        .build()
}
