//! Deployment settings.
//!
//! Two named environments share the same option set and differ only in
//! their security posture. Settings are read once at startup and shared
//! read-only afterwards.

use std::{fmt, net::SocketAddr, path::PathBuf, str::FromStr};

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://todos.db";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const STATIC_URL: &str = "/static/";
pub const SESSION_COOKIE_NAME: &str = "sessionid";
pub const CSRF_COOKIE_NAME: &str = "csrftoken";

/// One year.
const PRODUCTION_HSTS_SECONDS: u64 = 31_536_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown APP_ENV {0:?} (expected \"local\" or \"production\")")]
    UnknownEnvironment(String),
    #[error("ALLOWED_HOSTS must be set to a non-empty, comma-separated host list in production")]
    MissingAllowedHosts,
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "local" | "development" | "dev" => Ok(Self::Local),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Self::Local => "local", Self::Production => "production" })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub environment: Environment,
    /// Exposes internal error text in 500 responses.
    pub debug: bool,
    /// Accepted `Host` values: exact names, `.domain` suffixes, or `*`.
    pub allowed_hosts: Vec<String>,
    pub secure_ssl_redirect: bool,
    pub session_cookie_secure: bool,
    pub csrf_cookie_secure: bool,
    pub secure_hsts_seconds: Option<u64>,
    pub secure_hsts_include_subdomains: bool,
    /// Serve static files compressed with long-lived caching for hashed names.
    pub static_compressed_manifest: bool,
    pub static_root: PathBuf,
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub page_size: u64,
}

impl Settings {
    pub fn local() -> Self {
        Self {
            environment: Environment::Local,
            debug: true,
            allowed_hosts: vec!["localhost".into(), "127.0.0.1".into(), "[::1]".into()],
            secure_ssl_redirect: false,
            session_cookie_secure: false,
            csrf_cookie_secure: false,
            secure_hsts_seconds: None,
            secure_hsts_include_subdomains: false,
            static_compressed_manifest: false,
            static_root: PathBuf::from("staticfiles"),
            database_url: DEFAULT_DATABASE_URL.into(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn production(allowed_hosts: Vec<String>) -> Self {
        Self {
            environment: Environment::Production,
            debug: false,
            allowed_hosts,
            // TODO: enable once TLS is terminated in front of the service.
            secure_ssl_redirect: false,
            session_cookie_secure: true,
            csrf_cookie_secure: true,
            secure_hsts_seconds: Some(PRODUCTION_HSTS_SECONDS),
            secure_hsts_include_subdomains: true,
            static_compressed_manifest: true,
            ..Self::local()
        }
    }

    /// Loads `.env` (if any) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment: Environment = var("APP_ENV").unwrap_or_default().parse()?;

        let mut settings = match environment {
            Environment::Local => Self::local(),
            Environment::Production => {
                let hosts = parse_csv(&var("ALLOWED_HOSTS").unwrap_or_default());
                if hosts.is_empty() {
                    return Err(ConfigError::MissingAllowedHosts);
                }
                Self::production(hosts)
            }
        };

        if let Some(url) = var("DATABASE_URL") {
            settings.database_url = url;
        }
        if let Some(addr) = var("BIND_ADDR") {
            settings.bind_addr = addr.parse().map_err(|_| ConfigError::Invalid { key: "BIND_ADDR", value: addr })?;
        }
        if let Some(root) = var("STATIC_ROOT") {
            settings.static_root = PathBuf::from(root);
        }
        if let Some(size) = var("PAGE_SIZE") {
            settings.page_size = match size.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::Invalid { key: "PAGE_SIZE", value: size }),
            };
        }
        Ok(settings)
    }

    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }

    /// `Strict-Transport-Security` value, if HSTS is on.
    pub fn hsts_header(&self) -> Option<String> {
        self.secure_hsts_seconds.map(|secs| {
            if self.secure_hsts_include_subdomains {
                format!("max-age={secs}; includeSubDomains")
            } else {
                format!("max-age={secs}")
            }
        })
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}
