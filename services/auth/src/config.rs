//! Service configuration
//!
//! [`AuthConfig`] is layered with the `config` crate: built-in defaults first,
//! then any `AUTH_*` environment variable (e.g. `AUTH_COOKIE_NAME=sid`).

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Lifetime of a password-reset token
pub const RESET_TOKEN_TTL_SECONDS: u64 = 60 * 60;

/// Thirty days, the lifetime of the session cookie
const DEFAULT_SESSION_TTL_SECONDS: i64 = 60 * 60 * 24 * 30;

/// Authentication service settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Name of the session cookie
    pub cookie_name: String,
    /// Only send the cookie over HTTPS
    pub cookie_secure: bool,
    /// Session lifetime in seconds, for both the cookie and the cached record
    pub session_ttl_seconds: u64,
    /// Base URL of the web client; recovery links point below it
    pub frontend_url: String,
}

impl AuthConfig {
    /// Load defaults overridden by `AUTH_*` environment variables
    ///
    /// A zero session TTL is rejected; the cache cannot hold such a record.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .set_default("listen_addr", "0.0.0.0:4000")?
            .set_default("cookie_name", "qid")?
            .set_default("cookie_secure", false)?
            .set_default("session_ttl_seconds", DEFAULT_SESSION_TTL_SECONDS)?
            .set_default("frontend_url", "http://localhost:3000")?
            .add_source(Environment::with_prefix("AUTH").try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.session_ttl_seconds == 0 {
            return Err(ConfigError::Message(
                "session_ttl_seconds must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:4000".to_string(),
            cookie_name: "qid".to_string(),
            cookie_secure: false,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS as u64,
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Outgoing mail server settings
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl SmtpConfig {
    /// Read SMTP settings; `None` when `SMTP_HOST` is unset
    ///
    /// # Environment Variables
    /// - `SMTP_HOST`: relay host name
    /// - `SMTP_PORT`: relay port (default: 587)
    /// - `SMTP_USERNAME` / `SMTP_PASSWORD`: relay credentials (default: empty)
    /// - `SMTP_FROM`: sender mailbox (default: "Forum <no-reply@localhost>")
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;

        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);

        Some(Self {
            host,
            port,
            username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            from: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "Forum <no-reply@localhost>".to_string()),
        })
    }
}
