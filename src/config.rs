//! Environment-driven configuration.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Minimum length accepted for `SESSION_SECRET`; the cookie signing key needs
/// 64 bytes of material.
pub const MIN_SESSION_SECRET_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },

    #[error("SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes long")]
    WeakSecret,
}

/// Runtime configuration of the server.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Key material for signing the session cookie. Without it a random key
    /// is generated at startup and sessions do not survive a restart.
    pub session_secret: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub session_ttl_days: i64,
    /// Set the `Secure` attribute on the session cookie. Off for localhost.
    pub cookie_secure: bool,
    pub bcrypt_cost: u32,
    pub db_max_connections: u32,
    /// Period of the expired-session sweeper, in seconds.
    pub session_cleanup_secs: u64,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let session_secret = lookup("SESSION_SECRET").filter(|secret| !secret.is_empty());
        if session_secret
            .as_ref()
            .is_some_and(|secret| secret.len() < MIN_SESSION_SECRET_LEN)
        {
            return Err(ConfigError::WeakSecret);
        }

        Ok(Self {
            database_url,
            session_secret,
            host: parse_or(&lookup, "HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or(&lookup, "PORT", 5000)?,
            session_ttl_days: parse_or(&lookup, "SESSION_TTL_DAYS", 30)?,
            cookie_secure: parse_or(&lookup, "COOKIE_SECURE", false)?,
            bcrypt_cost: parse_or(&lookup, "BCRYPT_COST", 10)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            session_cleanup_secs: parse_or(&lookup, "SESSION_CLEANUP_SECS", 3600)?,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/shuttle")]).unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.session_ttl_days, 30);
        assert_eq!(cfg.bcrypt_cost, 10);
        assert!(!cfg.cookie_secure);
        assert!(cfg.session_secret.is_none());
        assert_eq!(cfg.listen_addr().to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(
            config(&[]),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    fn malformed_numbers_are_reported_with_their_key() {
        let err = config(&[("DATABASE_URL", "sqlite::memory:"), ("PORT", "http")]).unwrap_err();
        match err {
            ConfigError::Invalid { key, value } => {
                assert_eq!(key, "PORT");
                assert_eq!(value, "http");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_session_secret_is_rejected() {
        let err = config(&[("DATABASE_URL", "sqlite::memory:"), ("SESSION_SECRET", "segredo")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::WeakSecret));

        let long = "x".repeat(MIN_SESSION_SECRET_LEN);
        let cfg = config(&[("DATABASE_URL", "sqlite::memory:"), ("SESSION_SECRET", &long)]).unwrap();
        assert_eq!(cfg.session_secret.as_deref(), Some(long.as_str()));
    }
}
