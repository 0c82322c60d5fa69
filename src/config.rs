use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Longest accepted session lifetime: one year.
const MAX_SESSION_DURATION_HOURS: i64 = 24 * 365;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The lifetime of a dashboard session in hours.
    pub session_duration_hours: i64,
    /// Username of the admin created on first boot.
    pub admin_username: Option<String>,
    /// Password of the admin created on first boot.
    pub admin_password: Option<Zeroizing<String>>,
    /// WebSocket URL of the chat transport sidecar.
    pub transport_url: String,
    /// How long a transport request may wait for its reply.
    pub transport_request_timeout: Duration,
    /// How long a single write to a dashboard viewer may block.
    pub viewer_write_timeout: Duration,
    /// Capacity of the queue between the transport and the command worker.
    pub dispatch_queue_capacity: usize,
    /// Period of the expired-session sweep.
    pub session_cleanup_interval: Duration,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a new `Config` from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => database_url_from_parts(&lookup)
                .context("DATABASE_URL (or DB_HOST/DB_PORT/DB_USER/DB_PASSWORD/DB_NAME) must be set")?,
        };

        let host = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&lookup, "PORT", 8080)?;
        let bind_addr = format!("{}:{}", host, port)
            .parse()
            .context("Invalid BIND_ADDR/PORT")?;

        let admin_username = lookup("ADMIN_USERNAME").filter(|v| !v.is_empty());
        let admin_password = lookup("ADMIN_PASSWORD")
            .filter(|v| !v.is_empty())
            .map(Zeroizing::new);

        let dispatch_queue_capacity: usize = parse_or(&lookup, "DISPATCH_QUEUE_CAPACITY", 256)?;
        if dispatch_queue_capacity == 0 {
            anyhow::bail!("DISPATCH_QUEUE_CAPACITY must be greater than zero");
        }

        let session_duration_hours: i64 = parse_or(&lookup, "SESSION_DURATION_HOURS", 24)?;
        if !(1..=MAX_SESSION_DURATION_HOURS).contains(&session_duration_hours) {
            anyhow::bail!(
                "SESSION_DURATION_HOURS must be between 1 and {}",
                MAX_SESSION_DURATION_HOURS
            );
        }

        Ok(Self {
            database_url,
            bind_addr,
            session_duration_hours,
            admin_username,
            admin_password,
            transport_url: lookup("TRANSPORT_URL")
                .unwrap_or_else(|| "ws://127.0.0.1:4000/bridge".to_string()),
            transport_request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "TRANSPORT_REQUEST_TIMEOUT_SECS",
                15,
            )?),
            viewer_write_timeout: Duration::from_secs(parse_or(
                &lookup,
                "VIEWER_WRITE_TIMEOUT_SECS",
                10,
            )?),
            dispatch_queue_capacity,
            session_cleanup_interval: Duration::from_secs(parse_or(
                &lookup,
                "SESSION_CLEANUP_INTERVAL_SECS",
                3600,
            )?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}

fn database_url_from_parts<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("DB_HOST")?;
    let port = lookup("DB_PORT").unwrap_or_else(|| "5432".to_string());
    let user = lookup("DB_USER")?;
    let password = lookup("DB_PASSWORD").unwrap_or_default();
    let name = lookup("DB_NAME")?;

    Some(format!(
        "postgres://{}:{}@{}:{}/{}?sslmode=disable",
        user, password, host, port, name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db/zap")])).unwrap();

        assert_eq!(config.database_url, "postgres://db/zap");
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.session_duration_hours, 24);
        assert!(config.admin_username.is_none());
        assert!(config.admin_password.is_none());
        assert_eq!(config.viewer_write_timeout, Duration::from_secs(10));
        assert_eq!(config.dispatch_queue_capacity, 256);
    }

    #[test]
    fn database_url_is_composed_from_parts() {
        let config = Config::from_lookup(lookup_from(&[
            ("DB_HOST", "pg"),
            ("DB_USER", "bot"),
            ("DB_PASSWORD", "pw"),
            ("DB_NAME", "zapbot"),
        ]))
        .unwrap();

        assert_eq!(
            config.database_url,
            "postgres://bot:pw@pg:5432/zapbot?sslmode=disable"
        );
    }

    #[test]
    fn missing_database_settings_is_an_error() {
        assert!(Config::from_lookup(lookup_from(&[])).is_err());
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/zap"),
            ("SESSION_DURATION_HOURS", "a day"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn session_duration_must_be_in_range() {
        for hours in ["0", "-3", "8761", "9223372036854775807"] {
            let result = Config::from_lookup(lookup_from(&[
                ("DATABASE_URL", "postgres://db/zap"),
                ("SESSION_DURATION_HOURS", hours),
            ]));
            assert!(result.is_err(), "{} hours was accepted", hours);
        }

        for (raw, hours) in [("1", 1), ("8760", 8760)] {
            let config = Config::from_lookup(lookup_from(&[
                ("DATABASE_URL", "postgres://db/zap"),
                ("SESSION_DURATION_HOURS", raw),
            ]))
            .unwrap();
            assert_eq!(config.session_duration_hours, hours);
        }
    }

    #[test]
    fn empty_admin_credentials_are_ignored() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/zap"),
            ("ADMIN_USERNAME", ""),
            ("ADMIN_PASSWORD", "secret-pass"),
        ]))
        .unwrap();

        assert!(config.admin_username.is_none());
        assert_eq!(config.admin_password.as_deref().map(String::as_str), Some("secret-pass"));
    }
}
