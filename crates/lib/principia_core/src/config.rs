//! Login subsystem configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::auth::authenticator::DEFAULT_LATENCY;
use crate::session::DEFAULT_TTL;
use crate::storage::FileBackend;

/// Default key prefix for the session store.
pub const DEFAULT_NAMESPACE: &str = "principia_";

/// Configuration for wiring a login flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginConfig {
    /// Session lifetime.
    pub session_ttl: Duration,
    /// Key prefix applied by the session store.
    pub store_namespace: String,
    /// Simulated authenticator latency.
    pub auth_latency: Duration,
    /// Location of the durable store file.
    pub store_path: PathBuf,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_TTL,
            store_namespace: DEFAULT_NAMESPACE.into(),
            auth_latency: DEFAULT_LATENCY,
            store_path: FileBackend::default_path(),
        }
    }
}

/// Parse an environment value, warning and returning `None` when it is malformed.
fn parse_var<T: FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring malformed configuration value");
            None
        }
    }
}

impl LoginConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                     | Default                                   |
    /// |------------------------------|-------------------------------------------|
    /// | `PRINCIPIA_SESSION_TTL_SECS` | `86400`                                   |
    /// | `PRINCIPIA_STORE_NAMESPACE`  | `principia_`                              |
    /// | `PRINCIPIA_AUTH_LATENCY_MS`  | `500`                                     |
    /// | `PRINCIPIA_STORE_PATH`       | `<data_dir>/principia/session-store.json` |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let session_ttl = match parse_var::<u64>(
            "PRINCIPIA_SESSION_TTL_SECS",
            lookup("PRINCIPIA_SESSION_TTL_SECS"),
        ) {
            Some(0) => {
                warn!("PRINCIPIA_SESSION_TTL_SECS must be positive, using default");
                defaults.session_ttl
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.session_ttl,
        };

        let auth_latency = parse_var::<u64>(
            "PRINCIPIA_AUTH_LATENCY_MS",
            lookup("PRINCIPIA_AUTH_LATENCY_MS"),
        )
        .map(Duration::from_millis)
        .unwrap_or(defaults.auth_latency);

        let store_namespace = lookup("PRINCIPIA_STORE_NAMESPACE")
            .filter(|ns| !ns.is_empty())
            .unwrap_or(defaults.store_namespace);

        let store_path = lookup("PRINCIPIA_STORE_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);

        Self {
            session_ttl,
            store_namespace,
            auth_latency,
            store_path,
        }
    }
}
