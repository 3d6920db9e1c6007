// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix shared by every variable read by [`Config::from_env`].
pub const ENV_PREFIX: &str = "IIMS";

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection and migration settings.
    pub database: DatabaseConfig,
    /// Address the RPC transport should bind to.
    pub grpc_addr: SocketAddr,
}

/// Connection options for the document store.
#[derive(Clone, Default)]
pub struct DatabaseConfig {
    /// MongoDB connection string. Takes precedence over `hosts`.
    pub uri: Option<String>,
    /// Explicit `host:port` list, used only when no URI is configured.
    pub hosts: Vec<String>,
    /// Target database. Falls back to the database named in the URI.
    pub database: Option<String>,
    /// Username for SCRAM authentication.
    pub username: Option<String>,
    /// Password for SCRAM authentication.
    pub password: Option<String>,
    /// Directory holding `NNNNNN_name.up.json` artifacts.
    pub migrations_path: PathBuf,
    /// Overrides the default 10 second connect window.
    pub connect_timeout: Option<Duration>,
    /// Upper bound for selecting a server for a single operation.
    pub healthcheck_timeout: Duration,
    /// How long bootstrap waits for the cluster kind to be discovered.
    pub topology_timeout: Duration,
}

// Hand-written so the password never ends up in logs.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("uri", &self.uri.as_deref().map(redact_uri))
            .field("hosts", &self.hosts)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("migrations_path", &self.migrations_path)
            .field("connect_timeout", &self.connect_timeout)
            .field("healthcheck_timeout", &self.healthcheck_timeout)
            .field("topology_timeout", &self.topology_timeout)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required (at least one):
    /// - `IIMS_DATABASE_URI`: MongoDB connection string
    /// - `IIMS_DATABASE_HOSTS`: comma separated `host:port` list
    ///
    /// Optional (with defaults):
    /// - `IIMS_DATABASE_NAME`: target database (default: database from the URI)
    /// - `IIMS_DATABASE_USERNAME` / `IIMS_DATABASE_PASSWORD`
    /// - `IIMS_DATABASE_MIGRATIONS_PATH` (default: `./migrations/mongo`)
    /// - `IIMS_DATABASE_CONNECT_TIMEOUT_SECS` (default: driver default of 10)
    /// - `IIMS_DATABASE_HEALTHCHECK_TIMEOUT_SECS` (default: 5)
    /// - `IIMS_DATABASE_TOPOLOGY_TIMEOUT_SECS` (default: 10)
    /// - `IIMS_SERVER_GRPC_PORT` (default: 50051)
    pub fn from_env() -> Result<Self, ConfigError> {
        let uri = non_empty_var("IIMS_DATABASE_URI");
        let hosts: Vec<String> = non_empty_var("IIMS_DATABASE_HOSTS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if uri.is_none() && hosts.is_empty() {
            return Err(ConfigError::Missing(
                "IIMS_DATABASE_URI or IIMS_DATABASE_HOSTS",
            ));
        }

        let connect_timeout = match non_empty_var("IIMS_DATABASE_CONNECT_TIMEOUT_SECS") {
            Some(raw) => Some(parse_secs("IIMS_DATABASE_CONNECT_TIMEOUT_SECS", &raw)?),
            None => None,
        };

        let healthcheck_timeout = parse_secs(
            "IIMS_DATABASE_HEALTHCHECK_TIMEOUT_SECS",
            &std::env::var("IIMS_DATABASE_HEALTHCHECK_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string()),
        )?;

        let topology_timeout = parse_secs(
            "IIMS_DATABASE_TOPOLOGY_TIMEOUT_SECS",
            &std::env::var("IIMS_DATABASE_TOPOLOGY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string()),
        )?;

        let grpc_port: u16 = std::env::var("IIMS_SERVER_GRPC_PORT")
            .unwrap_or_else(|_| "50051".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("IIMS_SERVER_GRPC_PORT", "must be a valid port number")
            })?;

        let migrations_path = PathBuf::from(
            std::env::var("IIMS_DATABASE_MIGRATIONS_PATH")
                .unwrap_or_else(|_| "./migrations/mongo".to_string()),
        );

        Ok(Self {
            database: DatabaseConfig {
                uri,
                hosts,
                database: non_empty_var("IIMS_DATABASE_NAME"),
                username: non_empty_var("IIMS_DATABASE_USERNAME"),
                password: non_empty_var("IIMS_DATABASE_PASSWORD"),
                migrations_path,
                connect_timeout,
                healthcheck_timeout,
                topology_timeout,
            },
            grpc_addr: SocketAddr::from(([0, 0, 0, 0], grpc_port)),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(ConfigError::Invalid(
            key,
            "must be a positive number of seconds",
        )),
        Ok(secs) => Ok(Duration::from_secs(secs)),
    }
}

/// Strip the userinfo part of a connection string.
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}://***@{}", scheme, &rest[at + 1..]),
        None => uri.to_string(),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "IIMS_DATABASE_URI",
        "IIMS_DATABASE_HOSTS",
        "IIMS_DATABASE_NAME",
        "IIMS_DATABASE_USERNAME",
        "IIMS_DATABASE_PASSWORD",
        "IIMS_DATABASE_MIGRATIONS_PATH",
        "IIMS_DATABASE_CONNECT_TIMEOUT_SECS",
        "IIMS_DATABASE_HEALTHCHECK_TIMEOUT_SECS",
        "IIMS_DATABASE_TOPOLOGY_TIMEOUT_SECS",
        "IIMS_SERVER_GRPC_PORT",
    ];

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        /// Starts from a clean slate: every variable the loader reads is removed.
        fn clean() -> Self {
            let mut guard = Self { vars: Vec::new() };
            for key in ALL_VARS {
                guard.remove(key);
            }
            guard
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("IIMS_DATABASE_URI", "mongodb://localhost:27017/stocky");

        let config = Config::from_env().unwrap();

        assert_eq!(
            config.database.uri.as_deref(),
            Some("mongodb://localhost:27017/stocky")
        );
        assert!(config.database.hosts.is_empty());
        assert_eq!(config.database.database, None);
        assert_eq!(
            config.database.migrations_path,
            PathBuf::from("./migrations/mongo")
        );
        assert_eq!(config.database.connect_timeout, None);
        assert_eq!(config.database.healthcheck_timeout, Duration::from_secs(5));
        assert_eq!(config.database.topology_timeout, Duration::from_secs(10));
        assert_eq!(config.grpc_addr.port(), 50051);
    }

    #[test]
    fn test_config_hosts_without_uri() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("IIMS_DATABASE_HOSTS", "db-0:27017, db-1:27017,,");
        guard.set("IIMS_DATABASE_NAME", "inventory");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database.uri, None);
        assert_eq!(config.database.hosts, vec!["db-0:27017", "db-1:27017"]);
        assert_eq!(config.database.database.as_deref(), Some("inventory"));
    }

    #[test]
    fn test_config_all_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("IIMS_DATABASE_URI", "mongodb://db:27017");
        guard.set("IIMS_DATABASE_USERNAME", "svc");
        guard.set("IIMS_DATABASE_PASSWORD", "hunter2");
        guard.set("IIMS_DATABASE_MIGRATIONS_PATH", "/srv/migrations");
        guard.set("IIMS_DATABASE_CONNECT_TIMEOUT_SECS", "3");
        guard.set("IIMS_DATABASE_HEALTHCHECK_TIMEOUT_SECS", "7");
        guard.set("IIMS_DATABASE_TOPOLOGY_TIMEOUT_SECS", "30");
        guard.set("IIMS_SERVER_GRPC_PORT", "9090");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database.username.as_deref(), Some("svc"));
        assert_eq!(config.database.password.as_deref(), Some("hunter2"));
        assert_eq!(
            config.database.migrations_path,
            PathBuf::from("/srv/migrations")
        );
        assert_eq!(config.database.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.database.healthcheck_timeout, Duration::from_secs(7));
        assert_eq!(config.database.topology_timeout, Duration::from_secs(30));
        assert_eq!(config.grpc_addr.port(), 9090);
    }

    #[test]
    fn test_config_missing_database_address() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::clean();

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
        assert!(err.to_string().contains("IIMS_DATABASE_URI"));
    }

    #[test]
    fn test_config_empty_uri_counts_as_missing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("IIMS_DATABASE_URI", "   ");

        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::Missing(_)
        ));
    }

    #[test]
    fn test_config_invalid_timeouts() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("IIMS_DATABASE_URI", "mongodb://localhost");
        guard.set("IIMS_DATABASE_CONNECT_TIMEOUT_SECS", "soon");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::Invalid("IIMS_DATABASE_CONNECT_TIMEOUT_SECS", _)
        ));

        guard.set("IIMS_DATABASE_CONNECT_TIMEOUT_SECS", "2");
        guard.set("IIMS_DATABASE_TOPOLOGY_TIMEOUT_SECS", "0");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::Invalid("IIMS_DATABASE_TOPOLOGY_TIMEOUT_SECS", _)
        ));
    }

    #[test]
    fn test_config_invalid_grpc_port_out_of_range() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("IIMS_DATABASE_URI", "mongodb://localhost");
        guard.set("IIMS_SERVER_GRPC_PORT", "99999"); // > 65535

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("IIMS_SERVER_GRPC_PORT", _)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = DatabaseConfig {
            uri: Some("mongodb://svc:hunter2@db:27017/stocky".to_string()),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };

        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("mongodb://***@db:27017/stocky"));
    }

    #[test]
    fn test_redact_uri() {
        assert_eq!(
            redact_uri("mongodb://u:p@host:1/db?authSource=admin"),
            "mongodb://***@host:1/db?authSource=admin"
        );
        assert_eq!(redact_uri("mongodb://host:1/db"), "mongodb://host:1/db");
        assert_eq!(redact_uri("not a uri"), "not a uri");
    }

    #[test]
    fn test_config_error_display() {
        let missing = ConfigError::Missing("MY_VAR");
        assert_eq!(
            missing.to_string(),
            "missing required environment variable: MY_VAR"
        );

        let invalid = ConfigError::Invalid("MY_VAR", "must be a number");
        assert_eq!(
            invalid.to_string(),
            "invalid value for MY_VAR: must be a number"
        );
    }
}
