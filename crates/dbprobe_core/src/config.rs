//! Environment-driven configuration.
//!
//! Defaults live in [`defaults`] and are resolved once, here, into fully
//! populated [`RelationalConfig`] and [`GraphConfig`] values. Empty variables
//! count as unset.

use std::str::FromStr;

use serde::Serialize;

use crate::error::{ProbeError, ProbeResult};
use crate::models::{GraphConfig, PoolOptions, ProbeTimeouts, RelationalConfig, Secret};

/// Documented defaults for every setting.
pub mod defaults {
    pub const POSTGRES_HOST: &str = "localhost";
    pub const POSTGRES_PORT: u16 = 5432;
    pub const POSTGRES_DB: &str = "identity_service";
    pub const POSTGRES_USER: &str = "postgres";
    pub const POSTGRES_PASSWORD: &str = "postgres";
    pub const POSTGRES_POOL_SIZE: usize = 10;
    pub const POOL_WAIT_TIMEOUT_MS: u64 = 5_000;
    pub const APPLICATION_NAME: &str = "dbprobe";

    pub const NEO4J_URI: &str = "bolt://localhost:7687";
    pub const NEO4J_PORT: u16 = 7687;
    pub const NEO4J_USER: &str = "neo4j";
    pub const NEO4J_PASSWORD: &str = "password";
    pub const NEO4J_DATABASE: &str = "neo4j";
    pub const NEO4J_MAX_CONNECTIONS: usize = 16;
    pub const NEO4J_FETCH_SIZE: usize = 200;

    pub const CONNECT_TIMEOUT_MS: u64 = 5_000;
    pub const HEALTH_TIMEOUT_MS: u64 = 5_000;
}

/// Environment variable names.
pub mod keys {
    pub const POSTGRES_HOST: &str = "POSTGRES_HOST";
    pub const POSTGRES_PORT: &str = "POSTGRES_PORT";
    pub const POSTGRES_DB: &str = "POSTGRES_DB";
    pub const POSTGRES_USER: &str = "POSTGRES_USER";
    pub const POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
    pub const POSTGRES_POOL_SIZE: &str = "POSTGRES_POOL_SIZE";

    pub const NEO4J_URI: &str = "NEO4J_URI";
    pub const NEO4J_USER: &str = "NEO4J_USER";
    pub const NEO4J_PASSWORD: &str = "NEO4J_PASSWORD";
    pub const NEO4J_DATABASE: &str = "NEO4J_DATABASE";
    pub const NEO4J_MAX_CONNECTIONS: &str = "NEO4J_MAX_CONNECTIONS";

    pub const CONNECT_TIMEOUT_MS: &str = "DBPROBE_CONNECT_TIMEOUT_MS";
    pub const HEALTH_TIMEOUT_MS: &str = "DBPROBE_HEALTH_TIMEOUT_MS";
}

/// Resolved configuration for both probes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarnessConfig {
    /// PostgreSQL probe settings
    pub relational: RelationalConfig,
    /// Neo4j probe settings
    pub graph: GraphConfig,
}

impl HarnessConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> ProbeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ProbeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let timeouts = ProbeTimeouts {
            connect_timeout_ms: env.parsed(keys::CONNECT_TIMEOUT_MS, defaults::CONNECT_TIMEOUT_MS)?,
            health_timeout_ms: env.parsed(keys::HEALTH_TIMEOUT_MS, defaults::HEALTH_TIMEOUT_MS)?,
        };

        let relational = RelationalConfig {
            host: env.string(keys::POSTGRES_HOST, defaults::POSTGRES_HOST),
            port: env.parsed(keys::POSTGRES_PORT, defaults::POSTGRES_PORT)?,
            database: env.string(keys::POSTGRES_DB, defaults::POSTGRES_DB),
            username: env.string(keys::POSTGRES_USER, defaults::POSTGRES_USER),
            password: env.secret(keys::POSTGRES_PASSWORD, defaults::POSTGRES_PASSWORD),
            application_name: defaults::APPLICATION_NAME.to_string(),
            pool: PoolOptions {
                max_size: env.parsed(keys::POSTGRES_POOL_SIZE, defaults::POSTGRES_POOL_SIZE)?,
                wait_timeout_ms: defaults::POOL_WAIT_TIMEOUT_MS,
            },
            timeouts,
        };
        relational.validate()?;

        let graph = GraphConfig {
            uri: env.string(keys::NEO4J_URI, defaults::NEO4J_URI),
            username: env.string(keys::NEO4J_USER, defaults::NEO4J_USER),
            password: env.secret(keys::NEO4J_PASSWORD, defaults::NEO4J_PASSWORD),
            database: env.string(keys::NEO4J_DATABASE, defaults::NEO4J_DATABASE),
            max_connections: env
                .parsed(keys::NEO4J_MAX_CONNECTIONS, defaults::NEO4J_MAX_CONNECTIONS)?,
            fetch_size: defaults::NEO4J_FETCH_SIZE,
            timeouts,
        };
        graph.validate()?;

        tracing::debug!(
            postgres = %relational.display_url(),
            neo4j = %graph.uri,
            connect_timeout_ms = timeouts.connect_timeout_ms,
            health_timeout_ms = timeouts.health_timeout_ms,
            "Resolved probe configuration"
        );

        Ok(Self { relational, graph })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Credentials are taken verbatim; surrounding whitespace is significant.
    fn secret(&self, key: &str, default: &str) -> Secret {
        let raw = (self.0)(key).filter(|v| !v.is_empty());
        Secret::new(raw.unwrap_or_else(|| default.to_string()))
    }

    fn parsed<T>(&self, key: &str, default: T) -> ProbeResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| ProbeError::config(format!("{key}='{raw}' is invalid: {e}"))),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = HarnessConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.relational.host, "localhost");
        assert_eq!(config.relational.port, 5432);
        assert_eq!(config.relational.database, "identity_service");
        assert_eq!(config.graph.uri, "bolt://localhost:7687");
        assert_eq!(config.graph.database, "neo4j");
        assert_eq!(config.relational.timeouts.connect_timeout_ms, 5_000);
    }

    #[test]
    fn overrides_are_applied() {
        let config = HarnessConfig::from_lookup(lookup(&[
            ("POSTGRES_HOST", "pg.internal"),
            ("POSTGRES_PORT", "6543"),
            ("POSTGRES_POOL_SIZE", "3"),
            ("NEO4J_URI", "neo4j://graph.internal:7688"),
            ("NEO4J_DATABASE", "injuries"),
            ("DBPROBE_HEALTH_TIMEOUT_MS", "750"),
        ]))
        .unwrap();
        assert_eq!(config.relational.host, "pg.internal");
        assert_eq!(config.relational.port, 6543);
        assert_eq!(config.relational.pool.max_size, 3);
        assert_eq!(config.graph.address(), "graph.internal:7688");
        assert_eq!(config.graph.database, "injuries");
        assert_eq!(config.graph.timeouts.health_timeout_ms, 750);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = HarnessConfig::from_lookup(lookup(&[("POSTGRES_HOST", "  ")])).unwrap();
        assert_eq!(config.relational.host, "localhost");
    }

    #[test]
    fn invalid_numbers_name_the_key() {
        let err = HarnessConfig::from_lookup(lookup(&[("POSTGRES_PORT", "abc")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("POSTGRES_PORT"));
    }

    #[test]
    fn invalid_graph_uri_is_config_error() {
        let err =
            HarnessConfig::from_lookup(lookup(&[("NEO4J_URI", "localhost:7687")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn passwords_keep_surrounding_whitespace() {
        let config = HarnessConfig::from_lookup(lookup(&[
            ("POSTGRES_PASSWORD", "  pw  "),
            ("NEO4J_PASSWORD", "\tgraph pw"),
        ]))
        .unwrap();
        assert_eq!(config.relational.password.expose(), "  pw  ");
        assert_eq!(config.graph.password.expose(), "\tgraph pw");

        let config = HarnessConfig::from_lookup(lookup(&[("POSTGRES_PASSWORD", "")])).unwrap();
        assert_eq!(config.relational.password.expose(), "postgres");
    }

    #[test]
    fn serialized_config_omits_passwords() {
        let config =
            HarnessConfig::from_lookup(lookup(&[("POSTGRES_PASSWORD", "pg-secret")])).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("pg-secret"));
        assert!(!json.contains("password"));
    }
}
