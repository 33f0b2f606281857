//! Connection configuration, lifecycle state, and pool statistics models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::defaults;
use crate::error::{ProbeError, ProbeResult};

/// Which datastore a probe talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// PostgreSQL, through a connection pool.
    Postgres,
    /// Neo4j, through a Bolt driver.
    Neo4j,
}

impl Backend {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Neo4j => "neo4j",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a probe.
///
/// `Unconnected -> Connecting -> Ready <-> Degraded`, and any state may move
/// to the terminal `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeState {
    /// No pool or driver exists yet
    #[default]
    Unconnected,
    /// Connection in progress
    Connecting,
    /// Pool or driver verified
    Ready,
    /// Last health check failed; pool or driver kept
    Degraded,
    /// Torn down for good
    Closed,
}

impl ProbeState {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
            Self::Closed => "closed",
        }
    }

    /// Whether queries and health checks may run.
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Ready | Self::Degraded)
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A password that never shows up in debug output or logs.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value. Only pass this to drivers.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"********\"")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

/// Time bounds applied by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTimeouts {
    /// Bound on `connect()` in milliseconds
    pub connect_timeout_ms: u64,
    /// Bound on `check_health()` in milliseconds
    pub health_timeout_ms: u64,
}

impl ProbeTimeouts {
    /// Use the same bound for every operation.
    pub fn uniform(timeout: Duration) -> Self {
        let ms = timeout.as_millis() as u64;
        Self {
            connect_timeout_ms: ms,
            health_timeout_ms: ms,
        }
    }

    /// Connect bound as a duration.
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Health check bound as a duration.
    pub fn health(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    fn validate(&self) -> ProbeResult<()> {
        if self.connect_timeout_ms == 0 {
            return Err(ProbeError::config("Connect timeout must be greater than zero"));
        }
        if self.health_timeout_ms == 0 {
            return Err(ProbeError::config("Health timeout must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout_ms: defaults::CONNECT_TIMEOUT_MS,
            health_timeout_ms: defaults::HEALTH_TIMEOUT_MS,
        }
    }
}

/// Relational connection pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolOptions {
    /// Maximum number of pooled connections
    pub max_size: usize,
    /// How long a caller waits on an exhausted pool, in milliseconds
    pub wait_timeout_ms: u64,
}

impl PoolOptions {
    /// Wait bound as a duration.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: defaults::POSTGRES_POOL_SIZE,
            wait_timeout_ms: defaults::POOL_WAIT_TIMEOUT_MS,
        }
    }
}

/// Configuration for the relational (PostgreSQL) probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalConfig {
    /// Server hostname or IP
    pub host: String,
    /// Server port (default 5432)
    pub port: u16,
    /// Database (catalog) name, 1-63 chars
    pub database: String,
    /// Login username
    pub username: String,
    /// Login password
    #[serde(skip_serializing, default)]
    pub password: Secret,
    /// Application name sent to PostgreSQL
    pub application_name: String,
    /// Pool sizing
    pub pool: PoolOptions,
    /// Operation bounds
    pub timeouts: ProbeTimeouts,
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            host: defaults::POSTGRES_HOST.to_string(),
            port: defaults::POSTGRES_PORT,
            database: defaults::POSTGRES_DB.to_string(),
            username: defaults::POSTGRES_USER.to_string(),
            password: Secret::new(defaults::POSTGRES_PASSWORD),
            application_name: defaults::APPLICATION_NAME.to_string(),
            pool: PoolOptions::default(),
            timeouts: ProbeTimeouts::default(),
        }
    }
}

impl RelationalConfig {
    /// Create a builder starting from the documented defaults.
    pub fn builder() -> RelationalConfigBuilder {
        RelationalConfigBuilder { config: Self::default() }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ProbeResult<()> {
        if self.host.trim().is_empty() {
            return Err(ProbeError::config("Host is required"));
        }
        if self.port == 0 {
            return Err(ProbeError::config("Port must be between 1 and 65535"));
        }
        if self.database.is_empty() || self.database.len() > 63 {
            return Err(ProbeError::config("Database name must be 1-63 characters"));
        }
        if self.username.is_empty() {
            return Err(ProbeError::config("Username is required"));
        }
        if self.pool.max_size == 0 {
            return Err(ProbeError::config("Pool size must be at least 1"));
        }
        self.timeouts.validate()
    }

    /// Get the display connection string (without password).
    pub fn display_url(&self) -> String {
        format!("postgresql://{}@{}:{}/{}", self.username, self.host, self.port, self.database)
    }
}

/// Builder for RelationalConfig.
#[derive(Debug)]
pub struct RelationalConfigBuilder {
    config: RelationalConfig,
}

impl RelationalConfigBuilder {
    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = database.into();
        self
    }

    /// Set the username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Secret::new(password);
        self
    }

    /// Set the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    /// Set the maximum pool size.
    pub fn pool_size(mut self, max_size: usize) -> Self {
        self.config.pool.max_size = max_size;
        self
    }

    /// Set how long callers wait on an exhausted pool.
    pub fn pool_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool.wait_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set operation bounds.
    pub fn timeouts(mut self, timeouts: ProbeTimeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProbeResult<RelationalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// URI schemes understood by the Bolt driver.
pub const GRAPH_URI_SCHEMES: &[&str] =
    &["bolt", "bolt+s", "bolt+ssc", "neo4j", "neo4j+s", "neo4j+ssc"];

/// Configuration for the graph (Neo4j) probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Driver endpoint, e.g. `bolt://localhost:7687`
    pub uri: String,
    /// Login username
    pub username: String,
    /// Login password
    #[serde(skip_serializing, default)]
    pub password: Secret,
    /// Default logical database
    pub database: String,
    /// Driver connection pool size
    pub max_connections: usize,
    /// Records fetched per round trip
    pub fetch_size: usize,
    /// Operation bounds
    pub timeouts: ProbeTimeouts,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: defaults::NEO4J_URI.to_string(),
            username: defaults::NEO4J_USER.to_string(),
            password: Secret::new(defaults::NEO4J_PASSWORD),
            database: defaults::NEO4J_DATABASE.to_string(),
            max_connections: defaults::NEO4J_MAX_CONNECTIONS,
            fetch_size: defaults::NEO4J_FETCH_SIZE,
            timeouts: ProbeTimeouts::default(),
        }
    }
}

impl GraphConfig {
    /// Create a configuration with the given endpoint and credentials.
    pub fn new(
        uri: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            username: username.into(),
            password: Secret::new(password),
            ..Self::default()
        }
    }

    /// Set the default database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the driver pool size.
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set the fetch size.
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    /// Set operation bounds.
    pub fn with_timeouts(mut self, timeouts: ProbeTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// URI scheme, if the URI has one.
    pub fn scheme(&self) -> Option<&str> {
        self.uri.split_once("://").map(|(scheme, _)| scheme)
    }

    /// `host:port` part of the URI, with the Bolt default port filled in.
    pub fn address(&self) -> String {
        let (host, port) = self.host_and_port();
        match port {
            Some(port) => format!("{host}:{port}"),
            None => format!("{host}:{}", defaults::NEO4J_PORT),
        }
    }

    /// Split the URI authority into host and explicit port text.
    ///
    /// Bracketed IPv6 hosts keep their brackets.
    fn host_and_port(&self) -> (&str, Option<&str>) {
        let rest = self.uri.split_once("://").map(|(_, rest)| rest).unwrap_or(&self.uri);
        let authority = rest.split(['/', '?']).next().unwrap_or_default();
        let authority = authority.rsplit('@').next().unwrap_or(authority);

        if authority.starts_with('[') {
            return match authority.find(']') {
                Some(end) => {
                    let (host, tail) = authority.split_at(end + 1);
                    (host, tail.strip_prefix(':'))
                }
                None => (authority, None),
            };
        }
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ProbeResult<()> {
        let Some(scheme) = self.scheme() else {
            return Err(ProbeError::config(format!(
                "Graph URI '{}' has no scheme (expected e.g. bolt://host:7687)",
                self.uri
            )));
        };
        if !GRAPH_URI_SCHEMES.contains(&scheme) {
            return Err(ProbeError::config(format!(
                "Unsupported graph URI scheme '{scheme}' (expected one of {})",
                GRAPH_URI_SCHEMES.join(", ")
            )));
        }
        let (host, port) = self.host_and_port();
        if host.is_empty() || host == "[]" {
            return Err(ProbeError::config("Graph URI is missing a host"));
        }
        if let Some(port) = port {
            match port.parse::<u16>() {
                Ok(p) if p > 0 => {}
                _ => {
                    return Err(ProbeError::config(format!(
                        "Graph URI port '{port}' is not a valid port (1-65535)"
                    )))
                }
            }
        }
        if self.username.is_empty() {
            return Err(ProbeError::config("Username is required"));
        }
        if self.database.is_empty() {
            return Err(ProbeError::config("Database name is required"));
        }
        if self.max_connections == 0 {
            return Err(ProbeError::config("Max connections must be at least 1"));
        }
        if self.fetch_size == 0 {
            return Err(ProbeError::config("Fetch size must be at least 1"));
        }
        self.timeouts.validate()
    }
}

/// Point-in-time connection pool occupancy.
///
/// `total >= idle` always holds; all counts are unsigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Maximum pool capacity
    pub max_size: usize,
    /// Current connections (idle + in use)
    pub total: usize,
    /// Idle connections
    pub idle: usize,
    /// Callers blocked on pool exhaustion
    pub waiting: usize,
}

impl PoolStats {
    /// Build a snapshot, clamping `idle` to `total`.
    pub fn new(max_size: usize, total: usize, idle: usize, waiting: usize) -> Self {
        Self {
            max_size,
            total,
            idle: idle.min(total),
            waiting,
        }
    }

    /// Get the number of in-use connections.
    pub fn active(&self) -> usize {
        self.total - self.idle
    }

    /// Check if the pool is healthy.
    pub fn is_healthy(&self) -> bool {
        self.waiting == 0
    }

    /// Get pool utilization as a percentage.
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            (self.active() as f64 / self.max_size as f64) * 100.0
        }
    }
}
