//! Health report and server introspection models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ErrorKind, ProbeError};
use crate::models::Backend;

/// Failure recorded inside a health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthError {
    /// Error classification
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Actionable suggestion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Normalized liveness report, identical in shape for every backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Backend that was checked
    pub backend: Backend,
    /// Whether every phase of the check succeeded
    pub reachable: bool,
    /// Server version string, when reachable
    pub server_version: Option<String>,
    /// Round-trip time of the check in milliseconds
    pub latency_ms: Option<u64>,
    /// Failure details, when unreachable
    pub error: Option<HealthError>,
    /// When the check finished
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    /// Create a report for a successful check.
    pub fn reachable(
        backend: Backend,
        server_version: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            backend,
            reachable: true,
            server_version: Some(server_version.into()),
            latency_ms: Some(latency.as_millis() as u64),
            error: None,
            checked_at: Utc::now(),
        }
    }

    /// Create a report for a failed check.
    pub fn unreachable(backend: Backend, error: &ProbeError, latency: Option<Duration>) -> Self {
        Self {
            backend,
            reachable: false,
            server_version: None,
            latency_ms: latency.map(|l| l.as_millis() as u64),
            error: Some(error.to_health_error()),
            checked_at: Utc::now(),
        }
    }

    /// Error classification, if the check failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// Address and agent of a graph server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// `host:port` the driver talks to
    pub address: String,
    /// Product/version agent string, e.g. `Neo4j/5.20.0`
    pub agent: String,
}

/// Graph server components, used for capability negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
    /// Product name, e.g. `Neo4j Kernel`
    pub name: String,
    /// Version strings reported by the server
    pub versions: Vec<String>,
    /// `community` or `enterprise`
    pub edition: String,
}

impl ServerMetadata {
    /// First reported version, if any.
    pub fn primary_version(&self) -> Option<&str> {
        self.versions.first().map(String::as_str)
    }

    /// Agent string in `Product/version` form.
    pub fn agent(&self) -> String {
        let product = self.name.split_whitespace().next().unwrap_or(&self.name);
        match self.primary_version() {
            Some(version) => format!("{product}/{version}"),
            None => product.to_string(),
        }
    }

    /// Major version number, if parsable.
    pub fn major_version(&self) -> Option<u32> {
        self.primary_version()?.split('.').next()?.parse().ok()
    }

    /// Whether the server runs the enterprise edition.
    pub fn is_enterprise(&self) -> bool {
        self.edition.eq_ignore_ascii_case("enterprise")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ServerMetadata {
        ServerMetadata {
            name: "Neo4j Kernel".to_string(),
            versions: vec!["5.20.0".to_string()],
            edition: "community".to_string(),
        }
    }

    #[test]
    fn agent_uses_product_and_version() {
        assert_eq!(metadata().agent(), "Neo4j/5.20.0");
        assert_eq!(metadata().major_version(), Some(5));
        assert!(!metadata().is_enterprise());
    }

    #[test]
    fn agent_without_versions() {
        let meta = ServerMetadata { versions: Vec::new(), ..metadata() };
        assert_eq!(meta.agent(), "Neo4j");
        assert_eq!(meta.major_version(), None);
    }

    #[test]
    fn unreachable_report_carries_error() {
        let err = ProbeError::timeout("health check", Duration::from_millis(100));
        let status = HealthStatus::unreachable(Backend::Postgres, &err, None);
        assert!(!status.reachable);
        assert_eq!(status.error_kind(), Some(ErrorKind::Timeout));
        assert!(status.server_version.is_none());
    }

    #[test]
    fn reachable_report_serializes() {
        let latency = Duration::from_millis(3);
        let status = HealthStatus::reachable(Backend::Neo4j, "Neo4j/5.20.0", latency);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["backend"], "neo4j");
        assert_eq!(json["reachable"], true);
        assert_eq!(json["latency_ms"], 3);
        assert!(json["error"].is_null());
    }
}
