//! Error types for connectivity probes.
//!
//! Every probe operation except `check_health` returns [`ProbeError`]. Health
//! checks fold the error into [`HealthError`] instead so readiness aggregation
//! can treat all backends the same way.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{HealthError, ProbeState};

/// Result alias used throughout the crate.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Coarse error classification exposed to callers and health reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required configuration missing or invalid.
    Config,
    /// Backend unreachable or credentials rejected.
    Connection,
    /// Operation exceeded its time bound.
    Timeout,
    /// Statement rejected by the backend.
    Query,
    /// Operation attempted after `close()`.
    ClosedResource,
    /// Operation not valid in the probe's current state.
    InvalidState,
    /// Operation cancelled by the caller.
    Cancelled,
}

impl ErrorKind {
    /// Stable string form, matching the serialized representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::Query => "query",
            Self::ClosedResource => "closed_resource",
            Self::InvalidState => "invalid_state",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Main error type for probe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Configuration missing or invalid. Never retried.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// Backend unreachable or authentication rejected.
    #[error("Connection error: {message}")]
    Connection {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the caller.
        hint: Option<String>,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An operation exceeded its bound.
    #[error("Timeout: {operation} did not complete within {}ms", .after.as_millis())]
    Timeout {
        /// Operation that timed out.
        operation: String,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// Statement rejected by the backend, with its diagnostics.
    #[error("{message}")]
    Query {
        /// Backend error message.
        message: String,
        /// Additional detail from the backend.
        detail: Option<String>,
        /// Backend hint.
        hint: Option<String>,
        /// Position in the statement (1-indexed).
        position: Option<usize>,
        /// Backend error code (SQLSTATE or Neo4j status code).
        code: Option<String>,
    },

    /// Operation attempted after the probe was closed.
    #[error("Resource closed: cannot {operation} after close()")]
    ClosedResource {
        /// Operation that was attempted.
        operation: String,
    },

    /// Operation not valid in the current lifecycle state.
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: String,
        /// State the probe was in.
        state: ProbeState,
    },

    /// Operation cancelled by the caller.
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// Operation that was cancelled.
        operation: String,
    },
}

impl ProbeError {
    // ========== Constructors ==========

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a new connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            hint: None,
            source: None,
        }
    }

    /// Create a new connection error with source.
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            hint: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create a connection error for rejected credentials.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            hint: Some("Check username and password".to_string()),
            source: None,
        }
    }

    /// Create a new timeout error.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Create a new query error with full backend details.
    pub fn query(
        message: impl Into<String>,
        detail: Option<String>,
        hint: Option<String>,
        position: Option<usize>,
        code: Option<String>,
    ) -> Self {
        Self::Query {
            message: message.into(),
            detail,
            hint,
            position,
            code,
        }
    }

    /// Create a query error carrying only a message.
    pub fn query_message(message: impl Into<String>) -> Self {
        Self::query(message, None, None, None, None)
    }

    /// Create a closed-resource error.
    pub fn closed(operation: impl Into<String>) -> Self {
        Self::ClosedResource { operation: operation.into() }
    }

    /// Create an invalid-state error.
    pub fn invalid_state(operation: impl Into<String>, state: ProbeState) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state,
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled { operation: operation.into() }
    }

    // ========== Methods ==========

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Query { .. } => ErrorKind::Query,
            Self::ClosedResource { .. } => ErrorKind::ClosedResource,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "Config",
            Self::Connection { .. } => "Connection",
            Self::Timeout { .. } => "Timeout",
            Self::Query { .. } => "Query",
            Self::ClosedResource { .. } => "Closed Resource",
            Self::InvalidState { .. } => "Invalid State",
            Self::Cancelled { .. } => "Cancelled",
        }
    }

    /// Get actionable hint for the caller.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Config { .. } => Some("Check the probe configuration and environment variables"),
            Self::Connection { hint: Some(hint), .. } => Some(hint.as_str()),
            Self::Connection { hint: None, .. } => {
                Some("Check that the database server is running and reachable")
            }
            Self::Timeout { .. } => Some("The server may be overloaded or the network slow"),
            Self::Query { hint, .. } => hint.as_deref(),
            Self::ClosedResource { .. } => {
                Some("Create a new probe; closed probes cannot be reused")
            }
            Self::InvalidState { .. } => Some("Call connect() before using the probe"),
            Self::Cancelled { .. } => None,
        }
    }

    /// Whether a caller could reasonably retry the operation later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Get backend error code (if applicable).
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Query { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Convert into the form carried by a health report.
    pub fn to_health_error(&self) -> HealthError {
        HealthError {
            kind: self.kind(),
            message: self.to_string(),
            hint: self.hint().map(String::from),
        }
    }
}

// ========== Error Conversions ==========

/// Convert from tokio_postgres::Error to ProbeError.
impl From<tokio_postgres::Error> for ProbeError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let message = db_err.message().to_string();
            let code_str = db_err.code().code();

            // Invalid authorization (28xxx) and connection exceptions (08xxx)
            if code_str.starts_with("28") {
                return ProbeError::Connection {
                    message,
                    hint: Some("Authentication failed - check username and password".to_string()),
                    source: None,
                };
            }
            if code_str.starts_with("08") || code_str == "3D000" {
                return ProbeError::Connection {
                    message,
                    hint: None,
                    source: Some(Box::new(err)),
                };
            }

            let position = db_err.position().and_then(|p| match p {
                tokio_postgres::error::ErrorPosition::Original(pos) => Some(*pos as usize),
                tokio_postgres::error::ErrorPosition::Internal { .. } => None,
            });
            return ProbeError::Query {
                message,
                detail: db_err.detail().map(String::from),
                hint: db_err.hint().map(String::from),
                position,
                code: Some(code_str.to_string()),
            };
        }

        if err.is_closed() {
            return ProbeError::connection_with_source("Connection closed", err);
        }

        ProbeError::Connection {
            message: err.to_string(),
            hint: None,
            source: Some(Box::new(err)),
        }
    }
}

/// Convert from neo4rs::Error to ProbeError.
impl From<neo4rs::Error> for ProbeError {
    fn from(err: neo4rs::Error) -> Self {
        match err {
            neo4rs::Error::AuthenticationError(message) => ProbeError::Connection {
                message,
                hint: Some(
                    "Authentication failed - check NEO4J_USER and NEO4J_PASSWORD".to_string(),
                ),
                source: None,
            },
            neo4rs::Error::InvalidConfig => {
                ProbeError::config("Invalid Neo4j driver configuration")
            }
            err @ (neo4rs::Error::UrlParseError(_)
            | neo4rs::Error::UnsupportedScheme(_)
            | neo4rs::Error::InvalidDnsName(_)) => {
                ProbeError::config(format!("Invalid NEO4J_URI: {err}"))
            }
            err @ (neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError) => {
                ProbeError::connection_with_source(err.to_string(), err)
            }
            other => ProbeError::query_message(other.to_string()),
        }
    }
}

/// Convert from neo4rs::DeError (record decoding) to ProbeError.
impl From<neo4rs::DeError> for ProbeError {
    fn from(err: neo4rs::DeError) -> Self {
        ProbeError::query(
            format!("Failed to decode record: {err}"),
            None,
            Some("The statement returned a value shape that cannot be normalized".to_string()),
            None,
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_taxonomy() {
        assert_eq!(ProbeError::config("x").kind(), ErrorKind::Config);
        assert_eq!(ProbeError::connection("x").kind(), ErrorKind::Connection);
        assert_eq!(ProbeError::authentication("x").kind(), ErrorKind::Connection);
        assert_eq!(
            ProbeError::timeout("connect", Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(ProbeError::query_message("x").kind(), ErrorKind::Query);
        assert_eq!(ProbeError::closed("query").kind(), ErrorKind::ClosedResource);
        assert_eq!(
            ProbeError::invalid_state("query", ProbeState::Unconnected).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(ProbeError::cancelled("query").kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn timeout_message_names_operation_and_bound() {
        let err = ProbeError::timeout("connect to postgres", Duration::from_millis(250));
        assert_eq!(err.to_string(), "Timeout: connect to postgres did not complete within 250ms");
    }

    #[test]
    fn authentication_keeps_credentials_hint() {
        let err = ProbeError::authentication("password authentication failed");
        assert_eq!(err.hint(), Some("Check username and password"));
    }

    #[test]
    fn query_hint_comes_from_backend() {
        let err = ProbeError::query(
            "syntax error at or near \"SELEC\"",
            None,
            Some("Check the statement".to_string()),
            Some(1),
            Some("42601".to_string()),
        );
        assert_eq!(err.hint(), Some("Check the statement"));
        assert_eq!(err.code(), Some("42601"));
        assert!(!err.is_transient());
    }

    #[test]
    fn only_connection_and_timeout_are_transient() {
        assert!(ProbeError::connection("refused").is_transient());
        assert!(ProbeError::timeout("health check", Duration::from_secs(5)).is_transient());
        assert!(!ProbeError::config("missing host").is_transient());
        assert!(!ProbeError::closed("query").is_transient());
    }

    #[test]
    fn health_error_carries_kind_message_and_hint() {
        let info = ProbeError::closed("query").to_health_error();
        assert_eq!(info.kind, ErrorKind::ClosedResource);
        assert_eq!(info.message, "Resource closed: cannot query after close()");
        assert!(info.hint.is_some());
    }

    #[test]
    fn invalid_state_mentions_state() {
        let err = ProbeError::invalid_state("query", ProbeState::Unconnected);
        assert_eq!(err.to_string(), "Invalid state: cannot query while unconnected");
    }

    #[test]
    fn neo4j_auth_error_is_connection() {
        let err = ProbeError::from(neo4rs::Error::AuthenticationError("bad creds".to_string()));
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.hint().unwrap_or_default().contains("NEO4J_PASSWORD"));
    }

    #[test]
    fn neo4j_invalid_config_is_config() {
        let err = ProbeError::from(neo4rs::Error::InvalidConfig);
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn neo4j_bad_uri_is_config() {
        let err = ProbeError::from(neo4rs::Error::UnsupportedScheme("http".to_string()));
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("NEO4J_URI"));

        let err = ProbeError::from(neo4rs::Error::InvalidDnsName("bad host".to_string()));
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
