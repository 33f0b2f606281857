//! Connectivity verification for a PostgreSQL + Neo4j storage tier.
//!
//! This crate provides the probe layer for dbprobe:
//!
//! - **error**: Error taxonomy shared by both backends
//! - **models**: Configuration, health reports, query results, normalized values
//! - **config**: Environment-driven configuration with documented defaults
//! - **services**: The PostgreSQL and Neo4j probes
//! - **probe**: The backend-agnostic probe contract
//! - **registry**: Named probes and readiness aggregation
//! - **logging**: Structured logging setup

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod probe;
pub mod registry;
pub mod services;

#[cfg(test)]
mod verification_tests;

pub use config::HarnessConfig;
pub use error::{ErrorKind, ProbeError, ProbeResult};
pub use models::{
    normalize_integer, Backend, BoxedInteger, GraphConfig, HealthError, HealthStatus, PoolOptions,
    PoolStats, ProbeState, ProbeTimeouts, QueryParams, QueryResult, Record, RelationalConfig,
    Secret, ServerInfo, ServerMetadata, Value,
};
pub use probe::Probe;
pub use registry::{ProbeRegistry, ReadinessReport};
pub use services::{GraphProbe, GraphSession, RelationalProbe};
