//! Data models for connectivity probes.
//!
//! - `connection` - RelationalConfig, GraphConfig, ProbeState, PoolStats
//! - `health` - HealthStatus, ServerInfo, ServerMetadata
//! - `query` - QueryParams, QueryResult, Record
//! - `value` - Value and large-integer normalization

pub mod connection;
pub mod health;
pub mod query;
pub mod value;

pub use connection::{
    Backend, GraphConfig, PoolOptions, PoolStats, ProbeState, ProbeTimeouts, RelationalConfig,
    RelationalConfigBuilder, Secret, GRAPH_URI_SCHEMES,
};
pub use health::{HealthError, HealthStatus, ServerInfo, ServerMetadata};
pub use query::{QueryParams, QueryResult, Record};
pub use value::{normalize_integer, BoxedInteger, Value, MAX_SAFE_INTEGER, MIN_SAFE_INTEGER};
