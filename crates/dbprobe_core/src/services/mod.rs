//! Backend probes.
//!
//! - `relational` - PostgreSQL probe over a deadpool-postgres pool
//! - `graph` - Neo4j probe over the neo4rs driver, with scoped sessions
//! - `lifecycle` - State machine and timeout helper shared by both probes
//! - `pg_values` - PostgreSQL parameter coercion and row decoding

pub mod graph;
mod lifecycle;
mod pg_values;
pub mod relational;

pub use graph::{GraphProbe, GraphSession};
pub use relational::RelationalProbe;
