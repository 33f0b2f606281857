//! Neo4j probe backed by the neo4rs Bolt driver.
//!
//! The driver owns its own connection pool. Every query runs inside a scoped
//! [`GraphSession`] bound to one logical database; sessions are counted so
//! callers can confirm none leak.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::future::BoxFuture;
use neo4rs::{
    BoltList, BoltMap, BoltNode, BoltNull, BoltPath, BoltRelation, BoltType, ConfigBuilder, Graph,
    Query,
};
use uuid::Uuid;

use crate::error::{ProbeError, ProbeResult};
use crate::models::{
    normalize_integer, Backend, GraphConfig, HealthStatus, ProbeState, QueryParams, QueryResult,
    Record, ServerInfo, ServerMetadata, Value,
};
use crate::services::lifecycle::{bounded, Lifecycle};
use crate::services::pg_values::hex_bytes;

const COMPONENTS_CYPHER: &str = "CALL dbms.components() YIELD name, versions, edition";
const PING_CYPHER: &str = "RETURN 1 AS number";

/// Connectivity probe for Neo4j.
pub struct GraphProbe {
    /// Identifier used in log events
    id: Uuid,
    config: Arc<GraphConfig>,
    lifecycle: Lifecycle<Graph>,
    open_sessions: Arc<AtomicUsize>,
}

impl GraphProbe {
    /// Create an unconnected probe.
    pub fn new(config: GraphConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config: Arc::new(config),
            lifecycle: Lifecycle::new(Backend::Neo4j),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a probe and connect it.
    pub async fn open(config: GraphConfig) -> ProbeResult<Self> {
        let probe = Self::new(config);
        probe.connect().await?;
        Ok(probe)
    }

    /// Get the probe's identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> ProbeState {
        self.lifecycle.state()
    }

    /// Number of sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::Acquire)
    }

    /// Build the driver and verify it with `RETURN 1`.
    ///
    /// Bounded by the connect timeout. A repeated call on a connected probe is
    /// a no-op; a failed attempt leaves the probe `Unconnected`.
    pub async fn connect(&self) -> ProbeResult<()> {
        if !self.lifecycle.begin_connect()? {
            return Ok(());
        }

        let timeout = self.config.timeouts.connect();
        let attempt = async {
            self.config.validate()?;
            bounded("connect to neo4j", timeout, self.establish()).await
        };

        match attempt.await {
            Ok(graph) => {
                if self.lifecycle.install(graph).is_err() {
                    return Err(ProbeError::closed("connect"));
                }
                tracing::info!(
                    probe_id = %self.id,
                    uri = %self.config.uri,
                    database = %self.config.database,
                    max_connections = self.config.max_connections,
                    "Graph driver created successfully"
                );
                Ok(())
            }
            Err(e) => {
                self.lifecycle.abort_connect();
                tracing::warn!(
                    probe_id = %self.id,
                    uri = %self.config.uri,
                    error = %e,
                    "Failed to connect to Neo4j"
                );
                Err(e)
            }
        }
    }

    async fn establish(&self) -> ProbeResult<Graph> {
        let driver_config = ConfigBuilder::default()
            .uri(self.config.uri.as_str())
            .user(self.config.username.as_str())
            .password(self.config.password.expose())
            .db(self.config.database.as_str())
            .fetch_size(self.config.fetch_size)
            .max_connections(self.config.max_connections)
            .build()?;
        let graph = Graph::connect(driver_config).await?;

        // The driver connects lazily; force one round trip
        let session = GraphSession::open(graph.clone(), &self.config.database, &self.open_sessions);
        session.verify().await?;
        drop(session);

        Ok(graph)
    }

    /// Check liveness in two phases: server info, then a session round trip.
    ///
    /// Never returns an error; failures are reported in the status. Moves the
    /// probe between `Ready` and `Degraded`.
    pub async fn check_health(&self) -> HealthStatus {
        let graph = match self.lifecycle.acquire("check health") {
            Ok(graph) => graph,
            Err(e) => return HealthStatus::unreachable(Backend::Neo4j, &e, None),
        };

        let started = Instant::now();
        let outcome = bounded("neo4j health check", self.config.timeouts.health(), async {
            let info = self.server_info_on(&graph).await?;
            self.verify_connectivity_on(&graph).await?;
            Ok(info)
        })
        .await;
        let latency = started.elapsed();

        let status = match outcome {
            Ok(info) => {
                tracing::debug!(
                    probe_id = %self.id,
                    address = %info.address,
                    agent = %info.agent,
                    latency_ms = latency.as_millis() as u64,
                    "Neo4j health check passed"
                );
                HealthStatus::reachable(Backend::Neo4j, info.agent, latency)
            }
            Err(e) => {
                tracing::warn!(probe_id = %self.id, error = %e, "Neo4j health check failed");
                HealthStatus::unreachable(Backend::Neo4j, &e, Some(latency))
            }
        };
        self.lifecycle.record_health(status.reachable);
        status
    }

    /// Address and agent of the server, queried on the driver directly.
    pub async fn server_info(&self) -> ProbeResult<ServerInfo> {
        let graph = self.lifecycle.acquire("read server info")?;
        self.server_info_on(&graph).await
    }

    /// Round trip `RETURN 1` inside a scoped session.
    pub async fn verify_connectivity(&self) -> ProbeResult<()> {
        let graph = self.lifecycle.acquire("verify connectivity")?;
        self.verify_connectivity_on(&graph).await
    }

    /// Server components, for capability negotiation.
    pub async fn server_metadata(&self) -> ProbeResult<ServerMetadata> {
        let graph = self.lifecycle.acquire("read server metadata")?;
        self.metadata_on(&graph).await
    }

    /// Open a session bound to `database`. An empty name means the
    /// configured default.
    pub fn session(&self, database: &str) -> ProbeResult<GraphSession> {
        let graph = self.lifecycle.acquire("open a session")?;
        Ok(GraphSession::open(graph, self.database_or_default(database), &self.open_sessions))
    }

    /// Run `f` with a session that is closed afterwards, whatever `f` returns.
    pub async fn with_session<T, F>(&self, database: &str, f: F) -> ProbeResult<T>
    where
        F: for<'s> FnOnce(&'s GraphSession) -> BoxFuture<'s, ProbeResult<T>>,
    {
        let session = self.session(database)?;
        let result = f(&session).await;
        session.close();
        result
    }

    /// Run a statement with named parameters on the default database.
    pub async fn query(&self, text: &str, params: QueryParams) -> ProbeResult<QueryResult> {
        self.query_on(text, params, &self.config.database).await
    }

    /// Run a statement with named parameters on `database`.
    pub async fn query_on(
        &self,
        text: &str,
        params: QueryParams,
        database: &str,
    ) -> ProbeResult<QueryResult> {
        let query = build_query(text, &params)?;
        let session = self.session(database)?;

        tracing::debug!(
            probe_id = %self.id,
            session_id = %session.id(),
            database = %session.database(),
            params = params.len(),
            "Executing query"
        );
        let result = session.execute(query).await;
        session.close();

        let result = result?;
        tracing::debug!(
            probe_id = %self.id,
            execution_time_ms = result.execution_time_ms,
            row_count = result.row_count(),
            "Query completed"
        );
        Ok(result)
    }

    /// Drop the driver. Safe to call repeatedly and concurrently.
    ///
    /// Sessions still open keep their own driver handle until they end.
    pub async fn close(&self) {
        let (first, graph) = self.lifecycle.close();
        if let Some(graph) = graph {
            drop(graph);
            tracing::info!(
                probe_id = %self.id,
                open_sessions = self.open_sessions(),
                "Graph driver closed"
            );
        } else if first {
            tracing::debug!(probe_id = %self.id, "Probe closed before a driver was created");
        }
    }

    fn database_or_default<'a>(&'a self, database: &'a str) -> &'a str {
        if database.is_empty() {
            &self.config.database
        } else {
            database
        }
    }

    async fn server_info_on(&self, graph: &Graph) -> ProbeResult<ServerInfo> {
        let metadata = self.metadata_on(graph).await?;
        Ok(ServerInfo {
            address: self.config.address(),
            agent: metadata.agent(),
        })
    }

    async fn metadata_on(&self, graph: &Graph) -> ProbeResult<ServerMetadata> {
        let result = collect(graph, &self.config.database, neo4rs::query(COMPONENTS_CYPHER)).await?;
        let record = result
            .first()
            .ok_or_else(|| ProbeError::query_message("dbms.components() returned no rows"))?;
        parse_metadata(record)
    }

    async fn verify_connectivity_on(&self, graph: &Graph) -> ProbeResult<()> {
        let session = GraphSession::open(graph.clone(), &self.config.database, &self.open_sessions);
        let outcome = session.verify().await;
        session.close();
        outcome
    }
}

impl std::fmt::Debug for GraphProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphProbe")
            .field("id", &self.id)
            .field("uri", &self.config.uri)
            .field("state", &self.state())
            .field("open_sessions", &self.open_sessions())
            .finish()
    }
}

/// A scoped unit of work bound to one logical database.
///
/// Counted as open until dropped or closed.
pub struct GraphSession {
    id: Uuid,
    graph: Graph,
    database: String,
    counter: Arc<AtomicUsize>,
}

impl GraphSession {
    fn open(graph: Graph, database: &str, counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        let session = Self {
            id: Uuid::new_v4(),
            graph,
            database: database.to_string(),
            counter: counter.clone(),
        };
        tracing::trace!(session_id = %session.id, database = %session.database, "Session opened");
        session
    }

    /// Get the session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Logical database the session runs against.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Run a statement with named parameters.
    pub async fn run(&self, text: &str, params: QueryParams) -> ProbeResult<QueryResult> {
        self.execute(build_query(text, &params)?).await
    }

    /// End the session.
    pub fn close(self) {}

    async fn execute(&self, query: Query) -> ProbeResult<QueryResult> {
        collect(&self.graph, &self.database, query).await
    }

    async fn verify(&self) -> ProbeResult<()> {
        let result = self.execute(neo4rs::query(PING_CYPHER)).await?;
        match result.scalar("number").and_then(Value::as_i64) {
            Some(1) => Ok(()),
            other => Err(ProbeError::query_message(format!(
                "Connectivity check returned {other:?} instead of 1"
            ))),
        }
    }
}

impl Drop for GraphSession {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
        tracing::trace!(session_id = %self.id, "Session closed");
    }
}

impl std::fmt::Debug for GraphSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSession")
            .field("id", &self.id)
            .field("database", &self.database)
            .finish()
    }
}

fn build_query(text: &str, params: &QueryParams) -> ProbeResult<Query> {
    let mut query = neo4rs::query(text);
    match params {
        QueryParams::None => {}
        QueryParams::Named(values) => {
            for (name, value) in values {
                query = query.param(name, to_bolt(value));
            }
        }
        QueryParams::Positional(_) => {
            return Err(ProbeError::query(
                "Cypher statements take named parameters",
                None,
                Some("Use $name placeholders with QueryParams::named".to_string()),
                None,
                None,
            ))
        }
    }
    Ok(query)
}

/// Convert a normalized value into a Bolt value. Boxed integers widen back to
/// their exact 64-bit value.
fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(v) => BoltType::from(*v),
        Value::Integer(v) => BoltType::from(*v),
        Value::LargeInteger(v) => BoltType::from(v.to_i64()),
        Value::Float(v) => BoltType::from(*v),
        Value::String(v) => BoltType::from(v.as_str()),
        Value::List(items) => {
            let mut list = BoltList::with_capacity(items.len());
            for item in items {
                list.push(to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Map(entries) => {
            let mut map = BoltMap::with_capacity(entries.len());
            for (key, item) in entries {
                map.put(key.as_str().into(), to_bolt(item));
            }
            BoltType::Map(map)
        }
    }
}

/// Run `query` and normalize every row.
///
/// neo4rs 0.8 keys rows by field name and does not expose the field list of
/// the stream, so columns come back in sorted name order and a query with no
/// rows reports no columns.
async fn collect(graph: &Graph, database: &str, query: Query) -> ProbeResult<QueryResult> {
    let started = Instant::now();
    let mut stream = graph.execute_on(database, query).await?;

    let mut records = Vec::new();
    while let Some(row) = stream.next().await? {
        records.push(row_to_record(&row)?);
    }

    Ok(QueryResult {
        columns: record_columns(&records),
        records,
        execution_time_ms: started.elapsed().as_millis() as u64,
    })
}

fn record_columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns.sort();
    columns
}

fn row_to_record(row: &neo4rs::Row) -> ProbeResult<Record> {
    let fields: HashMap<String, BoltType> = row.to()?;
    fields.into_iter().map(|(name, value)| Ok((name, from_bolt(&value)?))).collect()
}

/// Convert a driver value into the normalized value model.
///
/// Graph entities become maps: nodes keep `id`, `labels` and `properties`;
/// relationships keep `id`, `type`, `start`, `end` and `properties`. Temporal
/// values render as ISO 8601 text and bytes as `\x`-prefixed hex.
fn from_bolt(value: &BoltType) -> ProbeResult<Value> {
    let value = match value {
        BoltType::Null(_) => Value::Null,
        BoltType::Boolean(v) => Value::Bool(v.value),
        BoltType::Integer(v) => normalize_integer(v.value),
        BoltType::Float(v) => Value::Float(v.value),
        BoltType::String(v) => Value::String(v.value.clone()),
        BoltType::Bytes(v) => Value::String(hex_bytes(&v.value)),
        BoltType::List(items) => Value::List(from_bolt_list(items)?),
        BoltType::Map(entries) => Value::Map(from_bolt_map(entries)?),
        BoltType::Node(node) => node_value(node)?,
        BoltType::Relation(rel) => relation_value(rel)?,
        BoltType::UnboundedRelation(rel) => entity(&[
            ("id", normalize_integer(rel.id.value)),
            ("type", Value::String(rel.typ.value.clone())),
            ("properties", Value::Map(from_bolt_map(&rel.properties)?)),
        ]),
        BoltType::Path(path) => path_value(path)?,
        BoltType::Point2D(p) => entity(&[
            ("srid", Value::Integer(p.sr_id.value)),
            ("x", Value::Float(p.x.value)),
            ("y", Value::Float(p.y.value)),
        ]),
        BoltType::Point3D(p) => entity(&[
            ("srid", Value::Integer(p.sr_id.value)),
            ("x", Value::Float(p.x.value)),
            ("y", Value::Float(p.y.value)),
            ("z", Value::Float(p.z.value)),
        ]),
        BoltType::Duration(_) => Value::String(duration_text(value)?),
        BoltType::Date(v) => Value::String(NaiveDate::try_from(v)?.to_string()),
        BoltType::Time(v) => {
            let (time, offset) = <(NaiveTime, FixedOffset)>::from(v);
            Value::String(format!("{time}{offset}"))
        }
        BoltType::LocalTime(v) => Value::String(NaiveTime::from(v).to_string()),
        BoltType::DateTime(v) => Value::String(DateTime::<FixedOffset>::try_from(v)?.to_rfc3339()),
        BoltType::LocalDateTime(v) => {
            Value::String(NaiveDateTime::try_from(v)?.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
        BoltType::DateTimeZoneId(v) => {
            let at = DateTime::<FixedOffset>::try_from(v)?;
            Value::String(format!("{}[{}]", at.to_rfc3339(), v.tz_id()))
        }
    };
    Ok(value)
}

fn from_bolt_list(items: &BoltList) -> ProbeResult<Vec<Value>> {
    items.value.iter().map(from_bolt).collect()
}

fn from_bolt_map(entries: &BoltMap) -> ProbeResult<std::collections::BTreeMap<String, Value>> {
    entries
        .value
        .iter()
        .map(|(key, item)| Ok((key.value.clone(), from_bolt(item)?)))
        .collect()
}

fn entity(fields: &[(&str, Value)]) -> Value {
    Value::Map(fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

fn node_value(node: &BoltNode) -> ProbeResult<Value> {
    Ok(entity(&[
        ("id", normalize_integer(node.id.value)),
        ("labels", Value::List(from_bolt_list(&node.labels)?)),
        ("properties", Value::Map(from_bolt_map(&node.properties)?)),
    ]))
}

fn relation_value(rel: &BoltRelation) -> ProbeResult<Value> {
    Ok(entity(&[
        ("id", normalize_integer(rel.id.value)),
        ("type", Value::String(rel.typ.value.clone())),
        ("start", normalize_integer(rel.start_node_id.value)),
        ("end", normalize_integer(rel.end_node_id.value)),
        ("properties", Value::Map(from_bolt_map(&rel.properties)?)),
    ]))
}

fn path_value(path: &BoltPath) -> ProbeResult<Value> {
    Ok(entity(&[
        ("nodes", Value::List(from_bolt_list(&path.nodes)?)),
        ("relationships", Value::List(from_bolt_list(&path.rels)?)),
        ("indices", Value::List(from_bolt_list(&path.indices)?)),
    ]))
}

/// Durations arrive folded into seconds and nanoseconds.
fn duration_text(value: &BoltType) -> ProbeResult<String> {
    let mut holder = BoltMap::with_capacity(1);
    holder.put("d".into(), value.clone());
    let (seconds, nanos): (i64, i64) = holder.get("d")?;
    if nanos == 0 {
        return Ok(format!("PT{seconds}S"));
    }
    let fraction = format!("{nanos:09}");
    Ok(format!("PT{seconds}.{}S", fraction.trim_end_matches('0')))
}

fn parse_metadata(record: &Record) -> ProbeResult<ServerMetadata> {
    let text = |field: &str| -> ProbeResult<String> {
        record
            .get(field)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ProbeError::query_message(format!("dbms.components() has no '{field}'")))
    };

    let versions = match record.get("versions") {
        Some(Value::List(items)) => {
            items.iter().filter_map(Value::as_str).map(String::from).collect()
        }
        _ => Vec::new(),
    };

    Ok(ServerMetadata {
        name: text("name")?,
        versions,
        edition: text("edition")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::ProbeTimeouts;
    use futures_util::FutureExt;
    use neo4rs::{BoltFloat, BoltInteger, BoltString};
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn config(port: u16) -> GraphConfig {
        GraphConfig::new(format!("bolt://127.0.0.1:{port}"), "neo4j", "password")
            .with_timeouts(ProbeTimeouts::uniform(Duration::from_millis(500)))
    }

    #[tokio::test]
    async fn new_probe_is_unconnected() {
        let probe = GraphProbe::new(config(7687));
        assert_eq!(probe.state(), ProbeState::Unconnected);
        assert_eq!(probe.open_sessions(), 0);
    }

    #[tokio::test]
    async fn session_before_connect_is_invalid_state() {
        let probe = GraphProbe::new(config(7687));
        assert_eq!(probe.session("neo4j").unwrap_err().kind(), ErrorKind::InvalidState);
        let err = probe.query("RETURN 1", QueryParams::None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(probe.open_sessions(), 0);
    }

    #[tokio::test]
    async fn with_session_before_connect_never_runs_closure() {
        let probe = GraphProbe::new(config(7687));
        let err = probe
            .with_session("neo4j", |_session| async { Ok::<_, ProbeError>(1) }.boxed())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn health_before_connect_reports_without_error() {
        let probe = GraphProbe::new(config(7687));
        let status = probe.check_health().await;
        assert!(!status.reachable);
        assert_eq!(status.backend, Backend::Neo4j);
        assert_eq!(status.error_kind(), Some(ErrorKind::InvalidState));
    }

    #[tokio::test]
    async fn unsupported_scheme_is_config_error() {
        let probe = GraphProbe::new(GraphConfig::new("http://localhost:7474", "neo4j", "pw"));
        assert_eq!(probe.connect().await.unwrap_err().kind(), ErrorKind::Config);
        assert_eq!(probe.state(), ProbeState::Unconnected);
    }

    #[tokio::test]
    async fn refused_connection_fails_within_bound() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = GraphProbe::new(config(port));
        let started = Instant::now();
        let err = probe.connect().await.unwrap_err();
        // The driver may retry until the bound cuts it off
        assert!(matches!(err.kind(), ErrorKind::Connection | ErrorKind::Timeout), "{err}");
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(probe.state(), ProbeState::Unconnected);
        assert_eq!(probe.open_sessions(), 0);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = GraphProbe::new(config(port));
        let err = probe.connect().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Timeout | ErrorKind::Connection), "{err}");
        assert_eq!(probe.open_sessions(), 0);
        drop(listener);
    }

    #[tokio::test]
    async fn closed_probe_rejects_everything() {
        let probe = GraphProbe::new(config(7687));
        probe.close().await;
        probe.close().await;
        assert_eq!(probe.connect().await.unwrap_err().kind(), ErrorKind::ClosedResource);
        assert_eq!(probe.session("").unwrap_err().kind(), ErrorKind::ClosedResource);
        let err = probe.query("RETURN 1", QueryParams::None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClosedResource);
        assert_eq!(
            probe.check_health().await.error_kind(),
            Some(ErrorKind::ClosedResource)
        );
    }

    #[test]
    fn positional_params_are_rejected() {
        let err = match build_query("RETURN $1", &QueryParams::positional([1])) {
            Ok(_) => panic!("positional parameters were accepted"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::Query);
        assert!(err.hint().unwrap_or_default().contains("$name"));
        assert!(build_query("RETURN $name", &QueryParams::named([("name", "Test User")])).is_ok());
    }

    #[test]
    fn values_convert_to_bolt() {
        assert!(matches!(to_bolt(&Value::Null), BoltType::Null(_)));
        assert!(matches!(to_bolt(&Value::Integer(25)), BoltType::Integer(_)));
        assert!(matches!(to_bolt(&normalize_integer(i64::MAX)), BoltType::Integer(_)));
        assert!(matches!(to_bolt(&Value::from("x")), BoltType::String(_)));
        assert!(matches!(
            to_bolt(&Value::List(vec![Value::from(1), Value::Null])),
            BoltType::List(_)
        ));
        let mut map = BTreeMap::new();
        map.insert("age".to_string(), Value::from(25));
        assert!(matches!(to_bolt(&Value::Map(map)), BoltType::Map(_)));
    }

    fn row(pairs: Vec<(&str, BoltType)>) -> neo4rs::Row {
        let (fields, data): (Vec<_>, Vec<_>) = pairs
            .into_iter()
            .map(|(name, value)| (BoltType::from(name), value))
            .unzip();
        neo4rs::Row::new(BoltList::from(fields), BoltList::from(data))
    }

    fn person(id: i64) -> BoltType {
        let mut labels = BoltList::new();
        labels.push(BoltType::from("Person"));
        let mut properties = BoltMap::new();
        properties.put(BoltString::from("name"), BoltType::from("Test User"));
        BoltType::Node(BoltNode::new(BoltInteger::new(id), labels, properties))
    }

    #[test]
    fn rows_keep_non_finite_floats() {
        let record = row_to_record(&row(vec![
            ("nan", BoltType::Float(BoltFloat::new(f64::NAN))),
            ("inf", BoltType::Float(BoltFloat::new(f64::INFINITY))),
        ]))
        .unwrap();
        assert!(matches!(record["nan"], Value::Float(v) if v.is_nan()));
        assert_eq!(record["inf"], Value::Float(f64::INFINITY));
    }

    #[test]
    fn nodes_keep_identity_and_labels() {
        let record = row_to_record(&row(vec![("p", person(7))])).unwrap();
        let Value::Map(node) = &record["p"] else {
            panic!("expected a map, got {:?}", record["p"]);
        };
        assert_eq!(node["id"], Value::Integer(7));
        assert_eq!(node["labels"], Value::List(vec![Value::from("Person")]));
        let Value::Map(properties) = &node["properties"] else {
            panic!("expected properties");
        };
        assert_eq!(properties["name"], Value::from("Test User"));
    }

    #[test]
    fn scalars_and_wide_integers_convert() {
        assert_eq!(from_bolt(&BoltType::Null(BoltNull)).unwrap(), Value::Null);
        assert_eq!(from_bolt(&BoltType::from(true)).unwrap(), Value::Bool(true));
        assert_eq!(from_bolt(&BoltType::from(i64::MAX)).unwrap(), normalize_integer(i64::MAX));

        let mut list = BoltList::new();
        list.push(person(1));
        list.push(BoltType::from(2.5_f64));
        let Value::List(items) = from_bolt(&BoltType::List(list)).unwrap() else {
            panic!("expected a list");
        };
        assert!(matches!(&items[0], Value::Map(node) if node["id"] == Value::Integer(1)));
        assert_eq!(items[1], Value::Float(2.5));
    }

    #[test]
    fn durations_render_in_seconds() {
        let long = BoltType::Duration(std::time::Duration::new(90, 500_000_000).into());
        assert_eq!(from_bolt(&long).unwrap(), Value::from("PT90.5S"));
        let whole = BoltType::Duration(std::time::Duration::from_secs(3).into());
        assert_eq!(from_bolt(&whole).unwrap(), Value::from("PT3S"));
    }

    #[test]
    fn columns_cover_every_record_in_name_order() {
        let first = row_to_record(&row(vec![
            ("name", BoltType::from("a")),
            ("age", BoltType::from(1_i64)),
        ]))
        .unwrap();
        assert_eq!(record_columns(&[first.clone()]), vec!["age", "name"]);
        assert_eq!(record_columns(&[first.clone(), first]), vec!["age", "name"]);
        assert!(record_columns(&[]).is_empty());
    }

    #[test]
    fn components_record_parses() {
        let mut record = Record::new();
        record.insert("name".to_string(), Value::from("Neo4j Kernel"));
        record.insert("versions".to_string(), Value::List(vec![Value::from("5.20.0")]));
        record.insert("edition".to_string(), Value::from("community"));
        let metadata = parse_metadata(&record).unwrap();
        assert_eq!(metadata.agent(), "Neo4j/5.20.0");

        record.remove("edition");
        assert_eq!(parse_metadata(&record).unwrap_err().kind(), ErrorKind::Query);
    }
}
