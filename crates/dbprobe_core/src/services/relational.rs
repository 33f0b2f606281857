//! PostgreSQL probe backed by a deadpool-postgres connection pool.
//!
//! Provides:
//! - Pool creation validated with `SELECT 1` under the connect timeout
//! - Health checks that never fail, only report
//! - Prepared, type-coerced parameterized queries
//! - Pool occupancy snapshots

use std::sync::Arc;
use std::time::Instant;

use deadpool_postgres::{
    Manager, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime, TimeoutType,
};
use tokio_postgres::types::ToSql;
use tokio_postgres::{CancelToken, NoTls};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ProbeError, ProbeResult};
use crate::models::{
    Backend, HealthStatus, PoolStats, ProbeState, QueryParams, QueryResult, RelationalConfig, Value,
};
use crate::services::lifecycle::{bounded, Lifecycle};
use crate::services::pg_values::{bind_params, row_to_record, unique_column_names};

const VERSION_SQL: &str = "SELECT current_setting('server_version')";

/// Connectivity probe for PostgreSQL.
pub struct RelationalProbe {
    /// Identifier used in log events
    id: Uuid,
    config: Arc<RelationalConfig>,
    lifecycle: Lifecycle<Pool>,
}

impl RelationalProbe {
    /// Create an unconnected probe.
    pub fn new(config: RelationalConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config: Arc::new(config),
            lifecycle: Lifecycle::new(Backend::Postgres),
        }
    }

    /// Create a probe and connect it.
    pub async fn open(config: RelationalConfig) -> ProbeResult<Self> {
        let probe = Self::new(config);
        probe.connect().await?;
        Ok(probe)
    }

    /// Get the probe's identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the configuration.
    pub fn config(&self) -> &RelationalConfig {
        &self.config
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> ProbeState {
        self.lifecycle.state()
    }

    /// Build the pool and validate one connection.
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
            bounded("connect to postgres", timeout, self.establish()).await
        };

        match attempt.await {
            Ok(pool) => {
                if let Err(pool) = self.lifecycle.install(pool) {
                    pool.close();
                    return Err(ProbeError::closed("connect"));
                }
                tracing::info!(
                    probe_id = %self.id,
                    host = %self.config.host,
                    database = %self.config.database,
                    max_size = self.config.pool.max_size,
                    "Connection pool created successfully"
                );
                Ok(())
            }
            Err(e) => {
                self.lifecycle.abort_connect();
                tracing::warn!(
                    probe_id = %self.id,
                    url = %self.config.display_url(),
                    error = %e,
                    "Failed to connect to PostgreSQL"
                );
                Err(e)
            }
        }
    }

    async fn establish(&self) -> ProbeResult<Pool> {
        let pool = build_pool(&self.config)?;

        // Validate connection by establishing a test connection
        let client = pool.get().await.map_err(|e| pool_error(e, &self.config))?;
        client.execute("SELECT 1", &[]).await?;
        drop(client);

        Ok(pool)
    }

    /// Check liveness with a version round trip.
    ///
    /// Never returns an error; failures are reported in the status. Moves the
    /// probe between `Ready` and `Degraded`.
    pub async fn check_health(&self) -> HealthStatus {
        let pool = match self.lifecycle.acquire("check health") {
            Ok(pool) => pool,
            Err(e) => return HealthStatus::unreachable(Backend::Postgres, &e, None),
        };

        let started = Instant::now();
        let outcome = bounded("postgres health check", self.config.timeouts.health(), async {
            let client = self.client(&pool).await?;
            client.server_version().await
        })
        .await;
        let latency = started.elapsed();

        let status = match outcome {
            Ok(version) => {
                tracing::debug!(
                    probe_id = %self.id,
                    version = %version,
                    latency_ms = latency.as_millis() as u64,
                    "PostgreSQL health check passed"
                );
                HealthStatus::reachable(Backend::Postgres, version, latency)
            }
            Err(e) => {
                tracing::warn!(probe_id = %self.id, error = %e, "PostgreSQL health check failed");
                HealthStatus::unreachable(Backend::Postgres, &e, Some(latency))
            }
        };
        self.lifecycle.record_health(status.reachable);
        status
    }

    /// Run a statement with positional parameters (`$1`, `$2`, ...).
    pub async fn query(&self, text: &str, params: QueryParams) -> ProbeResult<QueryResult> {
        let values = positional(params)?;
        let pool = self.lifecycle.acquire("query")?;
        let client = self.client(&pool).await?;
        self.run(&client, text, &values).await
    }

    /// Run a statement, abandoning it as soon as `cancel` fires.
    ///
    /// On cancellation the server is asked to stop the running statement
    /// before the pooled client goes back to the pool.
    pub async fn query_cancellable(
        &self,
        text: &str,
        params: QueryParams,
        cancel: CancellationToken,
    ) -> ProbeResult<QueryResult> {
        if cancel.is_cancelled() {
            return Err(ProbeError::cancelled("query"));
        }
        let values = positional(params)?;
        let pool = self.lifecycle.acquire("query")?;

        let client = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::cancelled("query")),
            client = self.client(&pool) => client?,
        };
        let server_side = client.client.cancel_token();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.cancel_on_server(server_side).await;
                Err(ProbeError::cancelled("query"))
            }
            result = self.run(&client, text, &values) => result,
        }
    }

    async fn run(
        &self,
        client: &PooledClient,
        text: &str,
        values: &[Value],
    ) -> ProbeResult<QueryResult> {
        tracing::debug!(probe_id = %self.id, params = values.len(), "Executing query");
        let result = client.query(text, values).await?;
        tracing::debug!(
            probe_id = %self.id,
            execution_time_ms = result.execution_time_ms,
            row_count = result.row_count(),
            "Query completed"
        );
        Ok(result)
    }

    async fn cancel_on_server(&self, token: CancelToken) {
        let request = async { token.cancel_query(NoTls).await.map_err(ProbeError::from) };
        match bounded("cancel postgres query", self.config.timeouts.connect(), request).await {
            Ok(()) => tracing::debug!(probe_id = %self.id, "Query cancelled on server"),
            Err(e) => {
                tracing::warn!(probe_id = %self.id, error = %e, "Failed to cancel query on server")
            }
        }
    }

    /// Get the server version string.
    pub async fn server_version(&self) -> ProbeResult<String> {
        let pool = self.lifecycle.acquire("read server version")?;
        self.client(&pool).await?.server_version().await
    }

    /// Get current pool occupancy. Zeroed when no pool exists.
    pub fn pool_stats(&self) -> PoolStats {
        match self.lifecycle.acquire("read pool stats") {
            Ok(pool) => {
                let status = pool.status();
                PoolStats::new(status.max_size, status.size, status.available, status.waiting)
            }
            Err(_) => PoolStats::default(),
        }
    }

    /// Close the pool. Safe to call repeatedly and concurrently.
    pub async fn close(&self) {
        let (first, pool) = self.lifecycle.close();
        if let Some(pool) = pool {
            pool.close();
            tracing::info!(probe_id = %self.id, "Connection pool closed");
        } else if first {
            tracing::debug!(probe_id = %self.id, "Probe closed before a pool was created");
        }
    }

    async fn client(&self, pool: &Pool) -> ProbeResult<PooledClient> {
        let client = pool.get().await.map_err(|e| pool_error(e, &self.config))?;
        Ok(PooledClient { client })
    }
}

impl std::fmt::Debug for RelationalProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalProbe")
            .field("id", &self.id)
            .field("url", &self.config.display_url())
            .field("state", &self.state())
            .finish()
    }
}

fn positional(params: QueryParams) -> ProbeResult<Vec<Value>> {
    match params {
        QueryParams::None => Ok(Vec::new()),
        QueryParams::Positional(values) => Ok(values),
        QueryParams::Named(_) => Err(ProbeError::query(
            "PostgreSQL statements take positional parameters",
            None,
            Some("Use $1, $2, ... placeholders with QueryParams::positional".to_string()),
            None,
            None,
        )),
    }
}

fn build_pool(config: &RelationalConfig) -> ProbeResult<Pool> {
    let connect_timeout = config.timeouts.connect();

    let mut pg_config = tokio_postgres::Config::new();
    pg_config.host(&config.host);
    pg_config.port(config.port);
    pg_config.dbname(&config.database);
    pg_config.user(&config.username);
    pg_config.password(config.password.expose());
    pg_config.application_name(&config.application_name);
    pg_config.connect_timeout(connect_timeout);
    pg_config.keepalives(true);

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig { recycling_method: RecyclingMethod::Fast },
    );

    Pool::builder(manager)
        .max_size(config.pool.max_size)
        .wait_timeout(Some(config.pool.wait_timeout()))
        .create_timeout(Some(connect_timeout))
        .recycle_timeout(Some(connect_timeout))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| ProbeError::config(format!("Failed to create pool: {e}")))
}

/// Map a pool failure, naming the bound that was exceeded.
fn pool_error(err: PoolError, config: &RelationalConfig) -> ProbeError {
    match err {
        PoolError::Backend(e) => ProbeError::from(e),
        PoolError::Closed => ProbeError::closed("acquire a pooled connection"),
        PoolError::Timeout(TimeoutType::Wait) => {
            ProbeError::timeout("wait for a pooled connection", config.pool.wait_timeout())
        }
        PoolError::Timeout(TimeoutType::Create) => {
            ProbeError::timeout("open a pooled connection", config.timeouts.connect())
        }
        PoolError::Timeout(TimeoutType::Recycle) => {
            ProbeError::timeout("recycle a pooled connection", config.timeouts.connect())
        }
        other => ProbeError::connection(format!("Failed to acquire connection: {other}")),
    }
}

/// A client checked out of the pool. Returns to the pool when dropped.
struct PooledClient {
    client: deadpool_postgres::Client,
}

impl PooledClient {
    /// Prepare, bind against the declared parameter types, run, normalize.
    async fn query(&self, sql: &str, values: &[Value]) -> ProbeResult<QueryResult> {
        let started = Instant::now();

        let statement = self.client.prepare_cached(sql).await?;
        let params = bind_params(values, statement.params())?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let rows = self.client.query(&statement, &refs).await?;

        let columns = unique_column_names(statement.columns().iter().map(|c| c.name()));
        let records = rows
            .iter()
            .map(|row| row_to_record(row, &columns))
            .collect::<ProbeResult<Vec<_>>>()?;

        Ok(QueryResult {
            columns,
            records,
            execution_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn server_version(&self) -> ProbeResult<String> {
        let row = self.client.query_one(VERSION_SQL, &[]).await?;
        Ok(row.try_get(0)?)
    }
}
