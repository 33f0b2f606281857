//! The backend-agnostic probe contract.
//!
//! Both probes follow the same lifecycle:
//! `Unconnected -> Connecting -> Ready <-> Degraded`, with `Closed` reachable
//! from every state and terminal.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{ProbeError, ProbeResult};
use crate::models::{Backend, HealthStatus, ProbeState, QueryParams, QueryResult};
use crate::services::{GraphProbe, RelationalProbe};

/// Connectivity probe for one datastore.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Backend this probe talks to.
    fn backend(&self) -> Backend;

    /// Current lifecycle state.
    fn state(&self) -> ProbeState;

    /// Create and verify the pool or driver. No-op when already connected.
    async fn connect(&self) -> ProbeResult<()>;

    /// Report liveness. Never fails; problems land in the status.
    async fn check_health(&self) -> HealthStatus;

    /// Run a read statement and normalize its records.
    async fn query(&self, text: &str, params: QueryParams) -> ProbeResult<QueryResult>;

    /// Release the pool or driver. Idempotent.
    async fn close(&self);

    /// Run a statement, giving up as soon as `cancel` fires.
    ///
    /// The pooled client or session the query held is released when its
    /// future is dropped.
    async fn query_cancellable(
        &self,
        text: &str,
        params: QueryParams,
        cancel: CancellationToken,
    ) -> ProbeResult<QueryResult> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(backend = %self.backend(), "Query cancelled");
                Err(ProbeError::cancelled("query"))
            }
            result = self.query(text, params) => result,
        }
    }
}

#[async_trait]
impl Probe for RelationalProbe {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    fn state(&self) -> ProbeState {
        RelationalProbe::state(self)
    }

    async fn connect(&self) -> ProbeResult<()> {
        RelationalProbe::connect(self).await
    }

    async fn check_health(&self) -> HealthStatus {
        RelationalProbe::check_health(self).await
    }

    async fn query(&self, text: &str, params: QueryParams) -> ProbeResult<QueryResult> {
        RelationalProbe::query(self, text, params).await
    }

    async fn query_cancellable(
        &self,
        text: &str,
        params: QueryParams,
        cancel: CancellationToken,
    ) -> ProbeResult<QueryResult> {
        RelationalProbe::query_cancellable(self, text, params, cancel).await
    }

    async fn close(&self) {
        RelationalProbe::close(self).await
    }
}

#[async_trait]
impl Probe for GraphProbe {
    fn backend(&self) -> Backend {
        Backend::Neo4j
    }

    fn state(&self) -> ProbeState {
        GraphProbe::state(self)
    }

    async fn connect(&self) -> ProbeResult<()> {
        GraphProbe::connect(self).await
    }

    async fn check_health(&self) -> HealthStatus {
        GraphProbe::check_health(self).await
    }

    async fn query(&self, text: &str, params: QueryParams) -> ProbeResult<QueryResult> {
        GraphProbe::query(self, text, params).await
    }

    async fn close(&self) {
        GraphProbe::close(self).await
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeProbe;
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{GraphConfig, RelationalConfig};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn cancellation_aborts_slow_query() {
        let probe =
            FakeProbe::new(Backend::Postgres, true).with_query_delay(Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = probe
            .query_cancellable("SELECT 1", QueryParams::None, cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn already_cancelled_token_never_runs_query() {
        let probe = FakeProbe::new(Backend::Neo4j, true);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = probe
            .query_cancellable("RETURN 1", QueryParams::None, cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn uncancelled_query_returns_result() {
        let probe = FakeProbe::new(Backend::Neo4j, true);
        let result = probe
            .query_cancellable("RETURN 1", QueryParams::None, CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn cancelled_relational_query_never_touches_the_pool() {
        let probe: Arc<dyn Probe> = Arc::new(RelationalProbe::new(RelationalConfig::default()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = probe
            .query_cancellable("SELECT 1", QueryParams::None, cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn real_probes_share_the_contract() {
        let probes: Vec<Arc<dyn Probe>> = vec![
            Arc::new(RelationalProbe::new(RelationalConfig::default())),
            Arc::new(GraphProbe::new(GraphConfig::default())),
        ];
        for probe in &probes {
            assert_eq!(probe.state(), ProbeState::Unconnected);
            let err = probe.query("RETURN 1", QueryParams::None).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidState);

            let status = probe.check_health().await;
            assert_eq!(status.backend, probe.backend());
            assert!(!status.reachable);

            probe.close().await;
            assert_eq!(probe.state(), ProbeState::Closed);
        }
    }
}
