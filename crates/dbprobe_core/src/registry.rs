//! Named probes and readiness aggregation.
//!
//! The registry maps a backend name to its probe. Probe handles are cloned out
//! of the map before any `.await`, so the lock is only held briefly.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::HarnessConfig;
use crate::error::ProbeResult;
use crate::models::HealthStatus;
use crate::probe::Probe;
use crate::services::{GraphProbe, RelationalProbe};

/// Aggregated health of every registered probe.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    /// Whether at least one probe is registered and all are reachable
    pub ready: bool,
    /// Health per probe name
    pub backends: BTreeMap<String, HealthStatus>,
    /// When aggregation finished
    pub checked_at: DateTime<Utc>,
}

impl ReadinessReport {
    /// Build a report from individual statuses.
    pub fn from_statuses(backends: BTreeMap<String, HealthStatus>) -> Self {
        let ready = !backends.is_empty() && backends.values().all(|s| s.reachable);
        Self {
            ready,
            backends,
            checked_at: Utc::now(),
        }
    }

    /// Names of probes that failed their check.
    pub fn unreachable(&self) -> Vec<&str> {
        self.backends
            .iter()
            .filter(|(_, status)| !status.reachable)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Probes keyed by name.
#[derive(Default)]
pub struct ProbeRegistry {
    probes: RwLock<HashMap<String, Arc<dyn Probe>>>,
}

impl ProbeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with unconnected `postgres` and `neo4j` probes.
    pub fn from_config(config: &HarnessConfig) -> Self {
        let registry = Self::new();
        registry.register("postgres", Arc::new(RelationalProbe::new(config.relational.clone())));
        registry.register("neo4j", Arc::new(GraphProbe::new(config.graph.clone())));
        registry
    }

    /// Add a probe, returning any probe previously registered under `name`.
    pub fn register(
        &self,
        name: impl Into<String>,
        probe: Arc<dyn Probe>,
    ) -> Option<Arc<dyn Probe>> {
        let name = name.into();
        tracing::debug!(name = %name, backend = %probe.backend(), "Registering probe");
        self.probes.write().insert(name, probe)
    }

    /// Get a probe by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Probe>> {
        self.probes.read().get(name).cloned()
    }

    /// Remove a probe. The caller is responsible for closing it.
    pub fn remove(&self, name: &str) -> Option<Arc<dyn Probe>> {
        let probe = self.probes.write().remove(name);
        if probe.is_some() {
            tracing::debug!(name = %name, "Removed probe from registry");
        }
        probe
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.probes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered probes.
    pub fn len(&self) -> usize {
        self.probes.read().len()
    }

    /// Check if no probes are registered.
    pub fn is_empty(&self) -> bool {
        self.probes.read().is_empty()
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn Probe>)> {
        let mut probes: Vec<_> =
            self.probes.read().iter().map(|(name, probe)| (name.clone(), probe.clone())).collect();
        probes.sort_by(|a, b| a.0.cmp(&b.0));
        probes
    }

    /// Connect every probe concurrently.
    pub async fn connect_all(&self) -> BTreeMap<String, ProbeResult<()>> {
        let probes = self.snapshot();
        let results = join_all(probes.iter().map(|(_, probe)| probe.connect())).await;
        probes.into_iter().map(|(name, _)| name).zip(results).collect()
    }

    /// Check every probe concurrently and aggregate the results.
    pub async fn check_all(&self) -> ReadinessReport {
        let probes = self.snapshot();
        let statuses = join_all(probes.iter().map(|(_, probe)| probe.check_health())).await;
        let report = ReadinessReport::from_statuses(
            probes.into_iter().map(|(name, _)| name).zip(statuses).collect(),
        );

        if report.ready {
            tracing::info!(backends = report.backends.len(), "All backends ready");
        } else {
            tracing::warn!(unreachable = ?report.unreachable(), "Backends not ready");
        }
        report
    }

    /// Close every probe. Probes stay registered in the `Closed` state.
    pub async fn close_all(&self) {
        let probes = self.snapshot();
        join_all(probes.iter().map(|(_, probe)| probe.close())).await;
        tracing::debug!(count = probes.len(), "Closed all probes");
    }
}
