//! Cross-cutting verification tests that need no running server.
//!
//! - Unreachable backends fail within their configured bound
//! - Health checks report instead of failing
//! - Every error kind a caller can act on carries a hint
//! - Passwords never reach debug output or serialized reports
//! - Large integers survive normalization losslessly

#[cfg(test)]
mod tests {
    use crate::config::HarnessConfig;
    use crate::error::{ErrorKind, ProbeError};
    use crate::models::{
        normalize_integer, GraphConfig, PoolStats, ProbeState, ProbeTimeouts, RelationalConfig,
        Value, MAX_SAFE_INTEGER,
    };
    use crate::probe::Probe;
    use crate::registry::ProbeRegistry;
    use crate::services::{GraphProbe, RelationalProbe};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::net::TcpListener;

    const BOUND: Duration = Duration::from_millis(250);

    async fn silent_port() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    // =========================================================================
    // Unreachable backends fail within the configured bound
    // =========================================================================

    #[tokio::test]
    async fn test_silent_backends_fail_within_bound() {
        let (_pg_listener, pg_port) = silent_port().await;
        let (_neo_listener, neo_port) = silent_port().await;

        let relational = RelationalConfig::builder()
            .host("127.0.0.1")
            .port(pg_port)
            .timeouts(ProbeTimeouts::uniform(BOUND))
            .build()
            .unwrap();
        let graph = GraphConfig::new(format!("bolt://127.0.0.1:{neo_port}"), "neo4j", "pw")
            .with_timeouts(ProbeTimeouts::uniform(BOUND));

        let probes: Vec<Arc<dyn Probe>> =
            vec![Arc::new(RelationalProbe::new(relational)), Arc::new(GraphProbe::new(graph))];

        for probe in probes {
            let started = Instant::now();
            let err = probe.connect().await.unwrap_err();
            let elapsed = started.elapsed();
            assert!(
                elapsed < BOUND * 8,
                "{} connect took {elapsed:?} with a {BOUND:?} bound",
                probe.backend()
            );
            assert!(err.is_transient(), "{err}");
            assert_eq!(probe.state(), ProbeState::Unconnected);
        }
    }

    // =========================================================================
    // Health checks report instead of failing
    // =========================================================================

    #[tokio::test]
    async fn test_readiness_of_unconnected_registry() {
        let registry = ProbeRegistry::from_config(&HarnessConfig::default());
        let report = registry.check_all().await;

        assert!(!report.ready);
        for status in report.backends.values() {
            assert!(!status.reachable);
            assert!(status.server_version.is_none());
            assert_eq!(status.error_kind(), Some(ErrorKind::InvalidState));
        }

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["backends"]["postgres"]["error"]["kind"], "invalid_state");
        assert_eq!(json["backends"]["neo4j"]["reachable"], false);
    }

    #[tokio::test]
    async fn test_pool_stats_invariants_hold_across_lifecycle() {
        let probe = RelationalProbe::new(RelationalConfig::default());
        let before = probe.pool_stats();
        assert!(before.total >= before.idle);
        probe.close().await;
        assert_eq!(probe.pool_stats(), PoolStats::default());
    }

    // =========================================================================
    // Every actionable error carries a hint
    // =========================================================================

    #[test]
    fn test_actionable_errors_have_hints() {
        let errors = [
            ProbeError::config("POSTGRES_PORT='abc' is invalid"),
            ProbeError::connection("connection refused"),
            ProbeError::authentication("password authentication failed"),
            ProbeError::timeout("connect to postgres", BOUND),
            ProbeError::closed("query"),
            ProbeError::invalid_state("query", ProbeState::Unconnected),
        ];
        for error in errors {
            let info = error.to_health_error();
            assert!(info.hint.is_some(), "{} has no hint", error.category());
            assert_eq!(info.kind, error.kind());
        }
        assert!(ProbeError::cancelled("query").hint().is_none());
    }

    // =========================================================================
    // Passwords never reach debug output or serialized reports
    // =========================================================================

    #[test]
    fn test_passwords_not_in_debug_or_reports() {
        let config = HarnessConfig::from_lookup(|key: &str| match key {
            "POSTGRES_PASSWORD" => Some("pg-hunter2".to_string()),
            "NEO4J_PASSWORD" => Some("neo-hunter2".to_string()),
            _ => None,
        })
        .unwrap();

        let relational = RelationalProbe::new(config.relational.clone());
        let graph = GraphProbe::new(config.graph.clone());
        let rendered = [
            format!("{config:?}"),
            format!("{relational:?}"),
            format!("{graph:?}"),
            serde_json::to_string(&config).unwrap(),
            config.relational.display_url(),
        ];
        for text in rendered {
            assert!(!text.contains("hunter2"), "password leaked: {text}");
        }
        assert_eq!(config.graph.password.expose(), "neo-hunter2");
    }

    // =========================================================================
    // Large integers survive normalization losslessly
    // =========================================================================

    #[test]
    fn test_large_integers_round_trip_through_reports() {
        let big = i64::MAX;
        let value = normalize_integer(big);
        assert_eq!(value.as_i64(), Some(big));
        assert_eq!(serde_json::to_value(&value).unwrap(), serde_json::json!(big.to_string()));

        let from_driver = Value::from_json(serde_json::json!(MAX_SAFE_INTEGER + 1));
        assert!(matches!(from_driver, Value::LargeInteger(_)));
        assert_eq!(Value::from_json(serde_json::json!(1)), Value::Integer(1));
    }
}
