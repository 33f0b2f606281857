//! Tests against a running Neo4j server.
//!
//! Configured through the usual `NEO4J_*` variables. Run with
//! `cargo test -p dbprobe_core -- --ignored`.

use dbprobe_core::{
    ErrorKind, GraphProbe, HarnessConfig, ProbeError, ProbeState, QueryParams, Value,
};
use futures_util::FutureExt;

fn config() -> dbprobe_core::GraphConfig {
    HarnessConfig::from_env().expect("valid environment").graph
}

#[tokio::test]
#[ignore = "requires a running Neo4j server"]
async fn return_one_yields_single_record() {
    let probe = GraphProbe::open(config()).await.unwrap();
    let result = probe.query("RETURN 1 AS number", QueryParams::None).await.unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.scalar("number"), Some(&Value::Integer(1)));
    assert_eq!(probe.open_sessions(), 0);
    probe.close().await;
}

#[tokio::test]
#[ignore = "requires a running Neo4j server"]
async fn health_reports_agent() {
    let probe = GraphProbe::open(config()).await.unwrap();
    let status = probe.check_health().await;
    assert!(status.reachable, "{:?}", status.error);
    assert!(status.server_version.unwrap_or_default().starts_with("Neo4j"));
    assert_eq!(probe.state(), ProbeState::Ready);
    probe.close().await;
}

#[tokio::test]
#[ignore = "requires a running Neo4j server"]
async fn repeated_named_query_is_identical() {
    let probe = GraphProbe::open(config()).await.unwrap();
    let cypher = "RETURN $name AS name, $age AS age";
    let params = QueryParams::named([("name", Value::from("Test User")), ("age", Value::from(25))]);

    let first = probe.query(cypher, params.clone()).await.unwrap();
    let second = probe.query(cypher, params).await.unwrap();
    assert!(first.same_data(&second));
    assert_eq!(first.scalar("age"), Some(&Value::Integer(25)));
    probe.close().await;
}

#[tokio::test]
#[ignore = "requires a running Neo4j server"]
async fn large_integers_are_boxed() {
    let probe = GraphProbe::open(config()).await.unwrap();
    let result = probe.query("RETURN 9007199254740993 AS big", QueryParams::None).await.unwrap();
    let big = result.scalar("big").unwrap();
    assert!(matches!(big, Value::LargeInteger(_)));
    assert_eq!(big.as_i64(), Some(9_007_199_254_740_993));
    probe.close().await;
}

#[tokio::test]
#[ignore = "requires a running Neo4j server"]
async fn scoped_sessions_are_released() {
    let probe = GraphProbe::open(config()).await.unwrap();
    let database = probe.config().database.clone();

    let number = probe
        .with_session(&database, |session| {
            async move {
                let result = session.run("RETURN 1 AS number", QueryParams::None).await?;
                Ok::<_, ProbeError>(result.scalar("number").and_then(Value::as_i64))
            }
            .boxed()
        })
        .await
        .unwrap();
    assert_eq!(number, Some(1));
    assert_eq!(probe.open_sessions(), 0);

    let failed = probe
        .with_session(&database, |session| {
            async move { session.run("RETURN $missing", QueryParams::None).await }.boxed()
        })
        .await;
    assert!(failed.is_err());
    assert_eq!(probe.open_sessions(), 0);
    probe.close().await;
}

#[tokio::test]
#[ignore = "requires a running Neo4j server"]
async fn server_metadata_lists_versions() {
    let probe = GraphProbe::open(config()).await.unwrap();
    let metadata = probe.server_metadata().await.unwrap();
    assert!(metadata.primary_version().is_some());
    assert!(metadata.major_version().unwrap_or_default() >= 4);
    probe.close().await;
}

#[tokio::test]
#[ignore = "requires a running Neo4j server"]
async fn query_after_close_is_closed_resource() {
    let probe = GraphProbe::open(config()).await.unwrap();
    probe.close().await;
    let err = probe.query("RETURN 1", QueryParams::None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClosedResource);
    assert_eq!(probe.open_sessions(), 0);
}
