// crates/protoctl-client/src/tests/discovery.rs
// ============================================================================
// Module: Discovery Tests
// Description: Static sources, cached reflection, and discovery failures.
// Purpose: Ensure schemas load without a server whenever possible.
// Dependencies: protoctl-client, protoctl-config, tempfile
// ============================================================================

use std::time::Duration;

use protoctl_config::SchemaCache;
use protoctl_schema::testing::example_model;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tonic::Code;
use tonic::Status;

use crate::discovery::DEFAULT_DISCOVERY_DEADLINE;
use crate::discovery::ReflectionSchemaSource;
use crate::discovery::SchemaSource;
use crate::discovery::StaticSchemaSource;
use crate::error::DiscoveryError;
use crate::headers::Headers;
use crate::target::CallTarget;
use crate::target::Protocol;

type TestResult = Result<(), String>;

/// Service names in model order.
fn service_names(model: &protoctl_schema::SchemaModel) -> Vec<String> {
    model.services().iter().map(|service| service.name().to_string()).collect()
}

#[tokio::test]
async fn static_source_serves_decoded_bytes() -> TestResult {
    let source = StaticSchemaSource::from_bytes(&example_model().encode())
        .map_err(|err| err.to_string())?;
    let model = source.load().await.map_err(|err| err.to_string())?;
    assert_eq!(service_names(&model), vec!["FooAPI", "BarAPI", "StreamAPI"]);
    Ok(())
}

#[test]
fn static_source_rejects_garbage() {
    assert!(matches!(
        StaticSchemaSource::from_bytes(b"\xff\xff\xff"),
        Err(DiscoveryError::Schema(_))
    ));
}

#[tokio::test]
async fn cached_schema_skips_the_server() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("cache.yaml");
    let address = "127.0.0.1:9";
    let mut cache = SchemaCache::load(&path).map_err(|err| err.to_string())?;
    cache.put(address, &example_model().encode()).map_err(|err| err.to_string())?;

    let source = ReflectionSchemaSource::new(
        CallTarget::new(address, Protocol::Grpc, true),
        Headers::new(),
    )
    .with_cache(&path);
    let model = source.load().await.map_err(|err| err.to_string())?;
    assert_eq!(service_names(&model), vec!["FooAPI", "BarAPI", "StreamAPI"]);
    Ok(())
}

#[tokio::test]
async fn unreachable_server_reports_a_retryable_error() -> TestResult {
    let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|err| err.to_string())?;
    let address = listener.local_addr().map_err(|err| err.to_string())?.to_string();
    drop(listener);
    let source = ReflectionSchemaSource::new(
        CallTarget::new(address, Protocol::Grpc, true),
        Headers::new(),
    );
    let Err(err) = source.load().await else {
        return Err("expected discovery to fail".to_string());
    };
    assert!(err.is_retryable(), "unexpected error: {err}");
    Ok(())
}

#[tokio::test]
async fn silent_server_hits_the_deadline() -> TestResult {
    let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|err| err.to_string())?;
    let address = listener.local_addr().map_err(|err| err.to_string())?.to_string();
    let accept = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    let source = ReflectionSchemaSource::new(
        CallTarget::new(address, Protocol::Grpc, true),
        Headers::new(),
    )
    .with_deadline(Duration::from_millis(200));
    let result = source.load().await;
    accept.abort();
    assert!(matches!(result, Err(DiscoveryError::Timeout { millis: 200 })));
    Ok(())
}

#[test]
fn default_deadline_is_three_seconds() {
    assert_eq!(DEFAULT_DISCOVERY_DEADLINE, Duration::from_secs(3));
    assert_eq!(
        DiscoveryError::timeout(Duration::from_millis(1500)).to_string(),
        "reflection timed out after 1500ms"
    );
}

#[test]
fn status_mapping_separates_unimplemented() {
    assert!(matches!(
        DiscoveryError::from_status(&Status::new(Code::Unimplemented, "no")),
        DiscoveryError::Unimplemented
    ));
    let retryable =
        |code: Code| DiscoveryError::from_status(&Status::new(code, "no")).is_retryable();
    assert!(retryable(Code::Unavailable));
    assert!(!retryable(Code::PermissionDenied));
}
