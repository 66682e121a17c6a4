// system-tests/tests/suites/calls.rs
// ============================================================================
// Module: Call Scenarios
// Description: Unary and streaming calls against the mock server.
// Purpose: Validate payload binding, headers, and stream ordering end to end.
// Dependencies: system-tests helpers, protoctl-cli
// ============================================================================

//! End-to-end call scenarios against a reflecting mock server.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::time::Duration;

use protoctl_cli::CliError;
use system_tests::mock::CollectOutcome;
use system_tests::mock::MockServer;
use system_tests::mock::Reflection;
use system_tests::mock::TICK_COUNT;

use crate::helpers::harness::Scenario;
use crate::helpers::harness::start_server;

type TestResult = Result<(), String>;

/// Returns the byte offsets of each needle, failing when one is missing.
fn positions(haystack: &str, needles: &[&str]) -> Result<Vec<usize>, String> {
    needles
        .iter()
        .map(|needle| {
            haystack.find(needle).ok_or_else(|| format!("missing {needle:?} in {haystack}"))
        })
        .collect()
}

/// Lets an aborted request reach the server, then returns its `Collect` log.
async fn settled_collects(server: &MockServer) -> Vec<CollectOutcome> {
    tokio::time::sleep(Duration::from_millis(300)).await;
    server.collects()
}

#[tokio::test(flavor = "multi_thread")]
async fn unary_call_echoes_message_and_headers() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let out = scenario
        .run(scenario.args(&[
            "--address", &address, "--plaintext", "-H", "foo: Bar", "FooAPI", "Hello", "--message",
            "hi",
        ]))
        .await?
        .success()?;
    assert!(out.contains("\"message\""), "unexpected output: {out}");
    assert!(out.contains("Incoming Message: hi"), "unexpected output: {out}");
    assert!(out.contains("foo:[Bar]"), "unexpected output: {out}");
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn json_data_replaces_flag_payloads() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let out = scenario
        .run(scenario.args(&[
            "--address",
            &address,
            "--plaintext",
            "BarAPI",
            "ListBars",
            "--json-data",
            r#"{"message":"from json"}"#,
        ]))
        .await?
        .success()?;
    assert!(out.contains("Incoming Message: from json"), "unexpected output: {out}");
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn context_user_headers_reach_the_server() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    for words in [
        &["config", "user", "add", "alice", "-H", "authorization: Bearer token"][..],
        &["config", "context", "add", "dev", "--user", "alice"][..],
        &["config", "set-context", "dev"][..],
    ] {
        scenario.run(scenario.args(words)).await?.success()?;
    }
    let address = server.address();
    let out = scenario
        .run(scenario.args(&["--address", &address, "--plaintext", "FooAPI", "Hello"]))
        .await?
        .success()?;
    assert!(out.contains("authorization:[Bearer token]"), "unexpected output: {out}");
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn bidirectional_stream_answers_in_order() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let out = scenario
        .run(scenario.args(&[
            "--address",
            &address,
            "--plaintext",
            "StreamAPI",
            "Chat",
            "--json-data",
            r#"{"message":"one"}"#,
            "--json-data",
            r#"{"message":"two"}"#,
            "--json-data",
            r#"{"message":"three"}"#,
        ]))
        .await?
        .success()?;
    let found = positions(
        &out,
        &["Incoming Message: one", "Incoming Message: two", "Incoming Message: three"],
    )?;
    assert!(found.windows(2).all(|pair| pair[0] < pair[1]), "out of order: {out}");
    assert_eq!(out.matches("Incoming Message").count(), 3);
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn client_stream_yields_one_response() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let out = scenario
        .run(scenario.args(&[
            "--address",
            &address,
            "--plaintext",
            "StreamAPI",
            "Collect",
            "--json-data",
            r#"{"message":"a"}"#,
            "--json-data",
            r#"{"message":"b"}"#,
        ]))
        .await?
        .success()?;
    assert_eq!(out.matches("Incoming Message").count(), 1);
    assert!(out.contains("Incoming Message: a,b"), "unexpected output: {out}");
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn server_stream_prints_every_response() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let out = scenario
        .run(scenario.args(&[
            "--address", &address, "--plaintext", "StreamAPI", "Ticks", "--message", "go",
        ]))
        .await?
        .success()?;
    let found = positions(&out, &["go 1", "go 2", "go 3"])?;
    assert!(found.windows(2).all(|pair| pair[0] < pair[1]), "out of order: {out}");
    assert_eq!(out.matches("Incoming Message").count(), TICK_COUNT);
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn payloads_with_unknown_fields_fail_the_call() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let outcome = scenario
        .run(scenario.args(&[
            "--address",
            &address,
            "--plaintext",
            "FooAPI",
            "Hello",
            "--json-data",
            r#"{"nope":1}"#,
        ]))
        .await?;
    let err = outcome.result.expect_err("unknown field must be rejected");
    assert!(matches!(err, CliError::Invocation(_)), "unexpected error: {err}");
    assert!(outcome.stdout.is_empty());
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn client_stream_reads_stdin_lines() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let out = scenario
        .run_with_stdin(
            scenario.args(&["--address", &address, "--plaintext", "StreamAPI", "Collect"]),
            "{\"message\":\"a\"}\n\n{\"message\":\"b\"}\n",
        )
        .await?
        .success()?;
    assert!(out.contains("Incoming Message: a,b"), "unexpected output: {out}");
    assert_eq!(server.collects(), vec![CollectOutcome::Completed("a,b".to_string())]);
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_stdin_line_aborts_the_client_stream() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let outcome = scenario
        .run_with_stdin(
            scenario.args(&["--address", &address, "--plaintext", "StreamAPI", "Collect"]),
            "{\"message\":\"a\"}\nnot json\n{\"message\":\"c\"}\n",
        )
        .await?;
    let err = outcome.result.expect_err("a bad line must fail the call");
    assert!(matches!(err, CliError::Input(_)), "unexpected error: {err}");
    assert!(err.to_string().contains("line 2"), "unexpected error: {err}");
    assert_eq!(err.exit_code(), 2);
    assert!(outcome.stdout.is_empty(), "unexpected output: {}", outcome.stdout);
    let collects = settled_collects(&server).await;
    assert!(
        collects.iter().all(|collect| *collect == CollectOutcome::Aborted),
        "server completed a truncated stream: {collects:?}"
    );
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn undecodable_stream_payloads_abort_the_client_stream() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let outcome = scenario
        .run(scenario.args(&[
            "--address",
            &address,
            "--plaintext",
            "StreamAPI",
            "Collect",
            "--json-data",
            r#"{"message":"a"}"#,
            "--json-data",
            r#"{"nope":1}"#,
        ]))
        .await?;
    let err = outcome.result.expect_err("unknown field must be rejected");
    assert!(matches!(err, CliError::Invocation(_)), "unexpected error: {err}");
    assert!(outcome.stdout.is_empty(), "unexpected output: {}", outcome.stdout);
    let collects = settled_collects(&server).await;
    assert!(
        collects.iter().all(|collect| *collect == CollectOutcome::Aborted),
        "server completed a truncated stream: {collects:?}"
    );
    server.shutdown().await;
    Ok(())
}
