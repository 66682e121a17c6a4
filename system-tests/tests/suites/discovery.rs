// system-tests/tests/suites/discovery.rs
// ============================================================================
// Module: Discovery Scenarios
// Description: Reflection, caching, completion, and bookmarks end to end.
// Purpose: Validate how live servers become commands.
// Dependencies: system-tests helpers, protoctl-cli, protoctl-config
// ============================================================================

//! End-to-end discovery scenarios against mock servers.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::time::Duration;

use protoctl_cli::CliError;
use protoctl_config::ConfigStore;
use system_tests::mock::Reflection;

use crate::helpers::harness::Scenario;
use crate::helpers::harness::parse_keep_artifacts;
use crate::helpers::harness::parse_timeout;
use crate::helpers::harness::start_server;

type TestResult = Result<(), String>;

#[tokio::test(flavor = "multi_thread")]
async fn v1alpha_only_servers_are_discovered() -> TestResult {
    let server = start_server(Reflection::V1Alpha).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let out = scenario
        .run(scenario.args(&[
            "--address", &address, "--plaintext", "FooAPI", "Hello", "--message", "legacy",
        ]))
        .await?
        .success()?;
    assert!(out.contains("Incoming Message: legacy"), "unexpected output: {out}");
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn servers_listing_both_reflection_versions_are_discovered() -> TestResult {
    let server = start_server(Reflection::Both).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let out = scenario
        .run(scenario.args(&[
            "--address", &address, "--plaintext", "FooAPI", "Hello", "--message", "both",
        ]))
        .await?
        .success()?;
    assert!(out.contains("Incoming Message: both"), "unexpected output: {out}");

    let out = scenario
        .run(scenario.completion_args(&["--address", &address, "--plaintext", ""]))
        .await?
        .success()?;
    assert!(out.lines().any(|line| line.starts_with("FooAPI")), "missing FooAPI: {out}");
    assert!(!out.contains("ServerReflection"), "reflection leaked: {out}");
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn servers_without_reflection_fail_discovery() -> TestResult {
    let server = start_server(Reflection::Disabled).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let outcome = scenario
        .run(scenario.args(&["--address", &address, "--plaintext", "FooAPI", "Hello"]))
        .await?;
    let err = outcome.result.expect_err("discovery must fail");
    assert!(matches!(err, CliError::Discovery(_)), "unexpected error: {err}");
    assert!(err.to_string().contains(&address));
    assert_eq!(err.exit_code(), 1);
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn completion_lists_reflected_services() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let out = scenario
        .run(scenario.completion_args(&["--address", &address, "--plaintext", ""]))
        .await?
        .success()?;
    for service in ["BarAPI", "FooAPI", "StreamAPI", "config", "help"] {
        assert!(out.lines().any(|line| line.starts_with(service)), "missing {service}: {out}");
    }
    assert!(!out.contains("ServerReflection"), "reflection leaked: {out}");
    assert!(out.ends_with(":4\n"));

    let out = scenario
        .run(scenario.completion_args(&["--address", &address, "--plaintext", "StreamAPI", "C"]))
        .await?
        .success()?;
    let names: Vec<&str> = out
        .lines()
        .filter_map(|line| line.split('\t').next())
        .filter(|name| !name.starts_with(':'))
        .collect();
    assert_eq!(names, vec!["Chat", "Collect"]);
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cached_schemas_survive_the_server() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    scenario
        .run(scenario.completion_args(&["--address", &address, "--plaintext", ""]))
        .await?
        .success()?;
    assert!(scenario.cache_path().exists());
    server.shutdown().await;

    let out = scenario
        .run(scenario.completion_args(&["--address", &address, "--plaintext", "FooAPI", ""]))
        .await?
        .success()?;
    assert!(out.starts_with("Hello\t"), "cache miss: {out}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn completion_against_dead_servers_offers_builtins() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let address = server.address();
    server.shutdown().await;
    let scenario = Scenario::new()?;
    let out = scenario
        .run(scenario.completion_args(&["--address", &address, "--plaintext", ""]))
        .await?
        .success()?;
    let names: Vec<&str> = out.lines().filter_map(|line| line.split('\t').next()).collect();
    assert_eq!(names, vec!["config", "help", ":4"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn bookmarked_services_are_callable_without_address() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let out = scenario
        .run(scenario.args(&[
            "config", "service", "add", "BarAPI", "--address", &address, "--plaintext",
        ]))
        .await?
        .success()?;
    assert!(out.contains("BarAPI"), "unexpected output: {out}");

    let store = ConfigStore::open(Some(&scenario.config_path())).map_err(|err| err.to_string())?;
    let entry = store.config().service("BarAPI").map_err(|err| err.to_string())?;
    assert_eq!(entry.methods.len(), 1);
    assert_eq!(entry.environments[0].addr, address);

    let out = scenario
        .run(scenario.args(&["BarAPI", "ListBars", "--message", "saved"]))
        .await?
        .success()?;
    assert!(out.contains("Incoming Message: saved"), "unexpected output: {out}");

    let help = scenario.run(scenario.args(&["--help"])).await?.success()?;
    assert!(help.contains("BarAPI"));
    assert!(!help.contains("FooAPI"));
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn bookmarking_unknown_services_fails() -> TestResult {
    let server = start_server(Reflection::V1).await?;
    let scenario = Scenario::new()?;
    let address = server.address();
    let outcome = scenario
        .run(scenario.args(&[
            "config", "service", "add", "NopeAPI", "--address", &address, "--plaintext",
        ]))
        .await?;
    let err = outcome.result.expect_err("unknown service must be rejected");
    assert!(matches!(err, CliError::Discovery(_)), "unexpected error: {err}");
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn reflection_versions_yield_the_same_commands() -> TestResult {
    let mut listings = Vec::new();
    for reflection in [Reflection::V1, Reflection::V1Alpha] {
        let server = start_server(reflection).await?;
        let scenario = Scenario::new()?;
        let address = server.address();
        let mut listing = Vec::new();
        for service in ["", "StreamAPI"] {
            let mut words = vec!["--address", address.as_str(), "--plaintext"];
            if !service.is_empty() {
                words.push(service);
            }
            words.push("");
            let out = scenario.run(scenario.completion_args(&words)).await?.success()?;
            listing.push(out);
        }
        listings.push(listing);
        server.shutdown().await;
    }
    assert_eq!(listings[0], listings[1]);
    assert!(listings[0][1].contains("Ticks"));
    Ok(())
}

#[test]
fn harness_settings_parse_with_defaults() {
    assert_eq!(parse_timeout(None).unwrap(), Duration::from_secs(20));
    assert_eq!(parse_timeout(Some("5")).unwrap(), Duration::from_secs(5));
    assert!(parse_timeout(Some("0")).is_err());
    assert!(parse_timeout(Some("soon")).is_err());
    assert!(!parse_keep_artifacts(None).unwrap());
    assert!(parse_keep_artifacts(Some("true")).unwrap());
    assert!(!parse_keep_artifacts(Some("0")).unwrap());
    assert!(parse_keep_artifacts(Some("yes")).is_err());
}
