// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for protoctl system-tests.
// Purpose: Provide scenario sandboxes that drive the CLI in-process.
// Dependencies: system-tests, protoctl-cli
// ============================================================================

//! ## Overview
//! Shared helpers for protoctl system-tests.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod harness;
