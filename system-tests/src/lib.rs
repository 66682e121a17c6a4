// system-tests/src/lib.rs
// ============================================================================
// Module: protoctl System Tests Library
// Description: The mock server shared by system tests.
// Purpose: Provide common utilities for protoctl system-test binaries.
// Dependencies: tokio, tonic, tonic-reflection
// ============================================================================

//! ## Overview
//! This crate hosts the in-process mock gRPC server used by the end-to-end
//! scenarios in `system-tests/tests`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod mock;
