// system-tests/tests/discovery.rs
// ============================================================================
// Module: Discovery Suite
// Description: Aggregates schema discovery scenarios into one binary.
// Purpose: Exercise reflection, caching, completion, and bookmarks end to end.
// Dependencies: suites/*, helpers
// ============================================================================

//! ## Overview
//! Aggregates schema discovery scenarios into one binary.

mod helpers;

#[path = "suites/discovery.rs"]
mod discovery;
