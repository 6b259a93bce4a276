// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for the harness against an in-memory API server.
//!
//! These tests exercise the full create/wait/cleanup paths WITHOUT a live
//! Kubernetes cluster. Requests go through a real `kube::Client` whose
//! transport is a `tower::service_fn` backed by [`FakeApiServer`].
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run one test with logs
//! cargo test --test functional test_close_runs_tiers_in_order -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! - **Lifecycle tests**: setup, close, fail-fast, early return
//! - **Resource tests**: create, load, get, delete through the generic client
//! - **Wait tests**: readiness and deletion waits on paused tokio time
//! - **Workload tests**: pod, deployment, service and node helpers

#[path = "../common/mod.rs"]
mod common;

mod wait_tests;

pub use common::*;
