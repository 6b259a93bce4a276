// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Integration tests for kube-test-harness
//!
//! These tests require a running Kubernetes cluster accessible via kubeconfig.
//! Tests are marked with #[ignore] and must be run explicitly:
//!
//! ```bash
//! # Run all integration tests
//! cargo test --test integration -- --ignored
//!
//! # Keep namespaces around for inspection
//! KUBE_HARNESS_NO_CLEANUP=1 cargo test --test integration -- --ignored
//! ```
//!
//! The tests use your existing kubeconfig (~/.kube/config or KUBECONFIG env
//! var) unless `KUBE_HARNESS_KUBECONFIG` points elsewhere.
//!
//! Each test builds its own harness: a kube client is tied to the runtime
//! it was created on, and every `#[tokio::test]` gets a fresh runtime.

// Shared test support (fake server is unused here)
#[path = "../common/mod.rs"]
mod common;

mod cluster;

mod rbac_tests;

pub use cluster::*;
