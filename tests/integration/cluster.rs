//! Harness construction for tests against a live cluster.

use kube_test_harness::{Harness, HarnessOptions};

use crate::common::manifests_dir;

/// Connect a harness using `KUBE_HARNESS_*` settings, reading manifests from
/// `tests/manifests` unless overridden.
pub async fn live_harness() -> Harness {
    let mut options = HarnessOptions::from_env();
    if options.manifest_directory.is_none() {
        options = options.with_manifest_directory(manifests_dir());
    }
    Harness::setup(options)
        .await
        .expect("Failed to connect to Kubernetes cluster. Is your kubeconfig configured?")
}
