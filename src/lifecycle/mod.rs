//! Per-test state: identity, namespaces, and deferred cleanup.
//!
//! A [`Test`] is created by [`Harness::new_test`](crate::Harness::new_test),
//! provisions its namespace with [`Test::setup`], and tears everything down
//! with [`Test::close`]. A failed test keeps its resources for inspection,
//! and so does a test that is dropped before `close` is reached.

mod cleanup;

pub use cleanup::{Cleanup, TeardownTier};

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use k8s_openapi::api::core::v1::Namespace;
use kube::Client;
use kube::api::ObjectMeta;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::harness::Harness;
use crate::naming;
use crate::poll::Poller;
use crate::resources::{ResourceClient, ResourceKind};
use cleanup::CleanupRegistry;

/// Label put on every namespace the harness creates.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "kube-test-harness";
/// Label carrying the owning test ID.
pub const TEST_ID_LABEL: &str = "kube-test-harness/test-id";

/// Shared set of namespaces a test has created and not yet deleted.
#[derive(Clone, Debug, Default)]
pub(crate) struct NamespaceTracker(Arc<Mutex<BTreeSet<String>>>);

impl NamespaceTracker {
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, name: &str) {
        self.lock().insert(name.to_string());
    }

    pub(crate) fn remove(&self, name: &str) {
        self.lock().remove(name);
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }
}

/// One integration test run against the cluster.
pub struct Test {
    id: String,
    name: String,
    namespace: String,
    harness: Harness,
    next_object: AtomicU64,
    failed: AtomicBool,
    closed: bool,
    cleanups: CleanupRegistry,
    namespaces: NamespaceTracker,
}

impl Test {
    pub(crate) fn new(harness: Harness, name: &str, unix_seconds: i64) -> Self {
        let id = naming::test_id(name, unix_seconds);
        let next_object = AtomicU64::new(1);
        let namespace = naming::object_name(
            &id,
            <Namespace as ResourceKind>::SHORT_NAME,
            next_object.fetch_add(1, Ordering::Relaxed),
        );

        Self {
            id,
            name: name.to_string(),
            namespace,
            harness,
            next_object,
            failed: AtomicBool::new(false),
            closed: false,
            cleanups: CleanupRegistry::default(),
            namespaces: NamespaceTracker::default(),
        }
    }

    /// Unique ID, `<slug>-<unix seconds>`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Test name as given to the harness.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The primary namespace created by [`setup`](Self::setup).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Namespaces created by this test that still exist.
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.snapshot()
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    pub fn client(&self) -> &Client {
        self.harness.client()
    }

    /// Mint a fresh object name, `<id>-<tag>-<n>`.
    pub fn object_name(&self, tag: &str) -> String {
        self.next_object_name(tag)
    }

    pub(crate) fn next_object_name(&self, tag: &str) -> String {
        let n = self.next_object.fetch_add(1, Ordering::Relaxed);
        naming::object_name(&self.id, tag, n)
    }

    /// Typed operations for kind `K`.
    pub fn resources<K: ResourceKind>(&self) -> ResourceClient<'_, K> {
        ResourceClient::new(self)
    }

    /// Poller carrying the harness cancellation token.
    pub fn poller(&self, description: impl Into<String>) -> Poller {
        Poller::new()
            .with_description(description)
            .with_cancellation(self.harness.cancellation_token())
    }

    /// Create the test namespace.
    pub async fn setup(&self) -> Result<()> {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace.clone()),
                labels: Some(BTreeMap::from([
                    (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
                    (TEST_ID_LABEL.to_string(), self.id.clone()),
                ])),
                ..Default::default()
            },
            ..Default::default()
        };
        self.resources::<Namespace>().create("", namespace).await?;
        info!(test = %self.id, namespace = %self.namespace, "Test namespace ready");
        Ok(())
    }

    /// Register an action to run when the test closes.
    pub fn add_cleanup(&self, cleanup: Cleanup) {
        self.cleanups.push(cleanup);
    }

    /// Register an async closure in the objects tier.
    pub fn defer<F, Fut>(&self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add_cleanup(Cleanup::new(label, TeardownTier::Objects, action));
    }

    /// Labels of cleanup actions still pending.
    pub fn pending_cleanups(&self) -> Vec<String> {
        self.cleanups.labels()
    }

    pub(crate) fn cancel_cleanup(&self, key: &str) -> usize {
        self.cleanups.cancel(key)
    }

    pub(crate) fn track_namespace(&self, name: &str) {
        self.namespaces.insert(name);
    }

    pub(crate) fn untrack_namespace(&self, name: &str) {
        self.namespaces.remove(name);
    }

    pub(crate) fn namespace_tracker(&self) -> NamespaceTracker {
        self.namespaces.clone()
    }

    /// Mark the test failed. Cleanup is skipped on close.
    pub fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_with(&self, err: &Error) {
        self.fail();
        error!(test = %self.id, error = %err, "Test failed");
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Unwrap `result`, or mark the test failed and panic.
    #[track_caller]
    #[allow(clippy::panic)]
    pub fn must<T>(&self, result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                self.fail_with(&e);
                panic!("test {} failed: {e}", self.id);
            }
        }
    }

    /// Tear the test down.
    ///
    /// Failed tests and `no_cleanup` runs leave everything in place. The
    /// first failing cleanup action is returned as [`Error::Cleanup`].
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        let entries = self.cleanups.take();

        if self.is_failed() || std::thread::panicking() {
            warn!(
                test = %self.id,
                namespaces = ?self.namespaces(),
                skipped = entries.len(),
                "Test failed, leaving resources in place for inspection"
            );
            return Ok(());
        }
        if self.harness.options().no_cleanup {
            info!(
                test = %self.id,
                namespaces = ?self.namespaces(),
                skipped = entries.len(),
                "Cleanup disabled, leaving resources in place"
            );
            return Ok(());
        }

        info!(test = %self.id, actions = entries.len(), "Cleaning up test resources");
        cleanup::run(entries, &self.id).await
    }
}

impl std::fmt::Debug for Test {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Test")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("failed", &self.is_failed())
            .field("pending_cleanups", &self.cleanups.len())
            .finish()
    }
}

/// A test dropped without `close` was aborted, usually by `?` returning
/// early from the test body. It is handled like a failed test.
impl Drop for Test {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let entries = self.cleanups.take();
        if entries.is_empty() {
            return;
        }

        warn!(
            test = %self.id,
            namespaces = ?self.namespaces(),
            skipped = entries.len(),
            "Test dropped without close, leaving resources in place for inspection"
        );
    }
}
