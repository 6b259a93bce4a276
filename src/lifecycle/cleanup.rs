//! Deferred cleanup actions and the tiered teardown runner.
//!
//! Actions are registered in creation order. At close time they run tier by
//! tier: everything in a tier is spawned concurrently, and the next tier
//! only starts once the current one finished cleanly. Cluster role bindings
//! go first, then roles and other cluster-scoped objects, and namespaces
//! last, so nothing is deleted while something registered later still
//! refers to it.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Order in which cleanup actions are torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TeardownTier {
    /// Objects referring to other objects, such as cluster role bindings.
    Bindings,
    /// Standalone cluster-scoped objects and user-registered actions.
    Objects,
    /// Namespaces, whose deletion cascades to everything inside them.
    Namespaces,
}

impl TeardownTier {
    pub const ALL: [TeardownTier; 3] = [
        TeardownTier::Bindings,
        TeardownTier::Objects,
        TeardownTier::Namespaces,
    ];
}

impl std::fmt::Display for TeardownTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeardownTier::Bindings => write!(f, "bindings"),
            TeardownTier::Objects => write!(f, "objects"),
            TeardownTier::Namespaces => write!(f, "namespaces"),
        }
    }
}

type Action = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// A deferred teardown operation.
pub struct Cleanup {
    label: String,
    tier: TeardownTier,
    key: Option<String>,
    action: Action,
}

impl Cleanup {
    /// Create a cleanup action from an async closure.
    pub fn new<F, Fut>(label: impl Into<String>, tier: TeardownTier, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            label: label.into(),
            tier,
            key: None,
            action: Box::new(move || action().boxed()),
        }
    }

    /// Tie this action to a resource so an explicit delete can cancel it.
    pub fn for_resource(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tier(&self) -> TeardownTier {
        self.tier
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl std::fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cleanup")
            .field("label", &self.label)
            .field("tier", &self.tier)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Ordered list of pending cleanup actions owned by one test.
#[derive(Debug, Default)]
pub(crate) struct CleanupRegistry {
    entries: Mutex<Vec<Cleanup>>,
}

impl CleanupRegistry {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Cleanup>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, cleanup: Cleanup) {
        self.lock().push(cleanup);
    }

    /// Drop pending actions registered for `key`. Returns how many were removed.
    pub(crate) fn cancel(&self, key: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|c| c.key.as_deref() != Some(key));
        before - entries.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn labels(&self) -> Vec<String> {
        self.lock().iter().map(|c| c.label.clone()).collect()
    }

    /// Drain every pending action, leaving the registry empty.
    pub(crate) fn take(&self) -> Vec<Cleanup> {
        std::mem::take(&mut *self.lock())
    }
}

/// Run cleanup actions tier by tier.
///
/// Within a tier all actions are spawned at once. The first failure is
/// returned as soon as it is observed; the remaining actions of that tier
/// keep running in the background and later tiers are not started.
pub(crate) async fn run(entries: Vec<Cleanup>, test_id: &str) -> Result<()> {
    let mut remaining = entries;

    for tier in TeardownTier::ALL {
        let (batch, rest): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|c| c.tier == tier);
        remaining = rest;
        if batch.is_empty() {
            continue;
        }

        debug!(test = %test_id, tier = %tier, actions = batch.len(), "Running cleanup tier");

        let mut set = JoinSet::new();
        for cleanup in batch {
            let Cleanup { label, action, .. } = cleanup;
            let fut = action();
            set.spawn(async move { (label, fut.await) });
        }

        while let Some(joined) = set.join_next().await {
            let failure = match joined {
                Ok((label, Ok(()))) => {
                    debug!(test = %test_id, action = %label, "Cleanup action done");
                    None
                }
                Ok((label, Err(e))) => Some((label, e)),
                Err(join_err) => Some((
                    "cleanup task".to_string(),
                    Error::definitive(format!("cleanup task did not complete: {join_err}")),
                )),
            };

            if let Some((action, source)) = failure {
                warn!(
                    test = %test_id,
                    action = %action,
                    error = %source,
                    still_running = set.len(),
                    "Cleanup action failed"
                );
                set.detach_all();
                return Err(Error::Cleanup {
                    action,
                    source: Box::new(source),
                });
            }
        }
    }

    Ok(())
}
