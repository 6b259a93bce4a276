//! Generic create/load/get/delete/wait for one resource kind.

use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;

use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::{debug, info};

use super::{KindScope, ResourceKind, api_for, decode_manifest, kind_name, namespace_of, resource_key};
use crate::error::{Error, Result, is_api_not_found};
use crate::lifecycle::{Cleanup, TeardownTier, Test};

/// Operations on objects of kind `K`, bound to one test.
///
/// Obtained from [`Test::resources`]. Objects created through it are named
/// after the test when they carry no name, and cluster-scoped objects are
/// scheduled for deletion when the test closes.
pub struct ResourceClient<'t, K> {
    test: &'t Test,
    _kind: PhantomData<fn() -> K>,
}

impl<'t, K: ResourceKind> ResourceClient<'t, K> {
    pub(crate) fn new(test: &'t Test) -> Self {
        Self {
            test,
            _kind: PhantomData,
        }
    }

    fn client(&self) -> Client {
        self.test.client().clone()
    }

    /// Create `obj` in `namespace`.
    ///
    /// The namespace is ignored for cluster-scoped kinds. An empty namespace
    /// keeps the one already set on the object, if any. Objects with neither
    /// a name nor a `generateName` get a minted `<test-id>-<tag>-<n>` name.
    /// Returns the object as stored by the API server.
    pub async fn create(&self, namespace: &str, mut obj: K) -> Result<K> {
        let kind = kind_name::<K>();
        let target = if namespace.is_empty() {
            namespace_of(&obj)
        } else {
            namespace.to_string()
        };
        if <K::Scope as KindScope>::NAMESPACED && !target.is_empty() {
            obj.meta_mut().namespace = Some(target.clone());
        }
        let meta = obj.meta_mut();
        if meta.name.is_none() && meta.generate_name.is_none() {
            meta.name = Some(self.test.next_object_name(K::SHORT_NAME));
        }

        let requested = obj.name_any();
        debug!(test = %self.test.id(), kind = %kind, name = %requested, namespace = %target, "Creating object");

        let api = api_for::<K>(self.client(), &target);
        let created = api
            .create(&PostParams::default(), &obj)
            .await
            .map_err(|source| Error::CreateFailed {
                kind: kind.clone(),
                name: requested,
                source,
            })?;

        let name = created.name_any();
        let stored_namespace = namespace_of(&created);
        if let Some(tier) = K::TEARDOWN {
            self.schedule_delete(tier, &stored_namespace, &name);
        }
        if K::IS_NAMESPACE {
            self.test.track_namespace(&name);
        }

        info!(test = %self.test.id(), kind = %kind, name = %name, "Created object");
        Ok(created)
    }

    fn schedule_delete(&self, tier: TeardownTier, namespace: &str, name: &str) {
        let client = self.client();
        let ns = namespace.to_string();
        let object = name.to_string();
        let tracked = K::IS_NAMESPACE.then(|| self.test.namespace_tracker());
        let label = format!("delete {} {name}", kind_name::<K>());

        let cleanup = Cleanup::new(label, tier, move || async move {
            delete_object::<K>(client, &ns, &object).await?;
            if let Some(tracked) = tracked {
                tracked.remove(&object);
            }
            Ok(())
        })
        .for_resource(resource_key::<K>(namespace, name));

        self.test.add_cleanup(cleanup);
    }

    /// Decode a manifest relative to the manifest directory.
    ///
    /// The object is not sent to the cluster.
    pub fn load(&self, manifest: impl AsRef<Path>) -> Result<K> {
        let (path, content) = self.test.harness().read_manifest(manifest.as_ref())?;
        decode_manifest(&content, &path)
    }

    /// [`load`](Self::load) followed by [`create`](Self::create).
    pub async fn create_from_file(&self, namespace: &str, manifest: impl AsRef<Path>) -> Result<K> {
        let obj = self.load(manifest)?;
        self.create(namespace, obj).await
    }

    /// Fetch the current state of `name`.
    pub async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        let api = api_for::<K>(self.client(), namespace);
        api.get(name).await.map_err(|source| {
            if is_api_not_found(&source) {
                Error::NotFound {
                    kind: kind_name::<K>(),
                    name: name.to_string(),
                }
            } else {
                Error::GetFailed {
                    kind: kind_name::<K>(),
                    name: name.to_string(),
                    source,
                }
            }
        })
    }

    /// List objects in `namespace`, or cluster-wide for cluster-scoped kinds.
    pub async fn list(&self, namespace: &str, params: &ListParams) -> Result<Vec<K>> {
        let api = api_for::<K>(self.client(), namespace);
        let list = api.list(params).await.map_err(|source| Error::ListFailed {
            kind: kind_name::<K>(),
            scope: if namespace.is_empty() {
                "cluster".to_string()
            } else {
                format!("namespace {namespace}")
            },
            source,
        })?;
        Ok(list.items)
    }

    /// Delete `obj`. Deleting an object that is already gone is an error.
    ///
    /// A pending close-time deletion of the same object is cancelled.
    pub async fn delete(&self, obj: &K) -> Result<()> {
        let name = obj.name_any();
        let namespace = namespace_of(obj);

        delete_object::<K>(self.client(), &namespace, &name).await?;

        let cancelled = self.test.cancel_cleanup(&resource_key::<K>(&namespace, &name));
        if K::IS_NAMESPACE {
            self.test.untrack_namespace(&name);
        }
        debug!(
            test = %self.test.id(),
            kind = %kind_name::<K>(),
            name = %name,
            cancelled_cleanups = cancelled,
            "Deleted object"
        );
        Ok(())
    }

    /// Wait until `obj` is ready by its kind's rule.
    pub async fn wait_for_ready(&self, obj: &K, timeout: Duration) -> Result<()> {
        let client = self.test.client();
        let description = format!("{} {} to be ready", kind_name::<K>(), obj.name_any());
        self.test
            .poller(description)
            .with_interval(K::READY_INTERVAL)
            .with_timeout(timeout)
            .poll(|| K::probe_ready(client, obj))
            .await
    }

    /// Wait until `obj` no longer exists.
    pub async fn wait_for_deleted(&self, obj: &K, timeout: Duration) -> Result<()> {
        let client = self.test.client();
        let description = format!("{} {} to be deleted", kind_name::<K>(), obj.name_any());
        self.test
            .poller(description)
            .with_interval(K::DELETED_INTERVAL)
            .with_timeout(timeout)
            .poll(|| K::probe_deleted(client, obj))
            .await
    }
}

async fn delete_object<K: ResourceKind>(client: Client, namespace: &str, name: &str) -> Result<()> {
    let api = api_for::<K>(client, namespace);
    api.delete(name, &DeleteParams::default())
        .await
        .map_err(|source| Error::DeleteFailed {
            kind: kind_name::<K>(),
            name: name.to_string(),
            source,
        })?;
    Ok(())
}
