//! Typed access to the resource kinds tests work with.
//!
//! Every supported kind implements [`ResourceKind`], which carries the bits
//! that differ between kinds: the tag used in minted names, whether objects
//! need an explicit teardown, and how readiness and deletion are probed.
//! [`ResourceClient`] is the single generic implementation of
//! create/load/get/delete/wait on top of that.
//!
//! ## Supported kinds
//!
//! | Kind | Ready when | Teardown |
//! |------|------------|----------|
//! | Namespace | exists | namespaces tier |
//! | ClusterRole | exists | objects tier |
//! | ClusterRoleBinding | exists | bindings tier |
//! | ConfigMap, Secret, ServiceAccount | exists | with namespace |
//! | Pod | running with `Ready=True` | with namespace |
//! | Deployment | `spec.replicas` pods ready | with namespace |
//! | Service | endpoints have an address | with namespace |

mod client;
mod kinds;
pub mod manifest;
mod workloads;

pub use client::ResourceClient;
pub use manifest::decode_manifest;

use std::fmt::Debug;
use std::time::Duration;

use futures::future::BoxFuture;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::lifecycle::TeardownTier;
use crate::poll::{DEFAULT_POLL_INTERVAL, Readiness};
use crate::readiness::probe::{probe_absent, probe_exists};

/// Maps a resource scope onto the matching [`Api`] constructor.
pub trait KindScope {
    /// Whether objects of this scope live inside a namespace.
    const NAMESPACED: bool;

    /// Build an API handle. `namespace` is ignored for cluster-scoped kinds;
    /// an empty namespace falls back to the client's default namespace.
    fn api<K>(client: Client, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>;
}

impl KindScope for NamespaceResourceScope {
    const NAMESPACED: bool = true;

    fn api<K>(client: Client, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>,
    {
        if namespace.is_empty() {
            Api::default_namespaced(client)
        } else {
            Api::namespaced(client, namespace)
        }
    }
}

impl KindScope for ClusterResourceScope {
    const NAMESPACED: bool = false;

    fn api<K>(client: Client, _namespace: &str) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>,
    {
        Api::all(client)
    }
}

/// A Kubernetes kind the harness can create, wait on, and tear down.
pub trait ResourceKind:
    Resource<DynamicType = (), Scope: KindScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Tag used in minted object names, `<test-id>-<tag>-<n>`.
    const SHORT_NAME: &'static str;

    /// Tier at which created objects are deleted on close. `None` for kinds
    /// removed together with their namespace.
    const TEARDOWN: Option<TeardownTier> = None;

    /// Whether created objects are tracked as test namespaces.
    const IS_NAMESPACE: bool = false;

    /// Poll interval for readiness waits.
    const READY_INTERVAL: Duration = DEFAULT_POLL_INTERVAL;

    /// Poll interval for deletion waits.
    const DELETED_INTERVAL: Duration = DEFAULT_POLL_INTERVAL;

    /// One readiness check. The default is satisfied once the object exists.
    fn probe_ready<'a>(client: &'a Client, obj: &'a Self) -> BoxFuture<'a, Result<Readiness>> {
        Box::pin(async move {
            let api = api_for::<Self>(client.clone(), &namespace_of(obj));
            Ok(probe_exists(&api, &obj.name_any()).await?.map(|_| ()))
        })
    }

    /// One deletion check. The default is satisfied once a get returns 404.
    fn probe_deleted<'a>(client: &'a Client, obj: &'a Self) -> BoxFuture<'a, Result<Readiness>> {
        Box::pin(async move {
            let api = api_for::<Self>(client.clone(), &namespace_of(obj));
            probe_absent(&api, &obj.name_any()).await
        })
    }
}

/// Kind name as the API server reports it, e.g. `Deployment`.
pub fn kind_name<K: ResourceKind>() -> String {
    K::kind(&()).into_owned()
}

/// API handle for `K`, scoped to `namespace` when the kind is namespaced.
pub fn api_for<K: ResourceKind>(client: Client, namespace: &str) -> Api<K> {
    <K::Scope as KindScope>::api::<K>(client, namespace)
}

/// Key identifying one object, used to match cleanup entries to deletes.
pub fn resource_key<K: ResourceKind>(namespace: &str, name: &str) -> String {
    if <K::Scope as KindScope>::NAMESPACED {
        format!("{}/{namespace}/{name}", kind_name::<K>())
    } else {
        format!("{}/{name}", kind_name::<K>())
    }
}

/// API handle for a namespaced kind that is not a [`ResourceKind`].
pub(crate) fn namespaced_api<K>(client: Client, namespace: &str) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    <NamespaceResourceScope as KindScope>::api::<K>(client, namespace)
}

pub(crate) fn namespace_of<K: ResourceKind>(obj: &K) -> String {
    obj.meta().namespace.clone().unwrap_or_default()
}
