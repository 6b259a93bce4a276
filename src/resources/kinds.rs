//! [`ResourceKind`] implementations for the built-in kinds.

use std::time::Duration;

use futures::future::BoxFuture;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Pod, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::{Api, Client, ResourceExt};

use super::{ResourceKind, api_for, namespace_of, namespaced_api};
use crate::error::{Error, Result};
use crate::lifecycle::TeardownTier;
use crate::poll::Readiness;
use crate::readiness::probe::{
    probe_pod, probe_pods_ready, probe_service_endpoints, probe_service_endpoints_gone,
};
use crate::readiness::selector_to_string;

/// Interval between checks while waiting for a service to go away.
pub const SERVICE_DELETED_INTERVAL: Duration = Duration::from_secs(5);

impl ResourceKind for Namespace {
    const SHORT_NAME: &'static str = "ns";
    const TEARDOWN: Option<TeardownTier> = Some(TeardownTier::Namespaces);
    const IS_NAMESPACE: bool = true;
}

impl ResourceKind for ClusterRole {
    const SHORT_NAME: &'static str = "clusterrole";
    const TEARDOWN: Option<TeardownTier> = Some(TeardownTier::Objects);
}

impl ResourceKind for ClusterRoleBinding {
    const SHORT_NAME: &'static str = "clusterrolebinding";
    const TEARDOWN: Option<TeardownTier> = Some(TeardownTier::Bindings);
}

impl ResourceKind for ConfigMap {
    const SHORT_NAME: &'static str = "configmap";
}

impl ResourceKind for Secret {
    const SHORT_NAME: &'static str = "secret";
}

impl ResourceKind for ServiceAccount {
    const SHORT_NAME: &'static str = "serviceaccount";
}

impl ResourceKind for Pod {
    const SHORT_NAME: &'static str = "pod";

    fn probe_ready<'a>(client: &'a Client, obj: &'a Self) -> BoxFuture<'a, Result<Readiness>> {
        Box::pin(async move {
            let api = api_for::<Pod>(client.clone(), &namespace_of(obj));
            Ok(probe_pod(&api, &obj.name_any()).await?.map(|_| ()))
        })
    }
}

impl ResourceKind for Deployment {
    const SHORT_NAME: &'static str = "deployment";

    /// Ready when exactly `spec.replicas` (default 1) pods matched by the
    /// deployment's selector are ready.
    fn probe_ready<'a>(client: &'a Client, obj: &'a Self) -> BoxFuture<'a, Result<Readiness>> {
        Box::pin(async move {
            let spec = obj.spec.as_ref().ok_or_else(|| {
                Error::definitive(format!("deployment {} has no spec", obj.name_any()))
            })?;
            let selector = selector_to_string(&spec.selector)?;
            let expected = usize::try_from(spec.replicas.unwrap_or(1)).unwrap_or_default();

            let pods: Api<Pod> = api_for::<Pod>(client.clone(), &namespace_of(obj));
            Ok(probe_pods_ready(&pods, &selector, expected).await?.map(|_| ()))
        })
    }
}

impl ResourceKind for Service {
    const SHORT_NAME: &'static str = "service";
    const DELETED_INTERVAL: Duration = SERVICE_DELETED_INTERVAL;

    /// Ready when the service's endpoints have at least one address.
    fn probe_ready<'a>(client: &'a Client, obj: &'a Self) -> BoxFuture<'a, Result<Readiness>> {
        Box::pin(async move {
            let api: Api<Endpoints> = namespaced_api(client.clone(), &namespace_of(obj));
            probe_service_endpoints(&api, &obj.name_any()).await
        })
    }

    /// Deleted once the service's endpoints are gone.
    fn probe_deleted<'a>(client: &'a Client, obj: &'a Self) -> BoxFuture<'a, Result<Readiness>> {
        Box::pin(async move {
            let api: Api<Endpoints> = namespaced_api(client.clone(), &namespace_of(obj));
            probe_service_endpoints_gone(&api, &obj.name_any()).await
        })
    }
}
