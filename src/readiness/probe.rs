//! Single-shot cluster probes feeding the poller.
//!
//! Each probe performs one API round trip and classifies the answer into
//! ready, pending, or a definitive error.

use std::fmt::Debug;

use k8s_openapi::api::core::v1::{Endpoints, Node, Pod};
use kube::api::{Api, ListParams};
use kube::Resource;
use serde::de::DeserializeOwned;

use super::{endpoints_ready, nodes_readiness, pod_readiness, replicas_readiness};
use crate::error::{Error, Result, is_api_not_found};
use crate::poll::Readiness;

fn kind_of<K: Resource<DynamicType = ()>>() -> String {
    K::kind(&()).into_owned()
}

/// Ready as soon as `name` can be fetched. Absence is pending, any other
/// error is definitive.
pub async fn probe_exists<K>(api: &Api<K>, name: &str) -> Result<Readiness<K>>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Readiness::Ready(obj)),
        Err(e) if is_api_not_found(&e) => Ok(Readiness::pending(format!(
            "{} {name} not found yet",
            kind_of::<K>()
        ))),
        Err(source) => Err(Error::GetFailed {
            kind: kind_of::<K>(),
            name: name.to_string(),
            source,
        }),
    }
}

/// Ready once `name` can no longer be fetched.
pub async fn probe_absent<K>(api: &Api<K>, name: &str) -> Result<Readiness>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Ok(obj) => {
            let state = if obj.meta().deletion_timestamp.is_some() {
                "terminating"
            } else {
                "present"
            };
            Ok(Readiness::pending(format!(
                "{} {name} still {state}",
                kind_of::<K>()
            )))
        }
        Err(e) if is_api_not_found(&e) => Ok(Readiness::Ready(())),
        Err(source) => Err(Error::GetFailed {
            kind: kind_of::<K>(),
            name: name.to_string(),
            source,
        }),
    }
}

/// Ready when the named pod passes [`pod_ready`](super::pod_ready).
pub async fn probe_pod(api: &Api<Pod>, name: &str) -> Result<Readiness<Pod>> {
    match probe_exists(api, name).await? {
        Readiness::Ready(pod) => Ok(pod_readiness(&pod)?.map(|()| pod)),
        Readiness::Pending(state) => Ok(Readiness::Pending(state)),
    }
}

/// Ready when exactly `expected` pods matching `selector` are ready.
pub async fn probe_pods_ready(
    api: &Api<Pod>,
    selector: &str,
    expected: usize,
) -> Result<Readiness<Vec<Pod>>> {
    let pods = list_pods(api, &ListParams::default().labels(selector)).await?;
    Ok(replicas_readiness(&pods, expected)?.map(|()| pods))
}

/// Ready when the service's Endpoints object has an address.
pub async fn probe_service_endpoints(api: &Api<Endpoints>, service: &str) -> Result<Readiness> {
    match probe_exists(api, service).await? {
        Readiness::Ready(endpoints) if endpoints_ready(&endpoints) => Ok(Readiness::Ready(())),
        Readiness::Ready(_) => Ok(Readiness::pending(format!(
            "service {service} has no ready endpoint addresses"
        ))),
        Readiness::Pending(state) => Ok(Readiness::Pending(state)),
    }
}

/// Ready once the service's Endpoints object is gone.
pub async fn probe_service_endpoints_gone(api: &Api<Endpoints>, service: &str) -> Result<Readiness> {
    probe_absent(api, service).await
}

/// Ready when at least `expected` nodes report ready.
pub async fn probe_nodes_ready(api: &Api<Node>, expected: usize) -> Result<Readiness> {
    let nodes = api
        .list(&ListParams::default())
        .await
        .map_err(|source| Error::ListFailed {
            kind: "Node".to_string(),
            scope: "cluster".to_string(),
            source,
        })?;
    Ok(nodes_readiness(&nodes.items, expected))
}

pub(crate) async fn list_pods(api: &Api<Pod>, params: &ListParams) -> Result<Vec<Pod>> {
    let list = api.list(params).await.map_err(|source| Error::ListFailed {
        kind: "Pod".to_string(),
        scope: params
            .label_selector
            .as_deref()
            .map(|sel| format!("selector {sel}"))
            .unwrap_or_else(|| "all pods".to_string()),
        source,
    })?;
    Ok(list.items)
}
