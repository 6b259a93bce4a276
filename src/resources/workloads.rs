//! Pod, deployment, service and node helpers on [`Test`].

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Endpoints, Node, Pod};
use kube::api::ListParams;
use kube::{Api, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{namespace_of, namespaced_api};
use crate::error::{Error, Result, is_api_not_found};
use crate::lifecycle::Test;
use crate::readiness::probe::{list_pods, probe_nodes_ready, probe_pods_ready};
use crate::readiness::selector_to_string;

/// API server path proxying a GET to a pod port.
pub fn pod_proxy_path(namespace: &str, pod: &str, port: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    format!("/api/v1/namespaces/{namespace}/pods/{pod}:{port}/proxy/{path}")
}

/// First port declared by any container in the pod.
pub fn first_container_port(pod: &Pod) -> Option<i32> {
    pod.spec
        .as_ref()?
        .containers
        .iter()
        .flat_map(|c| c.ports.iter().flatten())
        .map(|p| p.container_port)
        .next()
}

impl Test {
    /// List pods in `namespace`.
    pub async fn list_pods(&self, namespace: &str, params: &ListParams) -> Result<Vec<Pod>> {
        let api: Api<Pod> = namespaced_api(self.client().clone(), namespace);
        list_pods(&api, params).await
    }

    /// List the pods selected by a deployment's `spec.selector`.
    pub async fn list_pods_from_deployment(&self, deployment: &Deployment) -> Result<Vec<Pod>> {
        let spec = deployment.spec.as_ref().ok_or_else(|| {
            Error::definitive(format!("deployment {} has no spec", deployment.name_any()))
        })?;
        let selector = selector_to_string(&spec.selector)?;
        self.list_pods(
            &namespace_of(deployment),
            &ListParams::default().labels(&selector),
        )
        .await
    }

    /// Wait until exactly `expected` pods matching `selector` are ready and
    /// return them.
    pub async fn wait_for_pods_ready(
        &self,
        namespace: &str,
        selector: &str,
        expected: usize,
        timeout: Duration,
    ) -> Result<Vec<Pod>> {
        let api: Api<Pod> = namespaced_api(self.client().clone(), namespace);
        self.poller(format!("{expected} pods matching '{selector}' to be ready"))
            .with_timeout(timeout)
            .poll(|| probe_pods_ready(&api, selector, expected))
            .await
    }

    /// GET `path` on `port` of a pod through the API server proxy.
    ///
    /// An empty `port` uses the first port declared by the pod's containers.
    pub async fn pod_proxy_get(&self, pod: &Pod, port: &str, path: &str) -> Result<Vec<u8>> {
        let request = self.pod_proxy_request(pod, port, path)?;
        let uri = request.uri().to_string();
        debug!(test = %self.id(), uri = %uri, "Proxying GET to pod");
        let body = self
            .client()
            .request_text(request)
            .await
            .map_err(|source| proxy_error(pod, source))?;
        Ok(body.into_bytes())
    }

    /// [`pod_proxy_get`](Self::pod_proxy_get) with the body decoded as JSON.
    pub async fn pod_proxy_get_json<T: DeserializeOwned>(
        &self,
        pod: &Pod,
        port: &str,
        path: &str,
    ) -> Result<T> {
        let request = self.pod_proxy_request(pod, port, path)?;
        self.client()
            .request::<T>(request)
            .await
            .map_err(|source| proxy_error(pod, source))
    }

    fn pod_proxy_request(&self, pod: &Pod, port: &str, path: &str) -> Result<http::Request<Vec<u8>>> {
        let name = pod.name_any();
        let port = if port.is_empty() {
            first_container_port(pod)
                .ok_or_else(|| Error::definitive(format!("pod {name} declares no container ports")))?
                .to_string()
        } else {
            port.to_string()
        };
        let uri = pod_proxy_path(&namespace_of(pod), &name, &port, path);
        Ok(http::Request::get(uri).body(Vec::new())?)
    }

    /// Fetch the Endpoints object backing a service.
    pub async fn endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints> {
        let api: Api<Endpoints> = namespaced_api(self.client().clone(), namespace);
        api.get(name).await.map_err(|source| {
            if is_api_not_found(&source) {
                Error::NotFound {
                    kind: "Endpoints".to_string(),
                    name: name.to_string(),
                }
            } else {
                Error::GetFailed {
                    kind: "Endpoints".to_string(),
                    name: name.to_string(),
                    source,
                }
            }
        })
    }

    /// List all nodes in the cluster.
    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client().clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .map_err(|source| Error::ListFailed {
                kind: "Node".to_string(),
                scope: "cluster".to_string(),
                source,
            })?;
        Ok(nodes.items)
    }

    /// Wait until at least `expected` nodes are ready.
    pub async fn wait_for_nodes_ready(&self, expected: usize, timeout: Duration) -> Result<()> {
        let api: Api<Node> = Api::all(self.client().clone());
        self.poller(format!("{expected} nodes to be ready"))
            .with_timeout(timeout)
            .poll(|| probe_nodes_ready(&api, expected))
            .await
    }
}

fn proxy_error(pod: &Pod, source: kube::Error) -> Error {
    Error::GetFailed {
        kind: "Pod proxy".to_string(),
        name: pod.name_any(),
        source,
    }
}
