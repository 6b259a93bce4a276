//! Readiness predicates for the resource kinds the harness waits on.
//!
//! The functions here are pure: they inspect an object already fetched from
//! the API server. [`probe`] wraps them in single API round trips that the
//! [`Poller`](crate::poll::Poller) can drive.
//!
//! A predicate returns `Err` only when the condition can never hold, for
//! example a pod that already completed. Those errors stop the poller
//! instead of being retried.

pub mod probe;

use k8s_openapi::api::core::v1::{Endpoints, Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use crate::error::{Error, Result};
use crate::poll::Readiness;

/// Pod phases as reported in `status.phase`.
pub const POD_RUNNING: &str = "Running";
pub const POD_SUCCEEDED: &str = "Succeeded";
pub const POD_FAILED: &str = "Failed";

const CONDITION_READY: &str = "Ready";
const CONDITION_TRUE: &str = "True";

fn object_name(meta_name: Option<&String>) -> &str {
    meta_name.map(String::as_str).unwrap_or("<unnamed>")
}

/// Whether a pod is running with its `Ready` condition true.
///
/// Completed pods (`Failed` or `Succeeded`) and running pods without a
/// `Ready` condition are definitive failures. Any other phase is not ready.
pub fn pod_ready(pod: &Pod) -> Result<bool> {
    let name = object_name(pod.metadata.name.as_ref());
    let status = pod.status.as_ref();
    let phase = status.and_then(|s| s.phase.as_deref()).unwrap_or_default();

    match phase {
        POD_FAILED | POD_SUCCEEDED => Err(Error::definitive(format!(
            "pod {name} completed with phase {phase}"
        ))),
        POD_RUNNING => status
            .and_then(|s| s.conditions.as_ref())
            .and_then(|conds| conds.iter().find(|c| c.type_ == CONDITION_READY))
            .map(|c| c.status == CONDITION_TRUE)
            .ok_or_else(|| Error::definitive(format!("pod {name} ready condition not found"))),
        _ => Ok(false),
    }
}

/// Same as [`pod_ready`] but shaped for the poller.
pub fn pod_readiness(pod: &Pod) -> Result<Readiness> {
    let name = object_name(pod.metadata.name.as_ref());
    if pod_ready(pod)? {
        return Ok(Readiness::Ready(()));
    }
    let phase = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("Unknown");
    Ok(Readiness::pending(format!("pod {name} in phase {phase}, not ready")))
}

/// Count the pods for which [`pod_ready`] holds.
///
/// Stops at the first pod that can never become ready.
pub fn count_ready_pods(pods: &[Pod]) -> Result<usize> {
    let mut ready = 0;
    for pod in pods {
        if pod_ready(pod)? {
            ready += 1;
        }
    }
    Ok(ready)
}

/// Ready when exactly `expected` pods are ready.
///
/// An exact match rather than "at least" catches over-scheduling.
pub fn replicas_readiness(pods: &[Pod], expected: usize) -> Result<Readiness> {
    let ready = count_ready_pods(pods)?;
    if ready == expected {
        Ok(Readiness::Ready(()))
    } else {
        Ok(Readiness::pending(format!(
            "{ready}/{expected} pods ready ({} matched)",
            pods.len()
        )))
    }
}

/// Whether an Endpoints object has at least one subset with an address.
pub fn endpoints_ready(endpoints: &Endpoints) -> bool {
    endpoints
        .subsets
        .as_ref()
        .is_some_and(|subsets| {
            subsets
                .iter()
                .any(|s| s.addresses.as_ref().is_some_and(|a| !a.is_empty()))
        })
}

/// Whether a node reports its `Ready` condition as true.
pub fn node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conds| conds.iter().find(|c| c.type_ == CONDITION_READY))
        .is_some_and(|c| c.status == CONDITION_TRUE)
}

/// Ready when at least `expected` nodes are ready.
pub fn nodes_readiness(nodes: &[Node], expected: usize) -> Readiness {
    let ready = nodes.iter().filter(|n| node_ready(n)).count();
    if ready >= expected {
        Readiness::Ready(())
    } else {
        Readiness::pending(format!("{ready}/{expected} nodes ready"))
    }
}

/// Render a label selector in the query form the API server accepts.
///
/// An empty selector renders as the empty string, which matches everything.
pub fn selector_to_string(selector: &LabelSelector) -> Result<String> {
    let mut parts = Vec::new();

    if let Some(labels) = &selector.match_labels {
        parts.extend(labels.iter().map(|(k, v)| format!("{k}={v}")));
    }

    for expr in selector.match_expressions.iter().flatten() {
        let values = expr.values.as_deref().unwrap_or_default();
        let part = match expr.operator.as_str() {
            "In" | "NotIn" if values.is_empty() => {
                return Err(Error::InvalidSelector(format!(
                    "operator {} on {} requires values",
                    expr.operator, expr.key
                )));
            }
            "In" => format!("{} in ({})", expr.key, values.join(",")),
            "NotIn" => format!("{} notin ({})", expr.key, values.join(",")),
            "Exists" => expr.key.clone(),
            "DoesNotExist" => format!("!{}", expr.key),
            other => {
                return Err(Error::InvalidSelector(format!(
                    "unknown operator {other} on {}",
                    expr.key
                )));
            }
        };
        parts.push(part);
    }

    Ok(parts.join(","))
}
