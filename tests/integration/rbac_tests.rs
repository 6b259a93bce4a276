//! Cluster-scoped objects and their teardown.

use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, RoleRef, Subject};
use kube::ResourceExt;
use kube::api::ObjectMeta;
use kube_test_harness::test_name;

use crate::cluster::live_harness;

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_cluster_role_binding_torn_down_before_role() {
    let harness = live_harness().await;
    let t = harness.new_test(test_name!());
    t.must(t.setup().await);

    let roles = t.resources::<ClusterRole>();
    let role = t.must(roles.create_from_file("", "reader-clusterrole.json").await);

    let binding = ClusterRoleBinding {
        metadata: ObjectMeta::default(),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: role.name_any(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: "default".to_string(),
            namespace: Some(t.namespace().to_string()),
            ..Default::default()
        }]),
    };
    let bindings = t.resources::<ClusterRoleBinding>();
    let binding = t.must(bindings.create("", binding).await);
    assert!(binding.name_any().starts_with(t.id()));

    let client = harness.client().clone();
    t.close().await.unwrap();

    let roles: kube::Api<ClusterRole> = kube::Api::all(client.clone());
    let bindings: kube::Api<ClusterRoleBinding> = kube::Api::all(client);
    assert!(roles.get_opt(&role.name_any()).await.unwrap().is_none());
    assert!(bindings.get_opt(&binding.name_any()).await.unwrap().is_none());
}
