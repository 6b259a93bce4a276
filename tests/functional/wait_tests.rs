//! Readiness and deletion waits, driven on paused tokio time.

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, EndpointAddress, EndpointSubset, Endpoints, Pod, Service,
};
use kube::api::ObjectMeta;
use kube_test_harness::{Error, HarnessOptions};
use tokio::time::Instant;

use crate::common::{
    DeploymentBuilder, PodBuilder, collection_path, fake_harness, object_path, ready_pods_json,
};

fn endpoints(namespace: &str, name: &str, ip: Option<&str>) -> Endpoints {
    Endpoints {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        subsets: ip.map(|ip| {
            vec![EndpointSubset {
                addresses: Some(vec![EndpointAddress {
                    ip: ip.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }]
        }),
    }
}

#[tokio::test(start_paused = true)]
async fn test_deployment_ready_on_second_observation() {
    let (harness, fake) = fake_harness(HarnessOptions::default());
    let t = harness.new_test("TestReplicas");
    t.setup().await.unwrap();

    let deployment = t
        .resources::<Deployment>()
        .create(t.namespace(), DeploymentBuilder::new("web").replicas(3).build())
        .await
        .unwrap();

    let pods = collection_path::<Pod>(Some(t.namespace()));
    fake.script_list(
        &pods,
        vec![ready_pods_json(t.namespace(), 2), ready_pods_json(t.namespace(), 3)],
    );

    let start = Instant::now();
    t.resources::<Deployment>()
        .wait_for_ready(&deployment, Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(fake.list_calls(&pods), 2);
    assert!(start.elapsed() >= Duration::from_secs(1));
    t.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_deployment_defaults_to_one_replica() {
    let (harness, fake) = fake_harness(HarnessOptions::default());
    let t = harness.new_test("TestDefaultReplicas");
    t.setup().await.unwrap();

    let deployment = t
        .resources::<Deployment>()
        .create(t.namespace(), DeploymentBuilder::unnamed().build())
        .await
        .unwrap();
    fake.insert(&PodBuilder::new("web-0").namespace(t.namespace()).ready().build());

    t.resources::<Deployment>()
        .wait_for_ready(&deployment, Duration::from_secs(5))
        .await
        .unwrap();
    t.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_pod_wait_times_out_with_last_state() {
    let (harness, fake) = fake_harness(HarnessOptions::default());
    let t = harness.new_test("TestPodTimeout");
    t.setup().await.unwrap();

    let pod = PodBuilder::new("web-0")
        .namespace(t.namespace())
        .running_not_ready()
        .build();
    fake.insert(&pod);

    let start = Instant::now();
    let err = t
        .resources::<Pod>()
        .wait_for_ready(&pod, Duration::from_secs(3))
        .await
        .unwrap_err();

    assert!(start.elapsed() >= Duration::from_secs(3));
    match err {
        Error::Timeout { last_state, .. } => assert!(last_state.contains("not ready"), "{last_state}"),
        other => panic!("expected timeout, got {other:?}"),
    }
    t.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_pod_aborts_wait() {
    let (harness, fake) = fake_harness(HarnessOptions::default());
    let t = harness.new_test("TestPodFailed");
    t.setup().await.unwrap();

    let pod = PodBuilder::new("job-0").namespace(t.namespace()).phase("Failed").build();
    fake.insert(&pod);

    let start = Instant::now();
    let err = t
        .resources::<Pod>()
        .wait_for_ready(&pod, Duration::from_secs(60))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DefinitiveFailure { .. }), "{err:?}");
    assert!(start.elapsed() < Duration::from_secs(1));
    t.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_service_ready_once_endpoints_have_addresses() {
    let (harness, fake) = fake_harness(HarnessOptions::default());
    let t = harness.new_test("TestServiceReady");
    t.setup().await.unwrap();

    let service = t
        .resources::<Service>()
        .create_from_file(t.namespace(), "nginx-service.yaml")
        .await
        .unwrap();

    fake.insert(&endpoints(t.namespace(), "nginx", None));
    let err = t
        .resources::<Service>()
        .wait_for_ready(&service, Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    fake.insert(&endpoints(t.namespace(), "nginx", Some("10.0.0.7")));
    t.resources::<Service>()
        .wait_for_ready(&service, Duration::from_secs(2))
        .await
        .unwrap();

    let ep = t.endpoints(t.namespace(), "nginx").await.unwrap();
    assert_eq!(ep.subsets.unwrap().len(), 1);
    t.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_service_deleted_when_endpoints_gone() {
    let (harness, fake) = fake_harness(HarnessOptions::default());
    let t = harness.new_test("TestServiceDeleted");
    t.setup().await.unwrap();

    let services = t.resources::<Service>();
    let service = services
        .create_from_file(t.namespace(), "nginx-service.yaml")
        .await
        .unwrap();
    let ep = endpoints(t.namespace(), "nginx", Some("10.0.0.7"));
    let ep_path = object_path(&ep);
    fake.insert(&ep);
    services.delete(&service).await.unwrap();

    // Endpoints that can still be fetched keep the wait going.
    let err = services
        .wait_for_deleted(&service, Duration::from_secs(6))
        .await
        .unwrap_err();
    match err {
        Error::Timeout { last_state, .. } => assert!(last_state.contains("still present"), "{last_state}"),
        other => panic!("expected timeout, got {other:?}"),
    }
    // Checked at 0s and again after one 5s interval.
    assert!(fake.list_calls(&ep_path) >= 2);

    let controller = fake.clone();
    let removed_path = ep_path.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        controller.remove(&removed_path);
    });

    let start = Instant::now();
    services
        .wait_for_deleted(&service, Duration::from_secs(60))
        .await
        .unwrap();
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert!(!fake.contains(&ep_path));
    t.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_deleted() {
    let (harness, _fake) = fake_harness(HarnessOptions::default());
    let t = harness.new_test("TestWaitDeleted");
    t.setup().await.unwrap();

    let configmaps = t.resources::<ConfigMap>();
    let cm = configmaps.create(t.namespace(), ConfigMap::default()).await.unwrap();

    let err = configmaps
        .wait_for_deleted(&cm, Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    configmaps.delete(&cm).await.unwrap();
    configmaps
        .wait_for_deleted(&cm, Duration::from_secs(2))
        .await
        .unwrap();
    t.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_existence_wait() {
    let (harness, _fake) = fake_harness(HarnessOptions::default());
    let t = harness.new_test("TestExists");
    t.setup().await.unwrap();

    let configmaps = t.resources::<ConfigMap>();
    let cm = configmaps.create(t.namespace(), ConfigMap::default()).await.unwrap();
    configmaps.wait_for_ready(&cm, Duration::from_secs(1)).await.unwrap();
    t.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_wait() {
    let (harness, fake) = fake_harness(HarnessOptions::default());
    let t = harness.new_test("TestCancelled");
    t.setup().await.unwrap();

    let pod = PodBuilder::new("web-0").namespace(t.namespace()).build();
    fake.insert(&pod);

    harness.cancel_waits();
    let err = t
        .resources::<Pod>()
        .wait_for_ready(&pod, Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled { .. }), "{err:?}");
    t.close().await.unwrap();
}
