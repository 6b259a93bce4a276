//! Kubernetes integration-test harness.
//!
//! Gives each test an isolated namespace, typed helpers to create objects
//! from code or manifest files, bounded waits for readiness and deletion,
//! and ordered cleanup when the test closes. Failed tests leave their
//! resources behind for inspection.
//!
//! ```ignore
//! use kube_test_harness::{Harness, HarnessOptions, test_name};
//! use k8s_openapi::api::apps::v1::Deployment;
//! use std::time::Duration;
//!
//! #[tokio::test(flavor = "multi_thread")]
//! #[ignore = "requires a Kubernetes cluster"]
//! async fn test_deploy_nginx() {
//!     let harness = Harness::setup(HarnessOptions::from_env()).await.unwrap();
//!     harness
//!         .run(test_name!(), async |t| {
//!             let deployments = t.resources::<Deployment>();
//!             let d = deployments
//!                 .create_from_file(t.namespace(), "nginx-deployment.yaml")
//!                 .await?;
//!             deployments.wait_for_ready(&d, Duration::from_secs(120)).await
//!         })
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod harness;
pub mod lifecycle;
pub mod naming;
pub mod poll;
pub mod readiness;
pub mod resources;

pub use config::HarnessOptions;
pub use error::{Error, Result};
pub use harness::{Harness, init_tracing};
pub use lifecycle::{Cleanup, TeardownTier, Test};
pub use poll::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, Poller, Readiness};
pub use resources::{ResourceClient, ResourceKind};

/// Full path of the enclosing function, for use as a test name.
///
/// Inside `async` blocks and closures the trailing `{{closure}}` segments
/// are dropped.
#[macro_export]
macro_rules! test_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        let name = name.strip_suffix("::f").unwrap_or(name);
        name.trim_end_matches("::{{closure}}")
    }};
}
