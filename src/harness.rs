//! Suite-wide entry point: client construction, logging, and test creation.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use crate::config::{HarnessOptions, resolve_directory};
use crate::error::{Error, Result};
use crate::lifecycle::Test;

static TRACING: OnceLock<()> = OnceLock::new();

/// Install the fmt subscriber once per process.
///
/// `RUST_LOG` wins over `level` when set. Output goes through the libtest
/// capture writer unless `interactive` is set.
pub fn init_tracing(level: Level, interactive: bool) {
    TRACING.get_or_init(|| {
        let default_directives = format!(
            "{},kube=warn,hyper=warn,tower=warn,rustls=warn",
            level.as_str().to_ascii_lowercase()
        );
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives));

        let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
        // A subscriber installed by the caller takes precedence.
        let _ = if interactive {
            builder.try_init()
        } else {
            builder.with_test_writer().try_init()
        };
    });
}

/// Shared state for a test suite: the cluster client and options.
///
/// Cheap to clone. Every [`Test`] holds a clone.
#[derive(Clone)]
pub struct Harness {
    client: Client,
    api_server: String,
    options: Arc<HarnessOptions>,
    manifest_root: PathBuf,
    cancel: CancellationToken,
}

impl Harness {
    /// Initialize logging and connect to the cluster described by `options`.
    pub async fn setup(options: HarnessOptions) -> Result<Self> {
        init_tracing(options.log_level, options.interactive_logs);

        let config = match &options.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
            }
            None => Config::infer().await?,
        };
        let api_server = config.cluster_url.to_string();
        let client = Client::try_from(config)?;

        let version = client.apiserver_version().await?;

        let mut harness = Self::from_client(client, options)?;
        harness.api_server = api_server;

        info!(
            api_server = %harness.api_server,
            version = %version.git_version,
            platform = %version.platform,
            manifests = %harness.manifest_root.display(),
            no_cleanup = harness.options.no_cleanup,
            "Using Kubernetes API server"
        );
        Ok(harness)
    }

    /// [`setup`](Self::setup) with options read from the environment.
    pub async fn from_env() -> Result<Self> {
        Self::setup(HarnessOptions::from_env()).await
    }

    /// Build a harness around an existing client. Logging is left to the
    /// caller.
    pub fn from_client(client: Client, options: HarnessOptions) -> Result<Self> {
        let manifest_root = resolve_directory(options.manifest_directory.as_deref())?;
        Ok(Self {
            client,
            api_server: "custom client".to_string(),
            options: Arc::new(options),
            manifest_root,
            cancel: CancellationToken::new(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Cluster URL the client talks to.
    pub fn api_server(&self) -> &str {
        &self.api_server
    }

    pub fn options(&self) -> &HarnessOptions {
        &self.options
    }

    /// Absolute root that manifest paths are resolved against.
    pub fn manifest_directory(&self) -> &Path {
        &self.manifest_root
    }

    /// Token cancelling every wait started by tests of this harness.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Abort in-flight waits, for example when a suite-level deadline passes.
    pub fn cancel_waits(&self) {
        self.cancel.cancel();
    }

    /// Start a new test. Call [`Test::setup`] before using it.
    pub fn new_test(&self, name: &str) -> Test {
        let now = jiff::Timestamp::now().as_second();
        let test = Test::new(self.clone(), name, now);
        info!(test = %test.id(), name, "Starting test");
        test
    }

    /// Read a manifest relative to the manifest directory.
    pub(crate) fn read_manifest(&self, relative: &Path) -> Result<(PathBuf, String)> {
        let path = self.manifest_root.join(relative);
        let content = std::fs::read_to_string(&path).map_err(|source| Error::Manifest {
            path: path.clone(),
            source,
        })?;
        Ok((path, content))
    }

    /// Run `body` as a complete test: setup, body, close.
    ///
    /// An error or panic in the body marks the test failed, so its
    /// resources are kept. Panics are resumed after close.
    pub async fn run<F>(&self, name: &str, body: F) -> Result<()>
    where
        F: AsyncFnOnce(&Test) -> Result<()>,
    {
        let test = self.new_test(name);

        let outcome = match test.setup().await {
            Ok(()) => AssertUnwindSafe(body(&test)).catch_unwind().await,
            Err(e) => Ok(Err(e)),
        };

        match outcome {
            Ok(Ok(())) => test.close().await,
            Ok(Err(e)) => {
                test.fail_with(&e);
                test.close().await?;
                Err(e)
            }
            Err(panic) => {
                test.fail();
                // Failed tests skip cleanup, so close cannot fail here.
                let _ = test.close().await;
                std::panic::resume_unwind(panic)
            }
        }
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("api_server", &self.api_server)
            .field("manifest_root", &self.manifest_root)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
