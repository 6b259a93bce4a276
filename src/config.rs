//! Harness configuration.
//!
//! Options can be built in code or read from the environment, which is how
//! `cargo test` runs pass settings to the harness:
//!
//! | Variable                    | Effect                                     |
//! |-----------------------------|--------------------------------------------|
//! | `KUBE_HARNESS_KUBECONFIG`   | Path to a kubeconfig file                  |
//! | `KUBE_HARNESS_MANIFESTS`    | Root directory for manifest files          |
//! | `KUBE_HARNESS_NO_CLEANUP`   | Leave test namespaces and objects in place |
//! | `KUBE_HARNESS_VERBOSE`      | Log at debug level                         |
//! | `KUBE_HARNESS_INTERACTIVE`  | Print logs as they happen, uncaptured      |

use std::path::{Path, PathBuf};

use tracing::Level;

use crate::error::Result;

pub const ENV_KUBECONFIG: &str = "KUBE_HARNESS_KUBECONFIG";
pub const ENV_MANIFESTS: &str = "KUBE_HARNESS_MANIFESTS";
pub const ENV_NO_CLEANUP: &str = "KUBE_HARNESS_NO_CLEANUP";
pub const ENV_VERBOSE: &str = "KUBE_HARNESS_VERBOSE";
pub const ENV_INTERACTIVE: &str = "KUBE_HARNESS_INTERACTIVE";

/// Configuration options for the test harness.
#[derive(Clone, Debug)]
pub struct HarnessOptions {
    /// Path to a kubeconfig file. When unset the client configuration is
    /// inferred, honouring `KUBECONFIG` and `~/.kube/config`.
    pub kubeconfig: Option<PathBuf>,
    /// Root directory manifests are loaded from. Relative paths are resolved
    /// against the current directory; unset means the current directory.
    pub manifest_directory: Option<PathBuf>,
    /// Skip cleanup when tests close.
    pub no_cleanup: bool,
    /// Maximum log level when `RUST_LOG` is not set.
    pub log_level: Level,
    /// Write logs straight to stdout instead of the libtest capture writer.
    pub interactive_logs: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            manifest_directory: None,
            no_cleanup: false,
            log_level: Level::INFO,
            interactive_logs: false,
        }
    }
}

impl HarnessOptions {
    /// Read options from `KUBE_HARNESS_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build options from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| non_empty(key).is_some_and(|v| parse_flag(&v));

        Self {
            kubeconfig: non_empty(ENV_KUBECONFIG).map(PathBuf::from),
            manifest_directory: non_empty(ENV_MANIFESTS).map(PathBuf::from),
            no_cleanup: flag(ENV_NO_CLEANUP),
            log_level: if flag(ENV_VERBOSE) {
                Level::DEBUG
            } else {
                Level::INFO
            },
            interactive_logs: flag(ENV_INTERACTIVE),
        }
    }

    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    pub fn with_manifest_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_directory = Some(path.into());
        self
    }

    pub fn with_no_cleanup(mut self, no_cleanup: bool) -> Self {
        self.no_cleanup = no_cleanup;
        self
    }

    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_interactive_logs(mut self, interactive: bool) -> Self {
        self.interactive_logs = interactive;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Resolve a manifest directory against the current working directory.
///
/// Empty or missing means the current directory, absolute paths are kept
/// as given, and relative paths are joined to the current directory.
pub fn resolve_directory(dir: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(resolve_against(&cwd, dir))
}

fn resolve_against(cwd: &Path, dir: Option<&Path>) -> PathBuf {
    match dir {
        None => cwd.to_path_buf(),
        Some(d) if d.as_os_str().is_empty() => cwd.to_path_buf(),
        Some(d) if d.is_absolute() => d.to_path_buf(),
        Some(d) => cwd.join(d),
    }
}
