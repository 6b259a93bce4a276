//! Error types for the harness.
//!
//! Every core operation returns [`Result`]. Variants keep the underlying
//! cause so a failing test prints the full chain, and waits distinguish a
//! deadline that ran out from a condition that can never hold.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error type for harness operations
#[derive(Error, Debug)]
pub enum Error {
    /// Manifest content is not a well-formed document of the expected kind
    #[error("failed to decode {kind} manifest {}: {reason}", path.display())]
    DecodeFailed {
        kind: String,
        path: PathBuf,
        reason: String,
    },

    /// Manifest file could not be opened
    #[error("failed to open manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The API server rejected a create
    #[error("failed to create {kind} {name}: {source}")]
    CreateFailed {
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// The API server rejected a get for a reason other than absence
    #[error("failed to get {kind} {name}: {source}")]
    GetFailed {
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// The API server rejected a delete, including deletes of absent objects
    #[error("deleting {kind} {name} failed: {source}")]
    DeleteFailed {
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// Listing objects failed
    #[error("failed to list {kind} in {scope}: {source}")]
    ListFailed {
        kind: String,
        scope: String,
        #[source]
        source: kube::Error,
    },

    /// Object does not exist
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    /// A poll deadline passed before the condition held
    #[error("timed out after {after:?} waiting for {what} (last state: {last_state})")]
    Timeout {
        what: String,
        after: Duration,
        last_state: String,
    },

    /// The awaited condition can never hold, retrying is pointless
    #[error("{reason}")]
    DefinitiveFailure { reason: String },

    /// A poll was cancelled from outside
    #[error("wait for {what} was cancelled")]
    Cancelled { what: String },

    /// Label selector cannot be rendered to a query
    #[error("invalid label selector: {0}")]
    InvalidSelector(String),

    /// A cleanup action failed while closing a test
    #[error("cleanup action {action} failed: {source}")]
    Cleanup {
        action: String,
        #[source]
        source: Box<Error>,
    },

    /// Building an API server proxy request failed
    #[error("invalid proxy request: {0}")]
    ProxyRequest(#[from] http::Error),

    /// Kubeconfig file could not be read or parsed
    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// No usable client configuration was found
    #[error("failed to infer client configuration: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    /// Kubernetes API error outside a typed resource operation
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::GetFailed { source, .. }
            | Error::DeleteFailed { source, .. }
            | Error::Kube(source) => is_api_not_found(source),
            _ => false,
        }
    }

    /// Check if this error came from a poll deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Build a definitive failure from any displayable reason
    pub fn definitive(reason: impl std::fmt::Display) -> Self {
        Error::DefinitiveFailure {
            reason: reason.to_string(),
        }
    }
}

/// Check whether a raw API error is a 404
pub(crate) fn is_api_not_found(e: &kube::Error) -> bool {
    matches!(e, kube::Error::Api(ae) if ae.code == 404)
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, Error>;
