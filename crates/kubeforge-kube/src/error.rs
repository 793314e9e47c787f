//! Error types for kubeforge-kube

use std::time::Duration;
use thiserror::Error;

use crate::client::ClusterError;

/// Result type for kubeforge-kube operations
pub type Result<T> = std::result::Result<T, MachineError>;

/// Errors that can occur while managing the machine-controller and its machines
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MachineError {
    /// Kubernetes API error outside of the cluster client seam
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// No cluster client was supplied
    #[error("kubernetes client not initialized")]
    NotInitialized,

    /// A list or delete through the cluster client failed
    #[error("{context}: {source}")]
    Cluster {
        context: String,
        #[source]
        source: ClusterError,
    },

    /// Machines were still present when the poll window closed
    #[error("{remaining} machine object(s) still present after {timeout:?}")]
    ConvergenceTimeout { remaining: usize, timeout: Duration },

    /// The caller cancelled the operation
    #[error("cancelled while {0}")]
    Cancelled(String),

    /// A component could not be applied
    #[error("failed to apply {component}: {message}")]
    Deploy { component: String, message: String },

    /// A component never became ready
    #[error("{component} not ready: {message}")]
    NotReady { component: String, message: String },

    /// Manifest could not be parsed or resolved
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Lower-level failure with orchestration context
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<MachineError>,
    },
}

impl MachineError {
    /// Wrap this error with a context message
    pub fn context(self, context: impl Into<String>) -> Self {
        MachineError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through context wrappers
    pub fn root(&self) -> &MachineError {
        match self {
            MachineError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), MachineError::Cancelled(_))
    }

    pub fn is_convergence_timeout(&self) -> bool {
        matches!(self.root(), MachineError::ConvergenceTimeout { .. })
    }
}
