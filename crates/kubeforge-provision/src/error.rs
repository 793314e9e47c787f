//! Error types for kubeforge-provision

use thiserror::Error;

use crate::terraform::Stage;

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors raised by a [`CommandRunner`](crate::runner::CommandRunner)
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// The program could not be started
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Collecting the output of a running program failed
    #[error("failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program exited unsuccessfully
    #[error("'{program}' exited with {}: {output}", describe_exit(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        /// Combined stdout and stderr
        output: String,
    },

    /// The caller cancelled the invocation, the process was killed
    #[error("'{program}' was cancelled")]
    Cancelled { program: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Errors that can occur while provisioning or cleaning up infrastructure
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// Required credential variables are missing or empty
    #[error("unable to provision on {provider}: {} cannot be empty", .missing.join(" or "))]
    MissingCredential {
        provider: String,
        missing: Vec<String>,
    },

    /// A terraform stage failed
    #[error("terraform {stage} command failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: RunError,
    },

    /// Removing the scratch test directory failed
    #[error("unable to remove test directory '{path}': {source}")]
    RemoveTestDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Terraform output could not be parsed
    #[error("invalid terraform output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    /// Provider name not recognised
    #[error("unknown provider '{0}' (expected one of: aws, digitalocean, hetzner)")]
    UnknownProvider(String),
}

impl ProvisionError {
    /// Check if the failure comes from caller cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ProvisionError::Stage {
                source: RunError::Cancelled { .. },
                ..
            }
        )
    }

    /// The failed stage, if a terraform invocation failed
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ProvisionError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
