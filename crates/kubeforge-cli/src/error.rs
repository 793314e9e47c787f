//! CLI error types with exit code handling
//!
//! Library errors are folded into one diagnostic type here so every failure
//! prints with a code and optional help, and exits with a stable status.

use kubeforge_core::CoreError;
use kubeforge_kube::MachineError;
use kubeforge_provision::ProvisionError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Missing credentials or invalid configuration
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kubeforge::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A terraform stage failed
    #[error("Provisioning failed: {message}")]
    #[diagnostic(code(kubeforge::cli::provision))]
    Provision {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Kubernetes API or machine-controller failure
    #[error("Cluster error: {message}")]
    #[diagnostic(code(kubeforge::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The --timeout deadline passed
    #[error("Timed out: {message}")]
    #[diagnostic(code(kubeforge::cli::timeout))]
    Timeout {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Interrupted
    #[error("Cancelled: {message}")]
    #[diagnostic(code(kubeforge::cli::cancelled))]
    Cancelled { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(kubeforge::cli::io))]
    Io { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Provision { .. } => exit_codes::PROVISION_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Timeout { .. } => exit_codes::TIMEOUT,
            CliError::Cancelled { .. } => exit_codes::CANCELLED,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }

    pub fn cluster_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Re-label a cancellation caused by the --timeout deadline
    pub fn into_timeout(self, timeout: std::time::Duration) -> Self {
        match self {
            CliError::Cancelled { message } => CliError::Timeout {
                message,
                help: Some(format!(
                    "The operation did not finish within {}; raise --timeout",
                    humantime::format_duration(timeout)
                )),
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let help = match &err {
            CoreError::ConfigNotFound { .. } => {
                Some("Omit --config to use the defaults".to_string())
            }
            _ => None,
        };
        CliError::Config {
            message: err.to_string(),
            help,
        }
    }
}

impl From<ProvisionError> for CliError {
    fn from(err: ProvisionError) -> Self {
        if err.is_cancelled() {
            return CliError::Cancelled {
                message: err.to_string(),
            };
        }

        match &err {
            ProvisionError::MissingCredential { missing, .. } => CliError::Config {
                message: err.to_string(),
                help: Some(format!("Export {} before running", missing.join(" and "))),
            },
            ProvisionError::UnknownProvider(_) => CliError::Config {
                message: err.to_string(),
                help: Some("Use one of: aws, digitalocean, hetzner".to_string()),
            },
            ProvisionError::RemoveTestDir { .. } => CliError::Io {
                message: err.to_string(),
            },
            _ => CliError::Provision {
                message: err.to_string(),
                help: err.stage().map(|stage| {
                    format!(
                        "Re-run `terraform {}` in the provider directory for details",
                        stage
                    )
                }),
            },
        }
    }
}

impl From<MachineError> for CliError {
    fn from(err: MachineError) -> Self {
        if err.is_cancelled() {
            return CliError::Cancelled {
                message: err.to_string(),
            };
        }

        let help = match err.root() {
            MachineError::NotInitialized => {
                Some("Check that KUBECONFIG points at the target cluster".to_string())
            }
            MachineError::ConvergenceTimeout { .. } => Some(
                "Machines may still be finalizing; inspect them with `kubectl get machines -A`"
                    .to_string(),
            ),
            _ => None,
        };

        CliError::Cluster {
            message: err.to_string(),
            help,
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_credential_is_config_error() {
        let err: CliError = ProvisionError::MissingCredential {
            provider: "hetzner".to_string(),
            missing: vec!["HCLOUD_TOKEN".to_string()],
        }
        .into();

        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
        insta::assert_snapshot!(err.to_string(), @"Configuration error: unable to provision on hetzner: HCLOUD_TOKEN cannot be empty");
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let err: CliError = ProvisionError::UnknownProvider("gcp".to_string()).into();

        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
        assert!(matches!(err, CliError::Config { help: Some(_), .. }));
    }

    #[test]
    fn test_convergence_timeout_is_cluster_error() {
        let err: CliError = MachineError::ConvergenceTimeout {
            remaining: 1,
            timeout: Duration::from_secs(180),
        }
        .into();

        assert_eq!(err.exit_code(), exit_codes::CLUSTER_ERROR);
        assert!(matches!(err, CliError::Cluster { help: Some(_), .. }));
    }

    #[test]
    fn test_cancellation_becomes_timeout() {
        let err: CliError =
            MachineError::Cancelled("waiting for machines to be deleted".to_string()).into();
        assert_eq!(err.exit_code(), exit_codes::CANCELLED);

        let err = err.into_timeout(Duration::from_secs(600));
        assert_eq!(err.exit_code(), exit_codes::TIMEOUT);
        insta::assert_snapshot!(err.to_string(), @"Timed out: cancelled while waiting for machines to be deleted");
    }
}
