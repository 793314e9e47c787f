//! Kubeforge Provision - cloud infrastructure for test clusters
//!
//! This crate provides:
//! - **Command Runner**: Subprocess execution with captured output and cancellation
//! - **Terraform Context**: The exact `terraform` argv contract (init/apply/output/destroy)
//! - **Providers**: AWS, DigitalOcean and Hetzner as a descriptor table
//! - **Provisioner**: Credential check, then init → apply → output, and destroy + scratch cleanup
//!
//! Concurrent provisioners must use distinct run identifiers and scratch
//! directories; the remote state backend is namespaced only by the identifier.

pub mod error;
pub mod outputs;
pub mod provider;
pub mod provisioner;
pub mod runner;
pub mod terraform;

pub use error::{ProvisionError, Result, RunError};
pub use outputs::{OutputValue, TerraformOutputs};
pub use provider::{Provider, ProviderSpec};
pub use provisioner::{ProvisionSettings, Provisioner};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, MockCommandRunner, ProcessRunner};
pub use terraform::{STATE_FILE_NAME, Stage, TERRAFORM_BINARY, TerraformContext};
