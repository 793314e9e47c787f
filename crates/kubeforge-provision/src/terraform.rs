//! Terraform invocation contract
//!
//! The argv built here is the wire contract with the external tool and is
//! kept byte-for-byte stable:
//!
//! ```text
//! terraform init [--backend-config=key=<identifier>]
//! terraform apply -auto-approve
//! terraform output -state=terraform.tfstate -json
//! terraform destroy -auto-approve
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::error::{ProvisionError, Result};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

/// Default terraform executable
pub const TERRAFORM_BINARY: &str = "terraform";

/// Local state file read by `terraform output`
pub const STATE_FILE_NAME: &str = "terraform.tfstate";

/// Terraform stage, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    Apply,
    Output,
    Destroy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::Apply => "apply",
            Stage::Output => "output",
            Stage::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

/// One terraform working directory, optionally bound to a run identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerraformContext {
    /// Directory holding the terraform configuration
    working_dir: PathBuf,
    /// Unique identifier of the run (e.g. the build number); namespaces the remote state key
    identifier: Option<String>,
    binary: String,
    state_file: String,
}

impl TerraformContext {
    /// Create a context. An empty identifier counts as no identifier.
    pub fn new(working_dir: impl Into<PathBuf>, identifier: Option<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            identifier: identifier.filter(|id| !id.is_empty()),
            binary: TERRAFORM_BINARY.to_string(),
            state_file: STATE_FILE_NAME.to_string(),
        }
    }

    /// Use a different terraform executable
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Read outputs from a different state file
    pub fn with_state_file(mut self, state_file: impl Into<String>) -> Self {
        self.state_file = state_file.into();
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn init_args(&self) -> Vec<String> {
        let mut args = vec!["init".to_string()];
        if let Some(id) = &self.identifier {
            args.push(format!("--backend-config=key={}", id));
        }
        args
    }

    pub fn apply_args(&self) -> Vec<String> {
        vec!["apply".to_string(), "-auto-approve".to_string()]
    }

    pub fn output_args(&self) -> Vec<String> {
        vec![
            "output".to_string(),
            format!("-state={}", self.state_file),
            "-json".to_string(),
        ]
    }

    pub fn destroy_args(&self) -> Vec<String> {
        vec!["destroy".to_string(), "-auto-approve".to_string()]
    }

    /// Initialize the working directory, build the infrastructure and return
    /// the JSON-formatted outputs
    pub async fn init_and_apply<R>(
        &self,
        runner: &R,
        env: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<String>
    where
        R: CommandRunner + ?Sized,
    {
        tracing::info!(dir = %self.working_dir.display(), "Initializing terraform");
        self.run(Stage::Init, self.init_args(), runner, env, cancel)
            .await?;

        tracing::info!(dir = %self.working_dir.display(), "Applying terraform configuration");
        self.run(Stage::Apply, self.apply_args(), runner, env, cancel)
            .await?;

        self.read_outputs(runner, env, cancel).await
    }

    /// Read outputs from the local state file as JSON
    pub async fn read_outputs<R>(
        &self,
        runner: &R,
        env: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<String>
    where
        R: CommandRunner + ?Sized,
    {
        let output = self
            .run(Stage::Output, self.output_args(), runner, env, cancel)
            .await?;
        Ok(output.stdout)
    }

    /// Destroy the infrastructure tracked by this working directory
    pub async fn destroy<R>(
        &self,
        runner: &R,
        env: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        R: CommandRunner + ?Sized,
    {
        tracing::info!(dir = %self.working_dir.display(), "Destroying terraform infrastructure");
        self.run(Stage::Destroy, self.destroy_args(), runner, env, cancel)
            .await?;
        Ok(())
    }

    async fn run<R>(
        &self,
        stage: Stage,
        args: Vec<String>,
        runner: &R,
        env: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput>
    where
        R: CommandRunner + ?Sized,
    {
        let command = CommandSpec::new(&self.binary)
            .args(args)
            .current_dir(&self.working_dir)
            .envs(env);

        runner
            .execute(&command, cancel)
            .await
            .map_err(|source| ProvisionError::Stage { stage, source })
    }
}
