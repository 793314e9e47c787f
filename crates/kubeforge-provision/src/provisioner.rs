//! Provisioner for test-cluster infrastructure
//!
//! One provisioner is created per test run. `provision` checks credentials
//! before spawning anything, then runs init → apply → output. `cleanup`
//! destroys the infrastructure and removes the scratch test directory; both
//! steps are attempted even if the first one fails.

use kubeforge_core::CredentialSource;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{ProvisionError, Result};
use crate::provider::Provider;
use crate::runner::CommandRunner;
use crate::terraform::{STATE_FILE_NAME, TERRAFORM_BINARY, TerraformContext};

/// Where the terraform configurations live and how to invoke terraform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionSettings {
    /// Directory containing one sub-directory per provider
    pub terraform_root: PathBuf,
    /// Terraform executable
    pub terraform_binary: String,
    /// State file read by `terraform output`
    pub state_file: String,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            terraform_root: PathBuf::from("../../examples/terraform"),
            terraform_binary: TERRAFORM_BINARY.to_string(),
            state_file: STATE_FILE_NAME.to_string(),
        }
    }
}

impl ProvisionSettings {
    /// Working directory for a provider
    pub fn working_dir(&self, provider: Provider) -> PathBuf {
        self.terraform_root.join(provider.directory())
    }
}

/// Provisions and cleans up the infrastructure of one test run
pub struct Provisioner<R: CommandRunner> {
    provider: Provider,
    /// Scratch directory of the test run, removed on cleanup
    test_path: PathBuf,
    terraform: TerraformContext,
    credentials: Arc<dyn CredentialSource>,
    runner: R,
}

impl<R: CommandRunner> Provisioner<R> {
    /// Create a provisioner
    ///
    /// `identifier` must be unique among concurrent runs sharing a remote
    /// state backend, and `test_path` must not be shared between them.
    pub fn new(
        provider: Provider,
        settings: &ProvisionSettings,
        test_path: impl Into<PathBuf>,
        identifier: Option<String>,
        credentials: Arc<dyn CredentialSource>,
        runner: R,
    ) -> Self {
        let terraform = TerraformContext::new(settings.working_dir(provider), identifier)
            .with_binary(settings.terraform_binary.clone())
            .with_state_file(settings.state_file.clone());

        Self {
            provider,
            test_path: test_path.into(),
            terraform,
            credentials,
            runner,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn test_path(&self) -> &Path {
        &self.test_path
    }

    pub fn terraform(&self) -> &TerraformContext {
        &self.terraform
    }

    /// Build the infrastructure and return the terraform outputs as JSON
    pub async fn provision(&self, cancel: &CancellationToken) -> Result<String> {
        let env = self.provider.resolve_credentials(self.credentials.as_ref())?;

        tracing::info!(
            provider = %self.provider,
            identifier = self.terraform.identifier().unwrap_or("-"),
            "Provisioning infrastructure"
        );

        self.terraform
            .init_and_apply(&self.runner, &env, cancel)
            .await
    }

    /// Destroy the infrastructure, then remove the scratch test directory
    ///
    /// Directory removal is attempted even when destroy fails. The first
    /// error is returned; a second one is only logged.
    pub async fn cleanup(&self, cancel: &CancellationToken) -> Result<()> {
        let env = self
            .provider
            .available_credentials(self.credentials.as_ref());

        let destroyed = self.terraform.destroy(&self.runner, &env, cancel).await;
        let removed = self.remove_test_dir().await;

        match (destroyed, removed) {
            (Err(destroy_err), Err(remove_err)) => {
                tracing::warn!("Test directory was not removed: {}", remove_err);
                Err(destroy_err)
            }
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    async fn remove_test_dir(&self) -> Result<()> {
        if self.test_path.as_os_str().is_empty() {
            return Ok(());
        }

        tracing::debug!(path = %self.test_path.display(), "Removing test directory");
        let removed = match tokio::fs::symlink_metadata(&self.test_path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&self.test_path).await,
            // Files and symlinks are removed themselves, never followed
            Ok(_) => tokio::fs::remove_file(&self.test_path).await,
            Err(e) => Err(e),
        };
        match removed {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ProvisionError::RemoveTestDir {
                path: self.test_path.display().to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::MockCommandRunner;
    use crate::terraform::Stage;
    use kubeforge_core::StaticCredentials;

    const OUTPUT_JSON: &str =
        r#"{"kubeone_api":{"sensitive":false,"type":"string","value":"10.0.0.1"}}"#;

    fn all_credentials() -> Arc<dyn CredentialSource> {
        Arc::new(
            StaticCredentials::new()
                .with("AWS_ACCESS_KEY_ID", "AKIA")
                .with("AWS_SECRET_ACCESS_KEY", "s3cr3t")
                .with("DIGITALOCEAN_TOKEN", "do-token")
                .with("HCLOUD_TOKEN", "hcloud-token"),
        )
    }

    fn provisioner(
        provider: Provider,
        test_path: &Path,
        credentials: Arc<dyn CredentialSource>,
        runner: MockCommandRunner,
    ) -> Provisioner<MockCommandRunner> {
        Provisioner::new(
            provider,
            &ProvisionSettings::default(),
            test_path,
            Some("run-7".to_string()),
            credentials,
            runner,
        )
    }

    #[tokio::test]
    async fn test_provision_runs_pipeline_in_order() {
        for provider in Provider::ALL {
            let runner = MockCommandRunner::new().respond("output", OUTPUT_JSON);
            let p = provisioner(provider, Path::new(""), all_credentials(), runner.clone());

            let output = p.provision(&CancellationToken::new()).await.unwrap();

            assert_eq!(output, OUTPUT_JSON);
            assert_eq!(runner.subcommands(), vec!["init", "apply", "output"]);
            let calls = runner.invocations();
            assert_eq!(calls[0].args[1], "--backend-config=key=run-7");
            assert_eq!(
                calls[0].working_dir.as_deref(),
                Some(Path::new("../../examples/terraform").join(provider.directory()).as_path())
            );
        }
    }

    #[tokio::test]
    async fn test_provision_passes_credentials_to_terraform() {
        let runner = MockCommandRunner::new();
        let p = provisioner(Provider::Hetzner, Path::new(""), all_credentials(), runner.clone());

        p.provision(&CancellationToken::new()).await.unwrap();

        for call in runner.invocations() {
            assert_eq!(call.env.get("HCLOUD_TOKEN").map(String::as_str), Some("hcloud-token"));
            assert!(!call.env.contains_key("AWS_ACCESS_KEY_ID"));
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_spawn_nothing() {
        for provider in Provider::ALL {
            for missing in provider.required_credentials() {
                let creds: StaticCredentials = provider
                    .required_credentials()
                    .iter()
                    .map(|key| (*key, if key == missing { "" } else { "set" }))
                    .collect();
                let runner = MockCommandRunner::new();
                let p = provisioner(provider, Path::new(""), Arc::new(creds), runner.clone());

                let err = p.provision(&CancellationToken::new()).await.unwrap_err();

                assert!(matches!(err, ProvisionError::MissingCredential { .. }));
                assert_eq!(runner.call_count(), 0, "{} spawned a process", provider);
            }
        }
    }

    #[tokio::test]
    async fn test_stage_failure_stops_later_stages() {
        let cases = [
            ("init", Stage::Init, vec!["init"]),
            ("apply", Stage::Apply, vec!["init", "apply"]),
            ("output", Stage::Output, vec!["init", "apply", "output"]),
        ];

        for (subcommand, stage, expected_calls) in cases {
            let runner =
                MockCommandRunner::new().fail(subcommand, 1, format!("{} exploded", subcommand));
            let p = provisioner(
                Provider::DigitalOcean,
                Path::new(""),
                all_credentials(),
                runner.clone(),
            );

            let err = p.provision(&CancellationToken::new()).await.unwrap_err();

            assert_eq!(err.stage(), Some(stage));
            assert!(err.to_string().contains(&format!("{} exploded", subcommand)));
            assert_eq!(runner.subcommands(), expected_calls);
        }
    }

    #[tokio::test]
    async fn test_cleanup_destroys_then_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let test_path = dir.path().join("run-7");
        std::fs::create_dir_all(test_path.join("nested")).unwrap();
        std::fs::write(test_path.join("nested/kubeconfig"), "apiVersion: v1").unwrap();

        let runner = MockCommandRunner::new();
        let p = provisioner(Provider::Aws, &test_path, all_credentials(), runner.clone());

        p.cleanup(&CancellationToken::new()).await.unwrap();

        assert_eq!(runner.subcommands(), vec!["destroy"]);
        assert_eq!(runner.invocations()[0].args, vec!["destroy", "-auto-approve"]);
        assert!(!test_path.exists());
    }

    #[tokio::test]
    async fn test_cleanup_removes_directory_even_when_destroy_fails() {
        let dir = tempfile::tempdir().unwrap();
        let test_path = dir.path().join("run-7");
        std::fs::create_dir_all(&test_path).unwrap();

        let runner = MockCommandRunner::new().fail("destroy", 1, "state locked");
        let p = provisioner(Provider::Hetzner, &test_path, all_credentials(), runner.clone());

        let err = p.cleanup(&CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Destroy));
        assert!(err.to_string().contains("state locked"));
        assert!(!test_path.exists());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let p = provisioner(
            Provider::Aws,
            &dir.path().join("never-created"),
            all_credentials(),
            MockCommandRunner::new(),
        );

        p.cleanup(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_removes_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let test_path = dir.path().join("run-7.log");
        std::fs::write(&test_path, "leftover").unwrap();

        let p = provisioner(Provider::Aws, &test_path, all_credentials(), MockCommandRunner::new());

        p.cleanup(&CancellationToken::new()).await.unwrap();
        assert!(!test_path.exists());
    }

    #[tokio::test]
    async fn test_cleanup_without_credentials_still_runs_destroy() {
        let runner = MockCommandRunner::new();
        let p = provisioner(
            Provider::Aws,
            Path::new(""),
            Arc::new(StaticCredentials::new()),
            runner.clone(),
        );

        p.cleanup(&CancellationToken::new()).await.unwrap();
        assert_eq!(runner.subcommands(), vec!["destroy"]);
    }

    #[tokio::test]
    async fn test_cancelled_provision() {
        let runner = MockCommandRunner::new();
        let p = provisioner(Provider::Aws, Path::new(""), all_credentials(), runner.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = p.provision(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.stage(), Some(Stage::Init));
    }
}
