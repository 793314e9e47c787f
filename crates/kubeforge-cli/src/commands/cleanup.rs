//! Cleanup command - destroy test infrastructure and its scratch directory

use console::style;
use kubeforge_core::EnvCredentials;
use kubeforge_provision::{ProcessRunner, Provider, ProvisionSettings, Provisioner};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::display;
use crate::error::Result;

/// Run the cleanup command
pub async fn run(
    provider: Provider,
    settings: &ProvisionSettings,
    test_path: &Path,
    identifier: Option<String>,
    cancel: &CancellationToken,
) -> Result<()> {
    let provisioner = Provisioner::new(
        provider,
        settings,
        test_path,
        identifier,
        Arc::new(EnvCredentials),
        ProcessRunner::new(),
    );

    eprintln!(
        "{} Destroying {} infrastructure",
        style("→").blue().bold(),
        style(provider).cyan()
    );

    let spinner = display::spinner("terraform destroy");
    let result = provisioner.cleanup(cancel).await;
    spinner.finish_and_clear();
    result?;

    eprintln!("{} Infrastructure destroyed", style("✓").green().bold());
    Ok(())
}
