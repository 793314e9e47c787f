//! machine-controller commands - deploy and wait for readiness

use console::style;
use kubeforge_core::ClusterConfig;
use kubeforge_kube::ManifestDeployer;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::cluster;
use crate::display;
use crate::error::Result;

fn skipped() {
    eprintln!(
        "{} machine-controller is disabled in configuration, nothing to do",
        style("!").yellow()
    );
}

/// Apply the controller and webhook manifests
pub async fn deploy(
    config: &ClusterConfig,
    manifest: Option<&Path>,
    webhook_manifest: Option<&Path>,
    wait: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let mc = &config.machine_controller;
    if !mc.deploy {
        skipped();
        return Ok(());
    }

    let client = cluster::connect().await?;

    let mut deployer = ManifestDeployer::new(client.clone(), &mc.namespace);
    if let Some(path) = manifest {
        deployer = deployer.with_controller_manifest(tokio::fs::read_to_string(path).await?);
    }
    if let Some(path) = webhook_manifest {
        deployer = deployer.with_webhook_manifest(tokio::fs::read_to_string(path).await?);
    }

    let controller = cluster::controller(mc, client, deployer);

    eprintln!(
        "{} Deploying machine-controller to {}",
        style("→").blue().bold(),
        style(&mc.namespace).cyan()
    );
    let spinner = display::spinner("Applying manifests");
    let result = controller.ensure().await;
    spinner.finish_and_clear();
    result?;
    eprintln!("{} machine-controller deployed", style("✓").green().bold());

    if wait {
        wait_ready(&controller, cancel).await?;
    }

    Ok(())
}

/// Wait for the webhook and the controller to come up
pub async fn wait(config: &ClusterConfig, cancel: &CancellationToken) -> Result<()> {
    let mc = &config.machine_controller;
    if !mc.deploy {
        skipped();
        return Ok(());
    }

    let client = cluster::connect().await?;
    let deployer = ManifestDeployer::new(client.clone(), &mc.namespace);
    let controller = cluster::controller(mc, client, deployer);

    wait_ready(&controller, cancel).await
}

async fn wait_ready(
    controller: &cluster::KubeMachineController,
    cancel: &CancellationToken,
) -> Result<()> {
    let spinner = display::spinner("Waiting for machine-controller to come up");
    let result = controller.wait_ready(cancel).await;
    spinner.finish_and_clear();
    result?;

    eprintln!("{} machine-controller is ready", style("✓").green().bold());
    Ok(())
}
