//! Machines command - delete every worker machine

use console::style;
use kubeforge_core::ClusterConfig;
use kubeforge_kube::ManifestDeployer;
use tokio_util::sync::CancellationToken;

use crate::cluster;
use crate::display;
use crate::error::Result;

/// Delete MachineDeployments, MachineSets and Machines, then wait for them to go away
pub async fn delete(
    config: &ClusterConfig,
    namespace: Option<String>,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut mc = config.machine_controller.clone();
    if let Some(namespace) = namespace {
        mc.namespace = namespace;
    }

    if !mc.deploy {
        eprintln!(
            "{} machine-controller is disabled in configuration, no machines to delete",
            style("!").yellow()
        );
        return Ok(());
    }

    let client = cluster::connect().await?;
    let deployer = ManifestDeployer::new(client.clone(), &mc.namespace);
    let controller = cluster::controller(&mc, client, deployer);

    eprintln!(
        "{} Deleting worker machines in {}",
        style("→").blue().bold(),
        style(&mc.namespace).cyan()
    );
    let spinner = display::spinner("Waiting for machines to be deleted");
    let result = controller.delete_all_machines(cancel).await;
    spinner.finish_and_clear();
    let summary = result?;

    eprintln!(
        "{} {}",
        style("✓").green().bold(),
        display::format_deletion_summary(&summary)
    );
    Ok(())
}
