//! Cluster connection and machine-controller wiring shared by commands

use kubeforge_core::{ClusterConfig, MachineControllerConfig};
use kubeforge_kube::{
    KubeClusterClient, KubeReadinessProbe, MachineController, MachineError, ManifestDeployer,
};
use std::path::Path;

use crate::error::{CliError, Result};

pub type KubeMachineController =
    MachineController<KubeClusterClient, ManifestDeployer, KubeReadinessProbe>;

/// Load `--config`, or the default location, or built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<ClusterConfig> {
    let config = match path {
        Some(path) => ClusterConfig::load_from(path)?,
        None => ClusterConfig::load()?,
    };
    Ok(config)
}

/// Connect using KUBECONFIG or the in-cluster service account
pub async fn connect() -> Result<kube::Client> {
    kube::Client::try_default().await.map_err(|e| {
        CliError::cluster_with_help(
            format!("{}: {}", MachineError::NotInitialized, e),
            "Check that KUBECONFIG points at the target cluster",
        )
    })
}

pub fn controller(
    config: &MachineControllerConfig,
    client: kube::Client,
    deployer: ManifestDeployer,
) -> KubeMachineController {
    let probe = KubeReadinessProbe::new(client.clone(), &config.namespace, config.readiness);
    MachineController::new(
        config.clone(),
        Some(KubeClusterClient::new(client)),
        deployer,
        probe,
    )
}
