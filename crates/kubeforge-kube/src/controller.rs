//! machine-controller lifecycle
//!
//! [`MachineController`] gates every operation behind the
//! `machineController.deploy` flag: when it is off, nothing is deployed,
//! awaited or deleted and every operation succeeds.

use kubeforge_core::MachineControllerConfig;
use tokio_util::sync::CancellationToken;

use crate::client::ClusterClient;
use crate::deploy::ComponentDeployer;
use crate::error::{MachineError, Result};
use crate::machines::{DeletionSummary, MachineCleaner};
use crate::readiness::{Component, ReadinessProbe};

/// Deploys, awaits and tears down the machine-controller and its machines
pub struct MachineController<C, D, P> {
    config: MachineControllerConfig,
    /// Absent when no cluster connection could be made
    client: Option<C>,
    deployer: D,
    probe: P,
}

impl<C, D, P> MachineController<C, D, P>
where
    C: ClusterClient,
    D: ComponentDeployer,
    P: ReadinessProbe,
{
    pub fn new(config: MachineControllerConfig, client: Option<C>, deployer: D, probe: P) -> Self {
        Self {
            config,
            client,
            deployer,
            probe,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.deploy
    }

    pub fn config(&self) -> &MachineControllerConfig {
        &self.config
    }

    /// Install the machine-controller
    pub async fn deploy(&self) -> Result<()> {
        if !self.is_enabled() {
            tracing::info!(
                "Skipping machine-controller deployment because it was disabled in configuration."
            );
            return Ok(());
        }

        self.deployer
            .deploy()
            .await
            .map_err(|e| e.context("failed to deploy machine-controller"))
    }

    /// Install the machine-controller admission webhook
    pub async fn deploy_webhook(&self) -> Result<()> {
        if !self.is_enabled() {
            tracing::info!(
                "Skipping machine-controller webhook deployment because it was disabled in configuration."
            );
            return Ok(());
        }

        self.deployer
            .deploy_webhook()
            .await
            .map_err(|e| e.context("failed to deploy machine-controller webhook configuration"))
    }

    /// Install the controller, then the webhook
    pub async fn ensure(&self) -> Result<()> {
        if !self.is_enabled() {
            tracing::info!(
                "Skipping machine-controller deployment because it was disabled in configuration."
            );
            return Ok(());
        }

        tracing::info!("Installing machine-controller…");
        self.deploy().await?;

        tracing::info!("Installing machine-controller webhooks…");
        self.deploy_webhook().await
    }

    /// Wait for the webhook, then the controller, to come up
    pub async fn wait_ready(&self, cancel: &CancellationToken) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        tracing::info!("Waiting for machine-controller to come up…");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(MachineError::Cancelled(
                    "waiting for machine-controller to settle".to_string(),
                ));
            }
            _ = tokio::time::sleep(self.config.settle_delay) => {}
        }

        for component in [Component::Webhook, Component::Controller] {
            self.probe
                .wait_ready(component, cancel)
                .await
                .map_err(|e| e.context(format!("{} did not come up", component)))?;
        }

        Ok(())
    }

    /// Delete every worker machine and wait until they are gone
    pub async fn delete_all_machines(&self, cancel: &CancellationToken) -> Result<DeletionSummary> {
        if !self.is_enabled() {
            tracing::info!(
                "Skipping deleting worker machines because machine-controller is disabled in configuration."
            );
            return Ok(DeletionSummary::skipped());
        }

        let client = self.client.as_ref().ok_or(MachineError::NotInitialized)?;

        MachineCleaner::new(client, &self.config.namespace, self.config.deletion)
            .delete_all(cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockClusterClient;
    use crate::resources::{MACHINE, MACHINE_DEPLOYMENT};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    type CallLog = Arc<Mutex<Vec<String>>>;

    #[derive(Clone, Default)]
    struct RecordingDeployer {
        calls: CallLog,
        fail: bool,
    }

    #[async_trait]
    impl ComponentDeployer for RecordingDeployer {
        async fn deploy(&self) -> Result<()> {
            self.calls.lock().unwrap().push("deploy".to_string());
            if self.fail {
                return Err(MachineError::Deploy {
                    component: "machine-controller".to_string(),
                    message: "forbidden".to_string(),
                });
            }
            Ok(())
        }

        async fn deploy_webhook(&self) -> Result<()> {
            self.calls.lock().unwrap().push("deploy_webhook".to_string());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingProbe {
        calls: CallLog,
        not_ready: Option<Component>,
    }

    #[async_trait]
    impl ReadinessProbe for RecordingProbe {
        async fn wait_ready(
            &self,
            component: Component,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            self.calls.lock().unwrap().push(component.to_string());
            if self.not_ready == Some(component) {
                return Err(MachineError::NotReady {
                    component: component.to_string(),
                    message: "0/1 pods ready after 180s".to_string(),
                });
            }
            Ok(())
        }
    }

    fn config(deploy: bool) -> MachineControllerConfig {
        MachineControllerConfig {
            deploy,
            ..MachineControllerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_makes_no_calls() {
        let client = MockClusterClient::new().with_objects(MACHINE, "kube-system", &["m1"]);
        let deployer = RecordingDeployer::default();
        let probe = RecordingProbe::default();
        let mc = MachineController::new(
            config(false),
            Some(client.clone()),
            deployer.clone(),
            probe.clone(),
        );
        let cancel = CancellationToken::new();
        let start = Instant::now();

        mc.deploy().await.unwrap();
        mc.deploy_webhook().await.unwrap();
        mc.ensure().await.unwrap();
        mc.wait_ready(&cancel).await.unwrap();
        let summary = mc.delete_all_machines(&cancel).await.unwrap();

        assert!(summary.skipped);
        assert!(deployer.calls.lock().unwrap().is_empty());
        assert!(probe.calls.lock().unwrap().is_empty());
        assert!(client.calls().is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_disabled_webhook_deploy_is_skipped() {
        let deployer = RecordingDeployer::default();
        let mc = MachineController::new(
            config(false),
            Some(MockClusterClient::new()),
            deployer.clone(),
            RecordingProbe::default(),
        );

        mc.deploy_webhook().await.unwrap();
        assert!(deployer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_webhook_alone() {
        let deployer = RecordingDeployer::default();
        let mc = MachineController::new(
            config(true),
            Some(MockClusterClient::new()),
            deployer.clone(),
            RecordingProbe::default(),
        );

        mc.deploy_webhook().await.unwrap();
        assert_eq!(*deployer.calls.lock().unwrap(), vec!["deploy_webhook"]);
    }

    #[tokio::test]
    async fn test_disabled_without_client_succeeds() {
        let mc: MachineController<MockClusterClient, _, _> = MachineController::new(
            config(false),
            None,
            RecordingDeployer::default(),
            RecordingProbe::default(),
        );
        mc.delete_all_machines(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_client_is_not_initialized() {
        let mc: MachineController<MockClusterClient, _, _> = MachineController::new(
            config(true),
            None,
            RecordingDeployer::default(),
            RecordingProbe::default(),
        );

        let err = mc
            .delete_all_machines(&CancellationToken::new())
            .await
            .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"kubernetes client not initialized");
    }

    #[tokio::test]
    async fn test_ensure_deploys_controller_then_webhook() {
        let deployer = RecordingDeployer::default();
        let mc = MachineController::new(
            config(true),
            Some(MockClusterClient::new()),
            deployer.clone(),
            RecordingProbe::default(),
        );

        mc.ensure().await.unwrap();
        assert_eq!(*deployer.calls.lock().unwrap(), vec!["deploy", "deploy_webhook"]);
    }

    #[tokio::test]
    async fn test_ensure_stops_on_deploy_failure() {
        let deployer = RecordingDeployer {
            fail: true,
            ..Default::default()
        };
        let mc = MachineController::new(
            config(true),
            Some(MockClusterClient::new()),
            deployer.clone(),
            RecordingProbe::default(),
        );

        let err = mc.ensure().await.unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"failed to deploy machine-controller: failed to apply machine-controller: forbidden");
        assert_eq!(*deployer.calls.lock().unwrap(), vec!["deploy"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_settles_then_checks_webhook_first() {
        let probe = RecordingProbe::default();
        let mc = MachineController::new(
            config(true),
            Some(MockClusterClient::new()),
            RecordingDeployer::default(),
            probe.clone(),
        );
        let start = Instant::now();

        mc.wait_ready(&CancellationToken::new()).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(
            *probe.calls.lock().unwrap(),
            vec!["machine-controller-webhook", "machine-controller"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_short_circuits_on_webhook() {
        let probe = RecordingProbe {
            not_ready: Some(Component::Webhook),
            ..Default::default()
        };
        let mc = MachineController::new(
            config(true),
            Some(MockClusterClient::new()),
            RecordingDeployer::default(),
            probe.clone(),
        );

        let err = mc.wait_ready(&CancellationToken::new()).await.unwrap_err();

        assert!(err.to_string().starts_with("machine-controller-webhook did not come up"));
        assert_eq!(*probe.calls.lock().unwrap(), vec!["machine-controller-webhook"]);
    }

    #[tokio::test]
    async fn test_wait_ready_cancelled_during_settle() {
        let probe = RecordingProbe::default();
        let mc = MachineController::new(
            config(true),
            Some(MockClusterClient::new()),
            RecordingDeployer::default(),
            probe.clone(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = mc.wait_ready(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(probe.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_machines_runs_cascade_in_configured_namespace() {
        let client = MockClusterClient::new()
            .with_objects(MACHINE_DEPLOYMENT, "workers", &["pool1"])
            .with_objects(MACHINE_DEPLOYMENT, "kube-system", &["ignored"]);
        let mut cfg = config(true);
        cfg.namespace = "workers".to_string();
        let mc = MachineController::new(
            cfg,
            Some(client.clone()),
            RecordingDeployer::default(),
            RecordingProbe::default(),
        );

        let summary = mc
            .delete_all_machines(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.machine_deployments, 1);
        assert_eq!(client.deletes()[0].name, "pool1");
    }
}
