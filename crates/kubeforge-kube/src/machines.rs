//! Worker machine teardown
//!
//! Deletes every MachineDeployment, MachineSet and Machine in a namespace,
//! top-down, then waits until the machine-controller has finished removing
//! the Machines (and their cloud instances).

use kubeforge_core::PollSettings;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::ClusterClient;
use crate::error::{MachineError, Result};
use crate::resources::{MACHINE, MACHINE_DEPLOYMENT, MACHINE_SET, ObjectRef, ResourceKind};

/// What a teardown deleted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionSummary {
    pub machine_deployments: usize,
    pub machine_sets: usize,
    pub machines: usize,
    /// The cascade did not run (feature disabled or CRDs absent)
    pub skipped: bool,
}

impl DeletionSummary {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Runs the deletion cascade against one namespace
pub struct MachineCleaner<'a, C: ClusterClient + ?Sized> {
    client: &'a C,
    namespace: &'a str,
    poll: PollSettings,
}

impl<'a, C: ClusterClient + ?Sized> MachineCleaner<'a, C> {
    pub fn new(client: &'a C, namespace: &'a str, poll: PollSettings) -> Self {
        Self {
            client,
            namespace,
            poll,
        }
    }

    /// Delete all worker machines and wait for them to be gone
    ///
    /// Returns success without further calls when the MachineDeployment
    /// kind is not registered in the cluster.
    pub async fn delete_all(&self, cancel: &CancellationToken) -> Result<DeletionSummary> {
        let deployments = match self.client.list(self.namespace, &MACHINE_DEPLOYMENT).await {
            Ok(items) => items,
            Err(e) if e.is_kind_not_registered() => {
                tracing::warn!(
                    "Skipping deleting worker machines because MachineDeployments CRD is not deployed"
                );
                return Ok(DeletionSummary::skipped());
            }
            Err(source) => {
                return Err(MachineError::Cluster {
                    context: list_context(&MACHINE_DEPLOYMENT),
                    source,
                });
            }
        };

        let mut summary = DeletionSummary {
            machine_deployments: self.delete_each(&deployments, cancel).await?,
            ..DeletionSummary::default()
        };

        let sets = self.list(&MACHINE_SET).await?;
        summary.machine_sets = self.delete_each(&sets, cancel).await?;

        let machines = self.list(&MACHINE).await?;
        summary.machines = self.delete_each(&machines, cancel).await?;

        tracing::info!(
            deployments = summary.machine_deployments,
            sets = summary.machine_sets,
            machines = summary.machines,
            "Waiting for all machines to get deleted"
        );
        self.wait_for_machines(cancel).await?;

        Ok(summary)
    }

    async fn list(&self, kind: &ResourceKind) -> Result<Vec<ObjectRef>> {
        self.client
            .list(self.namespace, kind)
            .await
            .map_err(|source| MachineError::Cluster {
                context: list_context(kind),
                source,
            })
    }

    async fn delete_each(
        &self,
        objects: &[ObjectRef],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        for object in objects {
            if cancel.is_cancelled() {
                return Err(MachineError::Cancelled(format!("deleting {}", object)));
            }
            tracing::debug!(object = %object, "Deleting");
            self.client
                .delete(object)
                .await
                .map_err(|source| MachineError::Cluster {
                    context: format!("unable to delete {} object", object.kind.singular()),
                    source,
                })?;
        }
        Ok(objects.len())
    }

    /// Poll until no Machine is left, the window closes, or the caller cancels
    async fn wait_for_machines(&self, cancel: &CancellationToken) -> Result<()> {
        let start = Instant::now();

        loop {
            let remaining = self.list(&MACHINE).await?.len();
            if remaining == 0 {
                return Ok(());
            }

            if start.elapsed() >= self.poll.timeout {
                return Err(MachineError::ConvergenceTimeout {
                    remaining,
                    timeout: self.poll.timeout,
                });
            }

            tracing::debug!(remaining, "Machines still present");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(MachineError::Cancelled(
                        "waiting for machines to be deleted".to_string(),
                    ));
                }
                _ = tokio::time::sleep(self.poll.interval) => {}
            }
        }
    }
}

fn list_context(kind: &ResourceKind) -> String {
    format!("unable to list {} objects", kind.singular())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClusterErrorKind;
    use crate::mock::{ClientCall, MockClusterClient};
    use std::time::Duration;

    const NS: &str = "kube-system";

    fn poll() -> PollSettings {
        PollSettings::new(Duration::from_secs(5), Duration::from_secs(180))
    }

    fn populated() -> MockClusterClient {
        MockClusterClient::new()
            .with_objects(MACHINE_DEPLOYMENT, NS, &["pool1"])
            .with_objects(MACHINE_SET, NS, &["pool1-abc"])
            .with_objects(MACHINE, NS, &["pool1-abc-1", "pool1-abc-2"])
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_cluster_returns_without_sleeping() {
        let client = MockClusterClient::new();
        let start = Instant::now();

        let summary = MachineCleaner::new(&client, NS, poll())
            .delete_all(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary, DeletionSummary::default());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(client.list_count(&MACHINE), 2);
    }

    #[tokio::test]
    async fn test_kind_not_registered_skips_everything() {
        let client = populated().fail_list(MACHINE_DEPLOYMENT, ClusterErrorKind::KindNotRegistered);

        let summary = MachineCleaner::new(&client, NS, poll())
            .delete_all(&CancellationToken::new())
            .await
            .unwrap();

        assert!(summary.skipped);
        assert_eq!(client.calls().len(), 1);
        assert!(!client.touched(&MACHINE_SET));
        assert!(!client.touched(&MACHINE));
    }

    #[tokio::test]
    async fn test_timeout_listing_deployments_is_fatal() {
        let client = populated().fail_list(MACHINE_DEPLOYMENT, ClusterErrorKind::Timeout);

        let err = MachineCleaner::new(&client, NS, poll())
            .delete_all(&CancellationToken::new())
            .await
            .unwrap_err();

        insta::assert_snapshot!(err.to_string(), @"unable to list machinedeployment objects: machinedeployments list failed (timeout)");
        assert!(!client.touched(&MACHINE_SET));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletes_top_down() {
        let client = populated();

        let summary = MachineCleaner::new(&client, NS, poll())
            .delete_all(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.machine_deployments, 1);
        assert_eq!(summary.machine_sets, 1);
        assert_eq!(summary.machines, 2);

        let kinds: Vec<_> = client.deletes().iter().map(|o| o.kind.kind).collect();
        assert_eq!(
            kinds,
            vec!["MachineDeployment", "MachineSet", "Machine", "Machine"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lists_only_after_previous_level_is_deleted() {
        let client = populated();

        MachineCleaner::new(&client, NS, poll())
            .delete_all(&CancellationToken::new())
            .await
            .unwrap();

        let calls = client.calls();
        let position = |pred: &dyn Fn(&ClientCall) -> bool| calls.iter().position(pred).unwrap();
        let deployment_deleted =
            position(&|c| matches!(c, ClientCall::Delete(o) if o.kind == MACHINE_DEPLOYMENT));
        let sets_listed =
            position(&|c| matches!(c, ClientCall::List { kind, .. } if *kind == MACHINE_SET));
        let set_deleted =
            position(&|c| matches!(c, ClientCall::Delete(o) if o.kind == MACHINE_SET));
        let machines_listed =
            position(&|c| matches!(c, ClientCall::List { kind, .. } if *kind == MACHINE));

        assert!(deployment_deleted < sets_listed);
        assert!(set_deleted < machines_listed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_finalizers() {
        let client = populated().finalize_after(MACHINE, 3);
        let start = Instant::now();

        MachineCleaner::new(&client, NS, poll())
            .delete_all(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_machines_time_out() {
        let client = populated().never_finalize(MACHINE);

        let err = MachineCleaner::new(&client, NS, poll())
            .delete_all(&CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            MachineError::ConvergenceTimeout { remaining, timeout } => {
                assert_eq!(remaining, 2);
                assert_eq!(timeout, Duration::from_secs(180));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        // One list before deleting, then one poll at every 5s tick from 0s to 180s
        assert_eq!(client.list_count(&MACHINE), 1 + 37);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_error_while_polling_is_fatal() {
        let client = populated()
            .never_finalize(MACHINE)
            .fail_list_after(MACHINE, 3, ClusterErrorKind::Other);

        let err = MachineCleaner::new(&client, NS, poll())
            .delete_all(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MachineError::Cluster { .. }));
        assert_eq!(client.list_count(&MACHINE), 4);
    }

    #[tokio::test]
    async fn test_delete_failure_is_fatal() {
        let client = populated().fail_delete(MACHINE_SET, ClusterErrorKind::Other);

        let err = MachineCleaner::new(&client, NS, poll())
            .delete_all(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("unable to delete machineset object"));
        assert!(!client.touched(&MACHINE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_poll() {
        let client = populated().never_finalize(MACHINE);
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(12)).await;
                cancel.cancel();
            })
        };

        let err = MachineCleaner::new(&client, NS, poll())
            .delete_all(&cancel)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        assert!(client.list_count(&MACHINE) < 10);
    }
}
