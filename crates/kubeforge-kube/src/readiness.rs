//! Readiness checks for machine-controller components

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::ListParams;
use kubeforge_core::PollSettings;
use std::fmt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{MachineError, Result};

/// Deployable machine-controller component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Admission webhook serving machine validation and defaulting
    Webhook,
    /// The controller reconciling Machines into cloud instances
    Controller,
}

impl Component {
    pub fn name(self) -> &'static str {
        match self {
            Component::Webhook => "machine-controller-webhook",
            Component::Controller => "machine-controller",
        }
    }

    /// Label selector matching the component's pods
    pub fn label_selector(self) -> String {
        format!("app={}", self.name())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Waits until a component is up
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn wait_ready(&self, component: Component, cancel: &CancellationToken) -> Result<()>;
}

/// Ready pod count for one component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PodReadiness {
    pub ready: usize,
    pub total: usize,
}

impl PodReadiness {
    pub fn from_pods(pods: &[Pod]) -> Self {
        Self {
            ready: pods.iter().filter(|pod| is_pod_ready(pod)).count(),
            total: pods.len(),
        }
    }

    /// At least one pod, and all of them ready
    pub fn is_ready(&self) -> bool {
        self.total > 0 && self.ready == self.total
    }

    pub fn readiness_display(&self) -> String {
        if self.total == 0 {
            "no pods found".to_string()
        } else {
            format!("{}/{} pods ready", self.ready, self.total)
        }
    }
}

/// A pod is ready when its `Ready` condition is `True`
pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// Polls component pods through the Kubernetes API
pub struct KubeReadinessProbe {
    client: kube::Client,
    namespace: String,
    poll: PollSettings,
}

impl KubeReadinessProbe {
    pub fn new(client: kube::Client, namespace: impl Into<String>, poll: PollSettings) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            poll,
        }
    }

    async fn check_once(&self, component: Component) -> Result<PodReadiness> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = pods
            .list(&ListParams::default().labels(&component.label_selector()))
            .await?;
        Ok(PodReadiness::from_pods(&list.items))
    }
}

#[async_trait]
impl ReadinessProbe for KubeReadinessProbe {
    async fn wait_ready(&self, component: Component, cancel: &CancellationToken) -> Result<()> {
        let start = Instant::now();

        loop {
            let readiness = self.check_once(component).await?;
            if readiness.is_ready() {
                tracing::debug!(component = %component, "{}", readiness.readiness_display());
                return Ok(());
            }

            if start.elapsed() >= self.poll.timeout {
                return Err(MachineError::NotReady {
                    component: component.to_string(),
                    message: format!(
                        "{} after {:?}",
                        readiness.readiness_display(),
                        self.poll.timeout
                    ),
                });
            }

            tracing::debug!(component = %component, "Waiting: {}", readiness.readiness_display());

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(MachineError::Cancelled(format!("waiting for {}", component)));
                }
                _ = tokio::time::sleep(self.poll.interval) => {}
            }
        }
    }
}
