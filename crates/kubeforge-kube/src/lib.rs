//! Kubeforge Kube - Kubernetes integration for kubeforge
//!
//! This crate provides:
//! - **Cluster Client**: list/delete seam with explicit error kinds, backed by kube-rs or an in-memory mock
//! - **Machine Teardown**: MachineDeployment → MachineSet → Machine deletion with a bounded wait
//! - **Readiness**: pod-based readiness checks for the machine-controller and its webhook
//! - **Deployment**: Server-Side Apply of component manifests
//! - **Orchestration**: feature-gated machine-controller lifecycle

pub mod client;
pub mod controller;
pub mod deploy;
pub mod error;
pub mod machines;
pub mod mock;
pub mod readiness;
pub mod resources;

pub use client::{
    ClusterClient, ClusterError, ClusterErrorKind, ClusterOperation, KubeClusterClient, classify,
};
pub use controller::MachineController;
pub use deploy::{ComponentDeployer, FIELD_MANAGER, ManifestDeployer, parse_documents};
pub use error::{MachineError, Result};
pub use machines::{DeletionSummary, MachineCleaner};
pub use mock::{ClientCall, MockClusterClient};
pub use readiness::{Component, KubeReadinessProbe, PodReadiness, ReadinessProbe};
pub use resources::{MACHINE, MACHINE_DEPLOYMENT, MACHINE_SET, ObjectRef, ResourceKind};
