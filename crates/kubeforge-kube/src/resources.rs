//! Cluster API machine resource kinds
//!
//! The teardown cascade walks `MachineDeployment` → `MachineSet` → `Machine`
//! in the `cluster.k8s.io/v1alpha1` group. Objects are addressed by kind,
//! namespace and name only; owner references are left to the cluster.

use kube::core::{ApiResource, GroupVersionKind};
use std::fmt;

/// A namespaced custom resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    /// Plural used in API paths
    pub plural: &'static str,
}

pub const CLUSTER_API_GROUP: &str = "cluster.k8s.io";
pub const CLUSTER_API_VERSION: &str = "v1alpha1";

pub const MACHINE_DEPLOYMENT: ResourceKind = ResourceKind {
    group: CLUSTER_API_GROUP,
    version: CLUSTER_API_VERSION,
    kind: "MachineDeployment",
    plural: "machinedeployments",
};

pub const MACHINE_SET: ResourceKind = ResourceKind {
    group: CLUSTER_API_GROUP,
    version: CLUSTER_API_VERSION,
    kind: "MachineSet",
    plural: "machinesets",
};

pub const MACHINE: ResourceKind = ResourceKind {
    group: CLUSTER_API_GROUP,
    version: CLUSTER_API_VERSION,
    kind: "Machine",
    plural: "machines",
};

impl ResourceKind {
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(self.group, self.version, self.kind)
    }

    /// Dynamic API resource for `kube::Api<DynamicObject>`
    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(&self.gvk(), self.plural)
    }

    /// Lower-case kind, as used in messages
    pub fn singular(&self) -> String {
        self.kind.to_ascii_lowercase()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.plural, self.group)
    }
}

/// Reference to one object in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind.kind, self.namespace, self.name)
    }
}
