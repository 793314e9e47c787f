//! Cluster resource client
//!
//! [`ClusterClient`] is the seam between the teardown cascade and the
//! Kubernetes API. Failures carry an explicit [`ClusterErrorKind`] so callers
//! branch on the kind instead of inspecting message text.

use async_trait::async_trait;
use kube::Api;
use kube::api::{DeleteParams, DynamicObject, ListParams};
use std::fmt;
use thiserror::Error;

use crate::resources::{ObjectRef, ResourceKind};

/// Classification of a cluster client failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterErrorKind {
    /// The resource type is not served by the cluster (CRD missing)
    KindNotRegistered,
    /// The object does not exist
    NotFound,
    /// The API server timed out
    Timeout,
    Other,
}

impl fmt::Display for ClusterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterErrorKind::KindNotRegistered => "kind not registered",
            ClusterErrorKind::NotFound => "not found",
            ClusterErrorKind::Timeout => "timeout",
            ClusterErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Failure reported by a [`ClusterClient`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClusterError {
    pub kind: ClusterErrorKind,
    pub message: String,
}

impl ClusterError {
    pub fn new(kind: ClusterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_kind_not_registered(&self) -> bool {
        self.kind == ClusterErrorKind::KindNotRegistered
    }
}

/// List and delete namespaced objects
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List objects of a kind in a namespace
    async fn list(
        &self,
        namespace: &str,
        kind: &ResourceKind,
    ) -> std::result::Result<Vec<ObjectRef>, ClusterError>;

    /// Delete one object
    async fn delete(&self, object: &ObjectRef) -> std::result::Result<(), ClusterError>;
}

/// Which call produced an API error; a 404 means different things for each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterOperation {
    List,
    Delete,
}

/// Map a kube-rs error onto a [`ClusterErrorKind`]
pub fn classify(err: &kube::Error, operation: ClusterOperation) -> ClusterErrorKind {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => match operation {
            ClusterOperation::List => ClusterErrorKind::KindNotRegistered,
            ClusterOperation::Delete => ClusterErrorKind::NotFound,
        },
        kube::Error::Api(resp)
            if resp.code == 504 || resp.reason == "Timeout" || resp.reason == "ServerTimeout" =>
        {
            ClusterErrorKind::Timeout
        }
        _ => ClusterErrorKind::Other,
    }
}

fn to_cluster_error(err: kube::Error, operation: ClusterOperation) -> ClusterError {
    ClusterError::new(classify(&err, operation), err.to_string())
}

/// [`ClusterClient`] backed by kube-rs dynamic objects
#[derive(Clone)]
pub struct KubeClusterClient {
    client: kube::Client,
}

impl KubeClusterClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str, kind: &ResourceKind) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource())
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn list(
        &self,
        namespace: &str,
        kind: &ResourceKind,
    ) -> std::result::Result<Vec<ObjectRef>, ClusterError> {
        let list = self
            .api(namespace, kind)
            .list(&ListParams::default())
            .await
            .map_err(|e| to_cluster_error(e, ClusterOperation::List))?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|obj| {
                let name = obj.metadata.name?;
                let ns = obj
                    .metadata
                    .namespace
                    .unwrap_or_else(|| namespace.to_string());
                Some(ObjectRef::new(*kind, ns, name))
            })
            .collect())
    }

    async fn delete(&self, object: &ObjectRef) -> std::result::Result<(), ClusterError> {
        tracing::debug!(object = %object, "Deleting object");
        self.api(&object.namespace, &object.kind)
            .delete(&object.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| to_cluster_error(e, ClusterOperation::Delete))
    }
}
