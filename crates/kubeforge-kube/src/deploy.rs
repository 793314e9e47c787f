//! Applying machine-controller manifests
//!
//! Manifests are multi-document YAML applied with Server-Side Apply, so a
//! repeated deploy converges instead of failing on existing objects.

use async_trait::async_trait;
use kube::{
    Client,
    api::{Api, DynamicObject, Patch, PatchParams},
    core::{GroupVersionKind, TypeMeta},
    discovery::{Discovery, Scope},
};

use crate::error::{MachineError, Result};
use crate::readiness::Component;

/// Field manager name for Server-Side Apply
pub const FIELD_MANAGER: &str = "kubeforge";

/// Installs machine-controller components
#[async_trait]
pub trait ComponentDeployer: Send + Sync {
    /// Install the controller
    async fn deploy(&self) -> Result<()>;

    /// Install the admission webhook and its configuration
    async fn deploy_webhook(&self) -> Result<()>;
}

/// [`ComponentDeployer`] that server-side applies YAML manifests
pub struct ManifestDeployer {
    client: Client,
    namespace: String,
    controller_manifest: Option<String>,
    webhook_manifest: Option<String>,
}

impl ManifestDeployer {
    /// Create a deployer. Namespaced objects without a namespace land in `namespace`.
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            controller_manifest: None,
            webhook_manifest: None,
        }
    }

    pub fn with_controller_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.controller_manifest = Some(manifest.into());
        self
    }

    pub fn with_webhook_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.webhook_manifest = Some(manifest.into());
        self
    }

    /// Apply every document of a manifest, returning how many were applied
    pub async fn apply_manifest(&self, manifest: &str) -> Result<usize> {
        let objects = parse_documents(manifest)?;
        // Per manifest, so CRDs applied by an earlier manifest resolve
        let discovery = Discovery::new(self.client.clone()).run().await?;

        for obj in &objects {
            self.apply_object(&discovery, obj).await?;
        }

        Ok(objects.len())
    }

    async fn apply_object(&self, discovery: &Discovery, obj: &DynamicObject) -> Result<()> {
        let Some(type_meta) = obj.types.as_ref() else {
            return Err(MachineError::InvalidManifest(
                "resource missing apiVersion or kind".to_string(),
            ));
        };
        let gvk = gvk_from_type_meta(type_meta);

        let (api_resource, capabilities) = discovery.resolve_gvk(&gvk).ok_or_else(|| {
            MachineError::InvalidManifest(format!(
                "unknown resource type: {}/{}",
                type_meta.api_version, type_meta.kind
            ))
        })?;

        let name = obj.metadata.name.as_deref().unwrap_or_default();
        let api: Api<DynamicObject> = if capabilities.scope == Scope::Namespaced {
            let ns = obj.metadata.namespace.as_deref().unwrap_or(&self.namespace);
            Api::namespaced_with(self.client.clone(), ns, &api_resource)
        } else {
            Api::all_with(self.client.clone(), &api_resource)
        };

        tracing::debug!(kind = %type_meta.kind, name, "Applying");

        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(name, &params, &Patch::Apply(obj)).await?;
        Ok(())
    }

    async fn deploy_component(&self, component: Component, manifest: Option<&str>) -> Result<()> {
        let manifest = manifest.ok_or_else(|| MachineError::Deploy {
            component: component.to_string(),
            message: "no manifest configured".to_string(),
        })?;

        let applied = self
            .apply_manifest(manifest)
            .await
            .map_err(|e| MachineError::Deploy {
                component: component.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(component = %component, objects = applied, "Applied manifest");
        Ok(())
    }
}

#[async_trait]
impl ComponentDeployer for ManifestDeployer {
    async fn deploy(&self) -> Result<()> {
        self.deploy_component(Component::Controller, self.controller_manifest.as_deref())
            .await
    }

    async fn deploy_webhook(&self) -> Result<()> {
        self.deploy_component(Component::Webhook, self.webhook_manifest.as_deref())
            .await
    }
}

/// Split a multi-document manifest on `---` separator lines
pub fn split_documents(manifest: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in manifest.lines() {
        if line.trim_end() == "---" || line.starts_with("--- ") {
            documents.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    documents.push(current);

    documents
        .into_iter()
        .filter(|doc| {
            doc.lines()
                .any(|l| !l.trim().is_empty() && !l.trim().starts_with('#'))
        })
        .collect()
}

/// Parse every non-empty document into an object with a kind and a name
pub fn parse_documents(manifest: &str) -> Result<Vec<DynamicObject>> {
    split_documents(manifest)
        .iter()
        .enumerate()
        .map(|(index, doc)| {
            let obj: DynamicObject = serde_yaml::from_str(doc).map_err(|e| {
                MachineError::Serialization(format!("document {}: {}", index, e))
            })?;
            if obj.types.is_none() {
                return Err(MachineError::InvalidManifest(format!(
                    "document {} is missing apiVersion or kind",
                    index
                )));
            }
            if obj.metadata.name.is_none() {
                return Err(MachineError::InvalidManifest(format!(
                    "document {} is missing metadata.name",
                    index
                )));
            }
            Ok(obj)
        })
        .collect()
}

/// `apps/v1` → (apps, v1); `v1` → ("", v1)
fn gvk_from_type_meta(tm: &TypeMeta) -> GroupVersionKind {
    let (group, version) = match tm.api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), tm.api_version.clone()),
    };

    GroupVersionKind {
        group,
        version,
        kind: tm.kind.clone(),
    }
}
