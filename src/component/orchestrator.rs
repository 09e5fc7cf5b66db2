//! Component bring-up and provider resource resolution
//!
//! The orchestrator is strictly sequential. Activation stops at the first
//! failing component and leaves earlier components in place; running `up`
//! again re-applies them.

use serde_json::Value;
use tracing::{error, info};

use super::{Component, ComponentRegistry};
use crate::cluster::{ClusterBackend, ProviderComponent, ProviderResource, ScriptContext};
use crate::{Error, Result};

/// Instance ordinal used when rendering the etcd startup script
const ETCD_SCRIPT_INSTANCE: u32 = 0;

/// A provider resource together with the etcd resource resolved alongside it
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedResource {
    /// Resource of the requested component
    pub resource: ProviderResource,
    /// etcd resource, resolved first when the requested component is master
    pub etcd: Option<ProviderResource>,
}

/// Drives component operations against a cluster backend
pub struct ComponentOrchestrator<B> {
    registry: ComponentRegistry,
    backend: B,
}

impl<B: ClusterBackend> ComponentOrchestrator<B> {
    /// Create an orchestrator over a registry and backend
    pub fn new(registry: ComponentRegistry, backend: B) -> Self {
        Self { registry, backend }
    }

    /// The registry components are ordered by
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// The backend operations are sent to
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Resolve a selection to components in registry order
    ///
    /// An empty selection means every component. Every name is checked
    /// before anything is returned, duplicates collapse, and the caller's
    /// order is ignored.
    pub fn select<S: AsRef<str>>(&self, selection: &[S]) -> Result<Vec<Component>> {
        let mut requested = Vec::with_capacity(selection.len());
        for name in selection {
            let name = name.as_ref();
            let component: Component = name.parse()?;
            if !self.registry.contains(component) {
                return Err(Error::unknown_component(name));
            }
            requested.push(component);
        }

        Ok(self
            .registry
            .components()
            .filter(|c| requested.is_empty() || requested.contains(c))
            .collect())
    }

    /// Activate the selected components one at a time
    ///
    /// Returns the activated components. On failure, returns the first error;
    /// components activated before it stay active.
    pub async fn activate<S: AsRef<str>>(&self, selection: &[S]) -> Result<Vec<Component>> {
        let components = self.select(selection)?;
        let mut activated = Vec::with_capacity(components.len());

        for component in components {
            info!(component = %component, "Creating component");
            if let Err(e) = self.backend.create_component(component).await {
                error!(
                    component = %component,
                    activated = activated.len(),
                    error = %e,
                    "Component activation failed"
                );
                return Err(e);
            }
            activated.push(component);
        }

        info!(count = activated.len(), "Components up");
        Ok(activated)
    }

    /// Objects of one kind that a component would apply
    pub async fn api_objects(
        &self,
        name: &str,
        group: &str,
        manifest: &str,
        kind: &str,
    ) -> Result<Vec<Value>> {
        let component = self
            .select(&[name])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::unknown_component(name))?;
        let mut objects = self.backend.api_objects(component, group, manifest).await?;
        objects
            .remove(kind)
            .ok_or_else(|| Error::UnknownObjectKind {
                component: component.to_string(),
                kind: kind.to_string(),
            })
    }

    /// Resolve the provider resource of a machine group
    ///
    /// Master resolution first resolves etcd, and both resources are returned.
    pub async fn resolve_provider_resource(
        &self,
        component: &ProviderComponent,
    ) -> Result<ResolvedResource> {
        let etcd = match component {
            ProviderComponent::Master => Some(
                self.backend
                    .provider_resource(&ProviderComponent::Etcd)
                    .await?,
            ),
            _ => None,
        };
        let resource = self.backend.provider_resource(component).await?;
        Ok(ResolvedResource { resource, etcd })
    }

    /// Render the startup script for a machine group
    ///
    /// etcd renders for instance 0, master carries the etcd resource, and
    /// node pools get neither.
    pub async fn startup_script(&self, component: &ProviderComponent) -> Result<String> {
        let resolved = self.resolve_provider_resource(component).await?;
        let context = match component {
            ProviderComponent::Etcd => ScriptContext {
                instance: Some(ETCD_SCRIPT_INSTANCE),
                etcd: None,
            },
            ProviderComponent::Master => ScriptContext {
                instance: None,
                etcd: resolved.etcd,
            },
            ProviderComponent::NodePool(_) => ScriptContext::default(),
        };
        self.backend
            .startup_script(&resolved.resource, &context)
            .await
    }
}
