//! External cluster-management boundary
//!
//! Everything that touches real infrastructure (cloud resources, Kubernetes
//! objects, machine startup scripts) lives behind [`ClusterBackend`]. This
//! crate only decides what to ask for and in which order.
//!
//! - [`external`] - backend that drives the `kel-cluster` program

pub mod external;

pub use external::{CommandOutput, CommandRunner, ExternalCluster, RealCommandRunner};

use std::collections::BTreeMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::component::Component;
use crate::config::ConfigDocument;
use crate::{Error, Result};

/// API objects of one component, keyed by kind
pub type ApiObjects = BTreeMap<String, Vec<Value>>;

/// A layer-0 machine group that owns provider resources
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderComponent {
    /// The etcd quorum
    Etcd,
    /// Kubernetes masters
    Master,
    /// A worker node pool, by name
    NodePool(String),
}

impl ProviderComponent {
    /// Parse a provider component name
    ///
    /// Accepts `etcd`, `master` and the name of any node pool in the
    /// document's layer-0 resources.
    pub fn parse(name: &str, document: &ConfigDocument) -> Result<Self> {
        match name {
            "etcd" => Ok(Self::Etcd),
            "master" => Ok(Self::Master),
            pool if document
                .resources()
                .is_some_and(|r| r.has_node_pool(pool)) =>
            {
                Ok(Self::NodePool(pool.to_string()))
            }
            other => Err(Error::unknown_component(other)),
        }
    }

    /// Name used by the cluster collaborator
    pub fn name(&self) -> &str {
        match self {
            Self::Etcd => "etcd",
            Self::Master => "master",
            Self::NodePool(name) => name,
        }
    }
}

impl std::fmt::Display for ProviderComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque provider resource handle for one component
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderResource {
    /// Name of the component the resource belongs to
    pub component: String,
    /// Provider-specific description, passed back to the collaborator as-is
    pub spec: Value,
}

/// Inputs to startup-script generation beyond the resource itself
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptContext {
    /// Instance ordinal within the group, when the script is per-instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<u32>,
    /// Resolved etcd resource, for components that talk to etcd
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd: Option<ProviderResource>,
}

/// Operations the external cluster-management collaborator provides
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Provision layer-0 infrastructure
    ///
    /// Returns the document to persist when the collaborator updated it.
    async fn create(&self) -> Result<Option<ConfigDocument>>;

    /// Tear down layer-0 infrastructure
    async fn destroy(&self) -> Result<()>;

    /// Create (or re-apply) a layer-1 component
    async fn create_component(&self, component: Component) -> Result<()>;

    /// API objects a component would apply for a manifest
    async fn api_objects(
        &self,
        component: Component,
        group: &str,
        manifest: &str,
    ) -> Result<ApiObjects>;

    /// Look up the provider resource for a machine group
    async fn provider_resource(&self, component: &ProviderComponent) -> Result<ProviderResource>;

    /// Render the startup script for a resource
    async fn startup_script(
        &self,
        resource: &ProviderResource,
        context: &ScriptContext,
    ) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceTopology;

    fn document_with_resources() -> ConfigDocument {
        ConfigDocument::default()
            .set_identity("prod")
            .set_resources(ResourceTopology::standard(None))
    }

    #[test]
    fn fixed_provider_components_parse() {
        let doc = ConfigDocument::default();
        assert_eq!(
            ProviderComponent::parse("etcd", &doc).unwrap(),
            ProviderComponent::Etcd
        );
        assert_eq!(
            ProviderComponent::parse("master", &doc).unwrap(),
            ProviderComponent::Master
        );
    }

    #[test]
    fn node_pool_from_document_parses() {
        let parsed = ProviderComponent::parse("node-1x", &document_with_resources()).unwrap();
        assert_eq!(parsed, ProviderComponent::NodePool("node-1x".to_string()));
        assert_eq!(parsed.name(), "node-1x");
    }

    #[test]
    fn unknown_pool_is_unknown_component() {
        let err = ProviderComponent::parse("node-9x", &document_with_resources()).unwrap_err();
        assert!(matches!(err, Error::UnknownComponent { ref name } if name == "node-9x"));
    }

    #[test]
    fn pool_without_layer0_resources_is_unknown_component() {
        let err = ProviderComponent::parse("node-1x", &ConfigDocument::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownComponent { .. }));
    }

    #[test]
    fn empty_script_context_serializes_to_empty_object() {
        let json = serde_json::to_string(&ScriptContext::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
