//! The cluster document
//!
//! A cluster is described by one document built up in stages:
//!
//! - layer 0: identity, domain, release, provider, networks, topology
//! - layer 1: platform service settings, derived from layer-0 facts
//!
//! Every update consumes the document and returns the updated value. Callers
//! that need the previous state keep a clone; nothing is shared mutably between
//! stages.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::layer0::{Layer0, Layer0Network, Provider, ResourceTopology};
use super::layer1::{Layer1, Layer1Settings};
use crate::credentials::DatabaseCredentials;
use crate::release::{ReleaseDescriptor, ReleaseResolver, ReleaseSource};
use crate::{Error, Result};

/// Persisted cluster state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigDocument {
    /// Cluster name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// DNS domain the cluster serves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Entity managing the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<String>,
    /// Attached release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseDescriptor>,
    /// Infrastructure substrate
    #[serde(default, rename = "layer-0", skip_serializing_if = "Option::is_none")]
    pub layer0: Option<Layer0>,
    /// Platform services
    #[serde(default, rename = "layer-1", skip_serializing_if = "Option::is_none")]
    pub layer1: Option<Layer1>,
    /// Keys this tool does not model, kept as-is across rewrites
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Outcome of re-resolving the release channel
#[derive(Debug)]
pub enum ReleaseUpdate {
    /// The channel still points at the attached version
    Unchanged(ConfigDocument),
    /// A different version was attached
    Updated {
        /// Document with the new release attached
        document: ConfigDocument,
        /// Version that was replaced
        previous_version: String,
    },
}

impl ConfigDocument {
    /// Set the cluster name
    pub fn set_identity(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the cluster domain and managing entity
    pub fn set_domain(mut self, domain: Option<String>, managed_by: impl Into<String>) -> Self {
        self.domain = domain;
        self.managed_by = Some(managed_by.into());
        self
    }

    /// Resolve a channel and attach the resulting release
    ///
    /// Fails with the resolver's errors; the document is consumed either way,
    /// so callers keep a clone if they need it after a failure.
    pub async fn attach_release<S: ReleaseSource>(
        mut self,
        resolver: &ReleaseResolver<S>,
        channel: &str,
    ) -> Result<Self> {
        self.release = Some(resolver.resolve(channel).await?);
        Ok(self)
    }

    /// Re-resolve the release channel
    ///
    /// Uses `channel` when given, otherwise the channel of the attached
    /// release. Reports [`ReleaseUpdate::Unchanged`] when the channel still
    /// points at the attached version.
    pub async fn update_release<S: ReleaseSource>(
        mut self,
        resolver: &ReleaseResolver<S>,
        channel: Option<&str>,
    ) -> Result<ReleaseUpdate> {
        let current = self.release.as_ref();
        let channel = match (channel, current) {
            (Some(channel), _) => channel.to_string(),
            (None, Some(release)) => release.channel.clone(),
            (None, None) => return Err(Error::missing_parameter("channel")),
        };
        let previous_version = current.map(|r| r.version.clone());

        let release = resolver.resolve(&channel).await?;
        if previous_version.as_deref() == Some(release.version.as_str()) {
            return Ok(ReleaseUpdate::Unchanged(self));
        }

        info!(
            channel = %release.channel,
            from = previous_version.as_deref().unwrap_or("none"),
            to = %release.version,
            "Release updated"
        );
        self.release = Some(release);
        Ok(ReleaseUpdate::Updated {
            document: self,
            previous_version: previous_version.unwrap_or_default(),
        })
    }

    /// Set the cloud provider, creating the layer-0 section if needed
    pub fn set_provider(mut self, provider: Provider) -> Self {
        self.layer0.get_or_insert_with(Layer0::default).provider = Some(provider);
        self
    }

    /// Set the Kubernetes network layout, creating the layer-0 section if needed
    pub fn set_layer0_network(mut self, network: Layer0Network) -> Self {
        self.layer0.get_or_insert_with(Layer0::default).network = Some(network);
        self
    }

    /// Set the machine topology, creating the layer-0 section if needed
    pub fn set_resources(mut self, resources: ResourceTopology) -> Self {
        self.layer0.get_or_insert_with(Layer0::default).resources = Some(resources);
        self
    }

    /// Add the layer-1 section
    ///
    /// Requires layer 0 and a cluster domain (the API host is derived from
    /// it). Layer 1 is applied at most once; database credentials are drawn
    /// from `rng`.
    pub fn set_layer1<R: Rng + ?Sized>(
        mut self,
        settings: &Layer1Settings,
        rng: &mut R,
    ) -> Result<Self> {
        if self.layer0.is_none() {
            return Err(Error::not_configured(
                "Layer 0 must be configured before layer 1.",
            ));
        }
        if self.layer1.is_some() {
            return Err(Error::already_configured(
                "Remove layer-1 configuration to re-configure.",
            ));
        }
        let domain = self
            .domain
            .as_deref()
            .ok_or_else(|| Error::missing_parameter("domain"))?;

        let layer1 = Layer1::derive(settings, domain, DatabaseCredentials::generate(rng));
        self.layer1 = Some(layer1);
        Ok(self)
    }

    /// Cluster name, or an empty string if unset
    pub fn cluster_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Machine topology, if layer 0 has one
    pub fn resources(&self) -> Option<&ResourceTopology> {
        self.layer0.as_ref().and_then(|l| l.resources.as_ref())
    }
}
