//! CLI commands
//!
//! Each command has a thin `run` that wires production collaborators from
//! [`GlobalArgs`] and an `execute` that takes them as parameters, so the
//! command logic runs against doubles in tests.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::cluster::ExternalCluster;
use crate::component::{ComponentOrchestrator, ComponentRegistry};
use crate::config::DocumentStore;
use crate::release::{HttpReleaseSource, ReleaseResolver, ReleaseServiceConfig};
use crate::{Result, DEFAULT_CLUSTER_BIN, DEFAULT_CONFIG_PATH, DEFAULT_RELEASE_BASE_URL};

pub mod configure;
pub mod provision;
pub mod show_obj;
pub mod startup_script;
pub mod up;
pub mod update_release;

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path of the cluster document
    #[arg(long = "config", env = "KEL_CONFIG", default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Base URL of the release service
    #[arg(long, env = "KEL_RELEASE_URL", default_value = DEFAULT_RELEASE_BASE_URL, global = true)]
    pub release_url: String,

    /// Timeout for each release service request, in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub release_timeout_secs: u64,

    /// Cluster-management program to delegate provisioning to
    #[arg(long, env = "KEL_CLUSTER_BIN", default_value = DEFAULT_CLUSTER_BIN, global = true)]
    pub cluster_bin: String,
}

impl GlobalArgs {
    /// Store for the cluster document
    pub fn store(&self) -> DocumentStore {
        DocumentStore::new(&self.config)
    }

    /// Resolver backed by the release service
    pub fn release_resolver(&self) -> Result<ReleaseResolver<HttpReleaseSource>> {
        let source = HttpReleaseSource::new(ReleaseServiceConfig {
            base_url: self.release_url.clone(),
            timeout: Duration::from_secs(self.release_timeout_secs),
            ..Default::default()
        })?;
        Ok(ReleaseResolver::new(source))
    }

    /// Backend driving the cluster-management program
    pub fn cluster(&self) -> ExternalCluster {
        ExternalCluster::new(&self.cluster_bin, &self.config)
    }

    /// Orchestrator over the standard registry and the external backend
    pub fn orchestrator(&self) -> ComponentOrchestrator<ExternalCluster> {
        ComponentOrchestrator::new(ComponentRegistry::standard(), self.cluster())
    }
}
