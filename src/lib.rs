//! kelctl - configuration and bring-up front end for Kel clusters
//!
//! Kel clusters come in two layers. Layer 0 is the infrastructure substrate
//! (cloud provider, networks, etcd, masters and node pools); layer 1 is the
//! platform running on top of it (DNS, system services, router and the API
//! tier).
//!
//! kelctl builds the cluster document (`cluster.yml`) one stage at a time,
//! pins it to a release resolved from a channel, and sequences component
//! bring-up. Provisioning itself is delegated to an external cluster
//! program.
//!
//! # Modules
//!
//! - [`release`] - channel to release resolution
//! - [`gate`] - stage preconditions
//! - [`config`] - the cluster document and its persistence
//! - [`credentials`] - generated values
//! - [`component`] - component registry and orchestrator
//! - [`cluster`] - external cluster-management boundary
//! - [`commands`] - CLI commands
//! - [`retry`] - bounded retry for network calls
//! - [`error`] - error types

#![deny(missing_docs)]

pub mod cluster;
pub mod commands;
pub mod component;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod release;
pub mod retry;

pub use error::Error;

use clap::{Parser, Subcommand};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================
// Defaults shared by the CLI, the document model and test fixtures.

/// Default path of the cluster document
pub const DEFAULT_CONFIG_PATH: &str = "cluster.yml";

/// Base URL of the release service
///
/// Channels live at `<base>/distro/channels.json`, manifests at
/// `<base>/distro/<tag>/manifest.json`.
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://storage.googleapis.com/release.kelproject.com";

/// Default entity recorded as managing the cluster
pub const DEFAULT_MANAGED_BY: &str = "kelproject.com";

/// Default release channel
pub const DEFAULT_CHANNEL: &str = "dev";

/// Channel prefix selecting the dev track
pub const DEV_TRACK: &str = "dev";

/// Dev-track branch used when none (or a malformed one) is given
pub const DEFAULT_DEV_BRANCH: &str = "master";

/// Default identity service URL
pub const DEFAULT_IDENTITY_URL: &str = "https://identity.kelproject.com";

/// Default API subdomain
pub const DEFAULT_API_SUBDOMAIN: &str = "api";

/// Default cluster-management program
pub const DEFAULT_CLUSTER_BIN: &str = "kel-cluster";

/// Default pod network
pub const DEFAULT_POD_NETWORK: &str = "192.168.0.0/16";

/// Default service network
pub const DEFAULT_SERVICE_NETWORK: &str = "10.96.0.0/12";

/// kelctl - configure, provision and bring up Kel clusters
#[derive(Parser, Debug)]
#[command(name = "kelctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: commands::GlobalArgs,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// kelctl commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure a cluster layer
    Configure(commands::configure::ConfigureArgs),
    /// Re-resolve the release channel
    UpdateRelease(commands::update_release::UpdateReleaseArgs),
    /// Provision layer 0
    Provision,
    /// Destroy layer 0
    Destroy,
    /// Bring layer 1 online
    Up(commands::up::UpArgs),
    /// Write layer-1 API objects to stdout
    ShowObj(commands::show_obj::ShowObjArgs),
    /// Write a machine group's startup script to stdout
    StartupScript(commands::startup_script::StartupScriptArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let global = self.global;
        match self.command {
            Commands::Configure(args) => commands::configure::run(&global, args).await,
            Commands::UpdateRelease(args) => commands::update_release::run(&global, args).await,
            Commands::Provision => commands::provision::run_provision(&global).await,
            Commands::Destroy => commands::provision::run_destroy(&global).await,
            Commands::Up(args) => commands::up::run(&global, args).await,
            Commands::ShowObj(args) => commands::show_obj::run(&global, args).await,
            Commands::StartupScript(args) => commands::startup_script::run(&global, args).await,
        }
    }
}
