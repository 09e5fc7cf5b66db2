//! `kelctl up` - bring layer 1 online.
//!
//! With no `--component`, every component is created in registry order.
//! Named components are still created in registry order. Re-running `up`
//! after a failure re-applies everything selected.

use clap::Args;

use super::GlobalArgs;
use crate::cluster::ClusterBackend;
use crate::component::{Component, ComponentOrchestrator};
use crate::config::DocumentStore;
use crate::Result;

/// Bring layer 1 online
#[derive(Args, Debug, Clone)]
pub struct UpArgs {
    /// Component to create (repeatable; defaults to all)
    #[arg(short = 'c', long = "component")]
    pub components: Vec<String>,
}

/// Run the up command.
pub async fn run(global: &GlobalArgs, args: UpArgs) -> Result<()> {
    execute(&global.store(), &global.orchestrator(), &args.components).await?;
    println!("Done.");
    Ok(())
}

/// Activate the selected components of a configured cluster
pub async fn execute<B: ClusterBackend>(
    store: &DocumentStore,
    orchestrator: &ComponentOrchestrator<B>,
    components: &[String],
) -> Result<Vec<Component>> {
    store.load_required()?;
    orchestrator.activate(components).await
}
