//! `kelctl startup-script` - write a machine group's startup script to stdout.
//!
//! Accepts `etcd`, `master` or a node-pool name from the document.

use clap::Args;

use super::GlobalArgs;
use crate::cluster::{ClusterBackend, ProviderComponent};
use crate::component::ComponentOrchestrator;
use crate::config::DocumentStore;
use crate::Result;

/// Write a machine group's startup script to stdout
#[derive(Args, Debug, Clone)]
pub struct StartupScriptArgs {
    /// Machine group (`etcd`, `master` or a node pool)
    pub component: String,
}

/// Run the startup-script command.
pub async fn run(global: &GlobalArgs, args: StartupScriptArgs) -> Result<()> {
    let script = execute(&global.store(), &global.orchestrator(), &args.component).await?;
    print!("{}", script);
    Ok(())
}

/// Render the startup script for a machine group
pub async fn execute<B: ClusterBackend>(
    store: &DocumentStore,
    orchestrator: &ComponentOrchestrator<B>,
    component: &str,
) -> Result<String> {
    let document = store.load_required()?;
    let component = ProviderComponent::parse(component, &document)?;
    orchestrator.startup_script(&component).await
}
