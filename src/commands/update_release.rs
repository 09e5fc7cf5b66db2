//! `kelctl update-release` - re-resolve the release channel.
//!
//! Re-resolves the document's channel (or the one given) and rewrites the
//! document only when the channel now points at a different version.

use clap::Args;
use tracing::info;

use super::GlobalArgs;
use crate::config::{DocumentStore, ReleaseUpdate};
use crate::release::{ReleaseResolver, ReleaseSource};
use crate::Result;

/// Re-resolve the release channel
#[derive(Args, Debug, Clone)]
pub struct UpdateReleaseArgs {
    /// Channel to switch to (defaults to the document's channel)
    #[arg(long)]
    pub channel: Option<String>,
}

/// What an update did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The channel still points at the attached version
    Current {
        /// Channel that was checked
        channel: String,
    },
    /// The document now carries a different version
    Updated {
        /// Channel the version came from
        channel: String,
        /// Newly attached version
        version: String,
    },
}

/// Run the update-release command.
pub async fn run(global: &GlobalArgs, args: UpdateReleaseArgs) -> Result<()> {
    let resolver = global.release_resolver()?;
    match execute(&global.store(), &resolver, args.channel.as_deref()).await? {
        UpdateOutcome::Current { channel } => {
            println!("No updates available for {} channel", channel);
        }
        UpdateOutcome::Updated { channel, version } => {
            println!("Updated config to {} in {} channel", version, channel);
        }
    }
    Ok(())
}

/// Re-resolve and persist the release if it changed
pub async fn execute<S: ReleaseSource>(
    store: &DocumentStore,
    resolver: &ReleaseResolver<S>,
    channel: Option<&str>,
) -> Result<UpdateOutcome> {
    let document = store.load_required()?;

    match document.update_release(resolver, channel).await? {
        ReleaseUpdate::Unchanged(document) => {
            let channel = match channel {
                Some(requested) => requested.to_string(),
                None => document.release.map(|r| r.channel).unwrap_or_default(),
            };
            info!(channel = %channel, "Release is current");
            Ok(UpdateOutcome::Current { channel })
        }
        ReleaseUpdate::Updated { document, .. } => {
            store.save(&document)?;
            let (channel, version) = document
                .release
                .map(|r| (r.channel, r.version))
                .unwrap_or_default();
            Ok(UpdateOutcome::Updated { channel, version })
        }
    }
}
