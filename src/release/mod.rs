//! Release channel resolution
//!
//! A channel is a mutable pointer to a release version. Resolution takes two
//! hops against the release service:
//!
//! 1. `distro/channels.json` maps channel names to opaque version tags, with a
//!    nested `dev` map from branch name to tag
//! 2. `distro/<tag>/manifest.json` holds the immutable manifest for that tag
//!
//! Re-resolving a channel may yield a newer version over time; a given tag
//! always yields the same manifest.
//!
//! # Channel forms
//!
//! - `stable`, `beta`, ...: looked up in the flat map
//! - `dev`: the `master` branch of the dev track
//! - `dev/<branch>`: the given branch of the dev track
//! - `dev/a/b`: malformed, falls back to `master` with a warning

pub mod http;

pub use http::{HttpReleaseSource, ReleaseServiceConfig};

use std::collections::BTreeMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{Error, Result, DEFAULT_DEV_BRANCH, DEV_TRACK};

/// A parsed channel identifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    /// A name looked up directly in the flat channel map
    Flat(String),
    /// A branch of the dev track
    Dev {
        /// Branch name within the dev track
        branch: String,
        /// True when the input had more than one separator and was rejected
        /// in favor of the default branch
        fell_back: bool,
    },
}

impl Channel {
    /// Parse a channel identifier
    ///
    /// The dev track is selected when the first `/`-separated segment is
    /// exactly `dev`. Parsing never fails; malformed dev channels fall back to
    /// the default branch.
    pub fn parse(channel: &str) -> Self {
        let parts: Vec<&str> = channel.split('/').collect();
        if parts[0] != DEV_TRACK {
            return Self::Flat(channel.to_string());
        }

        match parts.len() {
            1 => Self::Dev {
                branch: DEFAULT_DEV_BRANCH.to_string(),
                fell_back: false,
            },
            2 => Self::Dev {
                branch: parts[1].to_string(),
                fell_back: false,
            },
            _ => Self::Dev {
                branch: DEFAULT_DEV_BRANCH.to_string(),
                fell_back: true,
            },
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flat(name) => write!(f, "{}", name),
            Self::Dev { branch, .. } => write!(f, "{}/{}", DEV_TRACK, branch),
        }
    }
}

/// Contents of `distro/channels.json`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelIndex {
    /// Channel name to version tag
    pub channels: BTreeMap<String, String>,
    /// Dev track branch name to version tag
    pub dev: BTreeMap<String, String>,
}

impl ChannelIndex {
    /// Build an index from the raw JSON document
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(entries) = value else {
            return Err(Error::channel_lookup("channel index is not a JSON object"));
        };

        let mut index = Self::default();
        for (name, entry) in entries {
            match entry {
                Value::String(tag) => {
                    index.channels.insert(name, tag);
                }
                Value::Object(branches) if name == DEV_TRACK => {
                    for (branch, tag) in branches {
                        match tag {
                            Value::String(tag) => {
                                index.dev.insert(branch, tag);
                            }
                            other => debug!(branch = %branch, entry = %other, "Ignoring non-string dev branch entry"),
                        }
                    }
                }
                other => debug!(channel = %name, entry = %other, "Ignoring unrecognized channel entry"),
            }
        }
        Ok(index)
    }

    /// Look up the tag a channel points at
    pub fn tag_for(&self, channel: &Channel) -> Option<&str> {
        match channel {
            Channel::Flat(name) => self.channels.get(name),
            Channel::Dev { branch, .. } => self.dev.get(branch),
        }
        .map(String::as_str)
    }
}

/// A resolved release: the channel it came from, its version tag and manifest
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    /// Channel as given by the operator
    pub channel: String,
    /// Opaque version tag the channel resolved to
    pub version: String,
    /// Release artifact references for this version
    #[serde(default)]
    pub manifest: Map<String, Value>,
}

/// Remote source of channel indexes and manifests
///
/// Implementations report failures as [`Error::ChannelLookup`] and
/// [`Error::ManifestFetch`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch the raw channel index
    async fn fetch_channels(&self) -> Result<Value>;

    /// Fetch the raw manifest for a version tag
    async fn fetch_manifest(&self, tag: &str) -> Result<Value>;
}

/// Resolves channel names to release descriptors
pub struct ReleaseResolver<S> {
    source: S,
}

impl<S: ReleaseSource> ReleaseResolver<S> {
    /// Create a resolver backed by the given source
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Resolve a channel to a release descriptor
    ///
    /// Fails with [`Error::ChannelLookup`] when the index cannot be fetched,
    /// [`Error::UnknownChannel`] when the channel has no tag, and
    /// [`Error::ManifestFetch`] when the manifest cannot be fetched.
    pub async fn resolve(&self, channel: &str) -> Result<ReleaseDescriptor> {
        let index = ChannelIndex::from_value(self.source.fetch_channels().await?)?;

        let parsed = Channel::parse(channel);
        if let Channel::Dev {
            branch,
            fell_back: true,
        } = &parsed
        {
            warn!(
                channel = %channel,
                branch = %branch,
                "Malformed dev channel, falling back to default branch"
            );
        }

        let tag = index
            .tag_for(&parsed)
            .ok_or_else(|| Error::unknown_channel(channel))?
            .to_string();

        let manifest = match self.source.fetch_manifest(&tag).await? {
            Value::Object(manifest) => manifest,
            _ => return Err(Error::manifest_fetch(&tag, "manifest is not a JSON object")),
        };

        info!(channel = %channel, version = %tag, "Resolved release channel");

        Ok(ReleaseDescriptor {
            channel: channel.to_string(),
            version: tag,
            manifest,
        })
    }
}
