//! Error types for kelctl

use thiserror::Error;

/// Main error type for kelctl operations
///
/// Every variant renders as a single line; the binary prints it as
/// `Error: <message>` and exits non-zero.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A stage was already applied to the cluster document
    #[error("already configured. {hint}")]
    AlreadyConfigured {
        /// How the operator can recover
        hint: String,
    },

    /// The cluster document (or the layer a stage builds on) does not exist
    #[error("not configured. {hint}")]
    NotConfigured {
        /// How the operator can recover
        hint: String,
    },

    /// A required parameter was not supplied
    #[error("--{name} was not given.")]
    MissingParameter {
        /// Parameter name as spelled on the command line
        name: String,
    },

    /// The channel does not resolve to a tag in the channel index
    #[error("unknown release channel \"{channel}\"")]
    UnknownChannel {
        /// Channel as given by the caller
        channel: String,
    },

    /// The channel index could not be fetched or parsed
    #[error("channel lookup failed: {0}")]
    ChannelLookup(String),

    /// The release manifest for a tag could not be fetched or parsed
    #[error("manifest fetch for {tag} failed: {message}")]
    ManifestFetch {
        /// Version tag whose manifest was requested
        tag: String,
        /// Underlying failure
        message: String,
    },

    /// A component name is not registered
    #[error("\"{name}\" is not an available component.")]
    UnknownComponent {
        /// Name as given by the caller
        name: String,
    },

    /// A component produced no API objects of the requested kind
    #[error("component \"{component}\" has no objects of kind \"{kind}\"")]
    UnknownObjectKind {
        /// Component that was queried
        component: String,
        /// Requested kind
        kind: String,
    },

    /// Component declarations do not form a valid dependency order
    #[error("invalid component registry: {0}")]
    InvalidRegistry(String),

    /// A supplied or derived value is malformed
    #[error("validation error: {0}")]
    Validation(String),

    /// The external cluster collaborator failed
    #[error("cluster error: {0}")]
    Cluster(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an already-configured error with a recovery hint
    pub fn already_configured(hint: impl Into<String>) -> Self {
        Self::AlreadyConfigured { hint: hint.into() }
    }

    /// Create a not-configured error with a recovery hint
    pub fn not_configured(hint: impl Into<String>) -> Self {
        Self::NotConfigured { hint: hint.into() }
    }

    /// Create a missing-parameter error
    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    /// Create an unknown-channel error
    pub fn unknown_channel(channel: impl Into<String>) -> Self {
        Self::UnknownChannel {
            channel: channel.into(),
        }
    }

    /// Create a channel lookup error
    pub fn channel_lookup(msg: impl Into<String>) -> Self {
        Self::ChannelLookup(msg.into())
    }

    /// Create a manifest fetch error
    pub fn manifest_fetch(tag: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ManifestFetch {
            tag: tag.into(),
            message: msg.into(),
        }
    }

    /// Create an unknown-component error
    pub fn unknown_component(name: impl Into<String>) -> Self {
        Self::UnknownComponent { name: name.into() }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a cluster collaborator error with the given message
    pub fn cluster(msg: impl Into<String>) -> Self {
        Self::Cluster(msg.into())
    }
}
