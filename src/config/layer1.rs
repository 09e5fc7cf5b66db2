//! Layer 1: platform services running on top of layer 0

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::credentials::DatabaseCredentials;

/// Persistent disk type for stateful API services
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum DiskType {
    /// Standard persistent disk
    #[default]
    #[serde(rename = "pd-standard")]
    #[value(name = "pd-standard")]
    PdStandard,
    /// SSD persistent disk
    #[serde(rename = "pd-ssd")]
    #[value(name = "pd-ssd")]
    PdSsd,
}

impl std::fmt::Display for DiskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PdStandard => write!(f, "pd-standard"),
            Self::PdSsd => write!(f, "pd-ssd"),
        }
    }
}

/// Persistent disk request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiskSpec {
    /// Disk type
    pub disk_type: DiskType,
    /// Disk size in GB
    pub disk_size: u32,
}

impl Default for DiskSpec {
    fn default() -> Self {
        Self {
            disk_type: DiskType::PdStandard,
            disk_size: 100,
        }
    }
}

/// Operator inputs for layer-1 configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer1Settings {
    /// URL of the identity service
    pub identity_url: String,
    /// API subdomain, relative to the cluster domain
    pub api_subdomain: String,
    /// Address used for HTTP/TLS routing
    pub router_ip: Option<Ipv4Addr>,
    /// API cache disk
    pub api_cache_disk: DiskSpec,
    /// API database disk
    pub api_database_disk: DiskSpec,
}

impl Default for Layer1Settings {
    fn default() -> Self {
        Self {
            identity_url: crate::DEFAULT_IDENTITY_URL.to_string(),
            api_subdomain: crate::DEFAULT_API_SUBDOMAIN.to_string(),
            router_ip: None,
            api_cache_disk: DiskSpec::default(),
            api_database_disk: DiskSpec::default(),
        }
    }
}

/// HTTP/TLS router placement
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Fixed router address, if chosen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<Ipv4Addr>,
}

/// API database with its generated credentials
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Generated credentials
    #[serde(flatten)]
    pub credentials: DatabaseCredentials,
    /// Backing disk
    #[serde(flatten)]
    pub disk: DiskSpec,
}

/// API tier configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Fully qualified API host name
    pub host: String,
    /// API cache disk
    pub cache: DiskSpec,
    /// API database
    pub database: DatabaseConfig,
}

/// The `layer-1` section of the cluster document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Layer1 {
    /// URL of the identity service
    pub identity_url: String,
    /// HTTP/TLS router
    pub router: RouterConfig,
    /// API tier
    pub api: ApiConfig,
    /// Keys written by the provisioning collaborator
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Layer1 {
    /// Derive the layer-1 section from operator settings
    ///
    /// The API host is `<api_subdomain>.<domain>`.
    pub fn derive(settings: &Layer1Settings, domain: &str, credentials: DatabaseCredentials) -> Self {
        Self {
            identity_url: settings.identity_url.clone(),
            router: RouterConfig {
                ip: settings.router_ip,
            },
            api: ApiConfig {
                host: api_host(&settings.api_subdomain, domain),
                cache: settings.api_cache_disk,
                database: DatabaseConfig {
                    credentials,
                    disk: settings.api_database_disk,
                },
            },
            extra: BTreeMap::new(),
        }
    }
}

fn api_host(subdomain: &str, domain: &str) -> String {
    let domain = domain.trim_matches('.');
    let subdomain = subdomain.trim_matches('.');
    if subdomain.is_empty() {
        domain.to_string()
    } else {
        format!("{}.{}", subdomain, domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> DatabaseCredentials {
        DatabaseCredentials {
            username: "abcdEFGH".to_string(),
            password: "p".repeat(32),
        }
    }

    #[test]
    fn api_host_is_subdomain_of_cluster_domain() {
        let layer1 = Layer1::derive(&Layer1Settings::default(), "example.kel.io", creds());
        assert_eq!(layer1.api.host, "api.example.kel.io");
    }

    #[test]
    fn stray_dots_do_not_produce_empty_labels() {
        assert_eq!(api_host("api.", ".example.com."), "api.example.com");
        assert_eq!(api_host("", "example.com"), "example.com");
    }

    #[test]
    fn disks_default_to_100gb_standard() {
        let layer1 = Layer1::derive(&Layer1Settings::default(), "example.com", creds());
        assert_eq!(layer1.api.cache, DiskSpec::default());
        assert_eq!(layer1.api.database.disk.disk_size, 100);
        assert_eq!(layer1.api.database.disk.disk_type, DiskType::PdStandard);
    }

    #[test]
    fn layer1_serializes_with_document_key_names() {
        let settings = Layer1Settings {
            router_ip: Some(Ipv4Addr::new(203, 0, 113, 7)),
            api_database_disk: DiskSpec {
                disk_type: DiskType::PdSsd,
                disk_size: 250,
            },
            ..Default::default()
        };
        let layer1 = Layer1::derive(&settings, "example.com", creds());
        let yaml = serde_yaml::to_string(&layer1).unwrap();

        assert!(yaml.contains("identity-url:"));
        assert!(yaml.contains("ip: 203.0.113.7"));
        assert!(yaml.contains("username: abcdEFGH"));
        assert!(yaml.contains("disk-type: pd-ssd"));
        assert!(yaml.contains("disk-size: 250"));

        let parsed: Layer1 = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, layer1);
    }
}
