//! Layer 0: infrastructure substrate facts
//!
//! Layer 0 records where the cluster runs (provider), how its Kubernetes
//! networks are laid out, and the machine topology to provision.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Offset of the DNS service address within the service network
const DNS_SERVICE_HOST_OFFSET: u32 = 10;

/// Cloud provider a cluster runs on
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
#[non_exhaustive]
pub enum Provider {
    /// Google Compute Engine
    Gce(GceProvider),
}

impl Provider {
    /// Short provider name as used on the command line
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gce(_) => "gce",
        }
    }
}

/// GCE project placement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GceProvider {
    /// GCE project ID
    pub project_id: String,
    /// GCE region (e.g. us-central1)
    pub region: String,
    /// GCE zone (e.g. us-central1-a)
    pub zone: String,
}

/// Kubernetes network layout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Layer0Network {
    /// Pod network CIDR
    pub pod_network: Ipv4Net,
    /// Service network CIDR
    pub service_network: Ipv4Net,
    /// Address of the kube-dns service, inside the service network
    pub dns_service_ip: Ipv4Addr,
}

impl Layer0Network {
    /// Build the network layout, deriving the DNS service IP if not given
    ///
    /// The default DNS address is the tenth host of the service network
    /// (`10.96.0.10` for `10.96.0.0/12`).
    pub fn new(
        pod_network: Ipv4Net,
        service_network: Ipv4Net,
        dns_service_ip: Option<Ipv4Addr>,
    ) -> Result<Self> {
        let service_network = service_network.trunc();
        let pod_network = pod_network.trunc();

        if pod_network.contains(&service_network) || service_network.contains(&pod_network) {
            return Err(Error::validation(format!(
                "pod network {} overlaps service network {}",
                pod_network, service_network
            )));
        }

        let dns_service_ip = match dns_service_ip {
            Some(ip) => ip,
            None => default_dns_service_ip(&service_network)?,
        };
        if !service_network.contains(&dns_service_ip) {
            return Err(Error::validation(format!(
                "DNS service IP {} is outside service network {}",
                dns_service_ip, service_network
            )));
        }

        Ok(Self {
            pod_network,
            service_network,
            dns_service_ip,
        })
    }
}

fn default_dns_service_ip(service_network: &Ipv4Net) -> Result<Ipv4Addr> {
    let base = u32::from(service_network.network());
    let candidate = Ipv4Addr::from(base.saturating_add(DNS_SERVICE_HOST_OFFSET));
    if service_network.contains(&candidate) && candidate != service_network.broadcast() {
        Ok(candidate)
    } else {
        Err(Error::validation(format!(
            "service network {} is too small to hold a DNS service address",
            service_network
        )))
    }
}

/// Size and type of a group of identical machines
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MachineGroup {
    /// Number of machines
    pub count: u32,
    /// Machine type
    #[serde(rename = "type")]
    pub machine_type: String,
    /// Boot disk type
    pub boot_disk_type: String,
    /// Boot disk size in GB
    pub boot_disk_size: u32,
}

impl MachineGroup {
    fn standard(count: u32) -> Self {
        Self {
            count,
            machine_type: "n1-standard-2".to_string(),
            boot_disk_type: "pd-standard".to_string(),
            boot_disk_size: 200,
        }
    }
}

/// Attached data disk
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDisk {
    /// Disk type
    #[serde(rename = "type")]
    pub disk_type: String,
    /// Disk size in GB
    pub size: u32,
}

/// Network the machines are placed on
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineNetwork {
    /// Address range of the machine network
    #[serde(rename = "ipv4-range")]
    pub ipv4_range: Ipv4Net,
}

/// etcd quorum machines
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtcdResources {
    /// Quorum size
    pub count: u32,
    /// Per-member machine shape
    pub machine: EtcdMachine,
}

/// Machine shape of one etcd member
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EtcdMachine {
    /// Machine type
    #[serde(rename = "type")]
    pub machine_type: String,
    /// Boot disk type
    pub boot_disk_type: String,
    /// Boot disk size in GB
    pub boot_disk_size: u32,
    /// Disk holding etcd data
    pub data_disk: DataDisk,
}

/// Kubernetes master machines
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MasterResources {
    /// Fixed address for the master, if the operator chose one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<Ipv4Addr>,
    /// Master machines
    pub machine_group: MachineGroup,
}

/// A named pool of worker nodes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodePool {
    /// Pool name
    pub name: String,
    /// Kubelet max-pods setting
    pub max_pods: u32,
    /// Pool machines
    pub machine_group: MachineGroup,
}

/// Machine topology provisioned for layer 0
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTopology {
    /// Machine network
    pub network: MachineNetwork,
    /// etcd quorum
    pub etcd: EtcdResources,
    /// Kubernetes masters
    pub master: MasterResources,
    /// Worker node pools
    pub nodes: Vec<NodePool>,
}

impl ResourceTopology {
    /// The standard topology: a 3-member etcd quorum, 3 masters and one
    /// 3-node pool on `10.240.0.0/16`
    ///
    /// Independent of everything else in the document except the optional
    /// fixed master address.
    pub fn standard(master_ip: Option<Ipv4Addr>) -> Self {
        Self {
            network: MachineNetwork {
                ipv4_range: Ipv4Net::new_assert(Ipv4Addr::new(10, 240, 0, 0), 16),
            },
            etcd: EtcdResources {
                count: 3,
                machine: EtcdMachine {
                    machine_type: "n1-standard-2".to_string(),
                    boot_disk_type: "pd-standard".to_string(),
                    boot_disk_size: 200,
                    data_disk: DataDisk {
                        disk_type: "pd-ssd".to_string(),
                        size: 50,
                    },
                },
            },
            master: MasterResources {
                ip: master_ip,
                machine_group: MachineGroup::standard(3),
            },
            nodes: vec![NodePool {
                name: "node-1x".to_string(),
                max_pods: 30,
                machine_group: MachineGroup::standard(3),
            }],
        }
    }

    /// Whether a node pool with this name exists
    pub fn has_node_pool(&self, name: &str) -> bool {
        self.nodes.iter().any(|pool| pool.name == name)
    }
}

/// The `layer-0` section of the cluster document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Layer0Section", into = "Layer0Section")]
pub struct Layer0 {
    /// Cloud provider placement
    pub provider: Option<Provider>,
    /// Kubernetes networks
    pub network: Option<Layer0Network>,
    /// Machine topology
    pub resources: Option<ResourceTopology>,
    /// Keys written by the provisioning collaborator
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// On-disk shape of `layer-0`, with the network keys inline
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Layer0Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pod_network: Option<Ipv4Net>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_network: Option<Ipv4Net>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dns_service_ip: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resources: Option<ResourceTopology>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

impl TryFrom<Layer0Section> for Layer0 {
    type Error = Error;

    fn try_from(section: Layer0Section) -> Result<Self> {
        let network = match (
            section.pod_network,
            section.service_network,
            section.dns_service_ip,
        ) {
            (Some(pod_network), Some(service_network), Some(dns_service_ip)) => {
                Some(Layer0Network {
                    pod_network,
                    service_network,
                    dns_service_ip,
                })
            }
            (None, None, None) => None,
            (pod, service, dns) => {
                let missing: Vec<&str> = [
                    ("pod-network", pod.is_none()),
                    ("service-network", service.is_none()),
                    ("dns-service-ip", dns.is_none()),
                ]
                .into_iter()
                .filter_map(|(key, absent)| absent.then_some(key))
                .collect();
                return Err(Error::validation(format!(
                    "layer-0 network is incomplete, missing {}",
                    missing.join(", ")
                )));
            }
        };
        Ok(Self {
            provider: section.provider,
            network,
            resources: section.resources,
            extra: section.extra,
        })
    }
}

impl From<Layer0> for Layer0Section {
    fn from(layer0: Layer0) -> Self {
        let (pod_network, service_network, dns_service_ip) = match layer0.network {
            Some(n) => (Some(n.pod_network), Some(n.service_network), Some(n.dns_service_ip)),
            None => (None, None, None),
        };
        Self {
            provider: layer0.provider,
            pod_network,
            service_network,
            dns_service_ip,
            resources: layer0.resources,
            extra: layer0.extra,
        }
    }
}
