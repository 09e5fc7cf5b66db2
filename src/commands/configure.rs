//! `kelctl configure` - build the cluster document one layer at a time.
//!
//! Layer 0 creates the document: identity, release, provider, networks and
//! the standard machine topology. Layer 1 adds the platform settings to an
//! existing document. Each layer is applied at most once; every check runs
//! before anything is written.
//!
//! # Usage
//!
//! ```bash
//! kelctl configure --layer 0 --name prod --domain example.com \
//!     --provider gce --gce-project-id kel-prod \
//!     --gce-region us-central1 --gce-zone us-central1-a
//!
//! kelctl configure --layer 1 --api-database-disk-type pd-ssd
//! ```

use std::net::Ipv4Addr;

use clap::{Args, ValueEnum};
use ipnet::Ipv4Net;
use rand::Rng;
use tracing::info;

use super::GlobalArgs;
use crate::config::{
    ConfigDocument, DiskSpec, DiskType, DocumentStore, Layer0Network, Layer1Settings,
    ResourceTopology,
};
use crate::gate::{self, Layer0Checked, Layer0Inputs};
use crate::release::{ReleaseResolver, ReleaseSource};
use crate::{
    Error, Result, DEFAULT_API_SUBDOMAIN, DEFAULT_CHANNEL, DEFAULT_IDENTITY_URL,
    DEFAULT_MANAGED_BY, DEFAULT_POD_NETWORK, DEFAULT_SERVICE_NETWORK,
};

/// Cluster layer to configure
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Layer {
    /// Infrastructure substrate
    #[value(name = "0")]
    Zero,
    /// Platform services
    #[value(name = "1")]
    One,
}

/// Supported cloud providers
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Google Compute Engine
    Gce,
}

impl ProviderKind {
    /// Name as spelled on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gce => "gce",
        }
    }
}

/// Configure a cluster layer
#[derive(Args, Debug, Clone)]
pub struct ConfigureArgs {
    /// Layer to configure
    #[arg(long, value_enum)]
    pub layer: Option<Layer>,

    // Layer 0
    /// Cluster name
    #[arg(long)]
    pub name: Option<String>,

    /// DNS domain the cluster serves
    #[arg(long)]
    pub domain: Option<String>,

    /// Entity managing the cluster
    #[arg(long, default_value = DEFAULT_MANAGED_BY)]
    pub managed_by: String,

    /// Release channel (`stable`, `dev`, `dev/<branch>`, ...)
    #[arg(long, default_value = DEFAULT_CHANNEL)]
    pub channel: String,

    /// Cloud provider
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// GCE project ID
    #[arg(long)]
    pub gce_project_id: Option<String>,

    /// GCE region
    #[arg(long)]
    pub gce_region: Option<String>,

    /// GCE zone
    #[arg(long)]
    pub gce_zone: Option<String>,

    /// Fixed address for the Kubernetes master
    #[arg(long)]
    pub master_ip: Option<Ipv4Addr>,

    /// Pod network CIDR
    #[arg(long, default_value = DEFAULT_POD_NETWORK)]
    pub pod_network: Ipv4Net,

    /// Service network CIDR
    #[arg(long, default_value = DEFAULT_SERVICE_NETWORK)]
    pub service_network: Ipv4Net,

    /// kube-dns service address (defaults to the tenth address of the
    /// service network)
    #[arg(long)]
    pub dns_service_ip: Option<Ipv4Addr>,

    // Layer 1
    /// Identity service URL
    #[arg(long, default_value = DEFAULT_IDENTITY_URL)]
    pub identity_url: String,

    /// API subdomain, relative to the cluster domain
    #[arg(long, default_value = DEFAULT_API_SUBDOMAIN)]
    pub api_subdomain: String,

    /// Address used for HTTP/TLS routing
    #[arg(long)]
    pub router_ip: Option<Ipv4Addr>,

    /// API cache disk type
    #[arg(long, value_enum, default_value_t = DiskType::PdStandard)]
    pub api_cache_disk_type: DiskType,

    /// API cache disk size in GB
    #[arg(long, default_value_t = 100)]
    pub api_cache_disk_size: u32,

    /// API database disk type
    #[arg(long, value_enum, default_value_t = DiskType::PdStandard)]
    pub api_database_disk_type: DiskType,

    /// API database disk size in GB
    #[arg(long, default_value_t = 100)]
    pub api_database_disk_size: u32,
}

impl ConfigureArgs {
    fn layer1_settings(&self) -> Layer1Settings {
        Layer1Settings {
            identity_url: self.identity_url.clone(),
            api_subdomain: self.api_subdomain.clone(),
            router_ip: self.router_ip,
            api_cache_disk: DiskSpec {
                disk_type: self.api_cache_disk_type,
                disk_size: self.api_cache_disk_size,
            },
            api_database_disk: DiskSpec {
                disk_type: self.api_database_disk_type,
                disk_size: self.api_database_disk_size,
            },
        }
    }
}

/// Run the configure command.
pub async fn run(global: &GlobalArgs, args: ConfigureArgs) -> Result<()> {
    let store = global.store();
    match args.layer {
        None => Err(Error::missing_parameter("layer")),
        Some(Layer::Zero) => {
            let resolver = global.release_resolver()?;
            configure_layer0(&store, &resolver, &args).await?;
            Ok(())
        }
        Some(Layer::One) => {
            configure_layer1(&store, &args, &mut rand::thread_rng())?;
            Ok(())
        }
    }
}

/// Create the document with its layer-0 section
pub async fn configure_layer0<S: ReleaseSource>(
    store: &DocumentStore,
    resolver: &ReleaseResolver<S>,
    args: &ConfigureArgs,
) -> Result<ConfigDocument> {
    gate::guard_layer0(store.exists())?;
    let Layer0Checked { name, provider } = Layer0Inputs {
        name: args.name.as_deref(),
        provider: args.provider.map(|p| p.as_str()),
        gce_project_id: args.gce_project_id.as_deref(),
        gce_region: args.gce_region.as_deref(),
        gce_zone: args.gce_zone.as_deref(),
    }
    .require()?;
    let network = Layer0Network::new(args.pod_network, args.service_network, args.dns_service_ip)?;

    let document = ConfigDocument::default()
        .set_identity(name)
        .set_domain(args.domain.clone(), args.managed_by.as_str())
        .attach_release(resolver, &args.channel)
        .await?
        .set_provider(provider)
        .set_layer0_network(network)
        .set_resources(ResourceTopology::standard(args.master_ip));

    store.save(&document)?;
    info!(
        cluster = %name,
        path = %store.path().display(),
        "Configured layer 0"
    );
    Ok(document)
}

/// Add the layer-1 section to an existing document
pub fn configure_layer1<R: Rng + ?Sized>(
    store: &DocumentStore,
    args: &ConfigureArgs,
    rng: &mut R,
) -> Result<ConfigDocument> {
    let existing = store.load()?;
    gate::guard_layer1(
        existing.is_some(),
        existing.as_ref().is_some_and(|d| d.layer1.is_some()),
    )?;
    let Some(document) = existing else {
        return Err(Error::not_configured(format!(
            "{} does not exist. Did you configure layer 0?",
            store.path().display()
        )));
    };

    let document = document.set_layer1(&args.layer1_settings(), rng)?;
    store.save(&document)?;
    info!(
        cluster = %document.cluster_name(),
        path = %store.path().display(),
        "Configured layer 1"
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::MockReleaseSource;
    use clap::Parser;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ConfigureArgs,
    }

    fn parse(argv: &[&str]) -> ConfigureArgs {
        Harness::try_parse_from(std::iter::once("configure").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    fn layer0_args() -> ConfigureArgs {
        parse(&[
            "--layer",
            "0",
            "--name",
            "prod",
            "--domain",
            "example.com",
            "--provider",
            "gce",
            "--gce-project-id",
            "kel-prod",
            "--gce-region",
            "us-central1",
            "--gce-zone",
            "us-central1-a",
        ])
    }

    fn resolver() -> ReleaseResolver<MockReleaseSource> {
        let mut source = MockReleaseSource::new();
        source
            .expect_fetch_channels()
            .returning(|| Ok(json!({"stable": "v1.0.0", "dev": {"master": "v1.1.0-dev"}})));
        source
            .expect_fetch_manifest()
            .returning(|tag| Ok(json!({"kel": {"tag": tag}})));
        ReleaseResolver::new(source)
    }

    fn untouched_resolver() -> ReleaseResolver<MockReleaseSource> {
        let mut source = MockReleaseSource::new();
        source.expect_fetch_channels().never();
        source.expect_fetch_manifest().never();
        ReleaseResolver::new(source)
    }

    fn store_in(dir: &TempDir) -> DocumentStore {
        DocumentStore::new(dir.path().join("cluster.yml"))
    }

    // =========================================================================
    // Story: layer 0 creates the document
    // =========================================================================

    #[tokio::test]
    async fn layer0_writes_identity_release_provider_and_topology() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        configure_layer0(&store, &resolver(), &layer0_args())
            .await
            .unwrap();

        let doc = store.load_required().unwrap();
        assert_eq!(doc.cluster_name(), "prod");
        assert_eq!(doc.domain.as_deref(), Some("example.com"));
        assert_eq!(doc.managed_by.as_deref(), Some("kelproject.com"));

        let release = doc.release.as_ref().unwrap();
        assert_eq!(release.channel, "dev");
        assert_eq!(release.version, "v1.1.0-dev");

        let layer0 = doc.layer0.as_ref().unwrap();
        assert_eq!(layer0.provider.as_ref().unwrap().kind(), "gce");
        let network = layer0.network.as_ref().unwrap();
        assert_eq!(network.dns_service_ip, Ipv4Addr::new(10, 96, 0, 10));
        assert!(doc.resources().unwrap().has_node_pool("node-1x"));
    }

    #[tokio::test]
    async fn layer0_reconfigure_leaves_document_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        configure_layer0(&store, &resolver(), &layer0_args())
            .await
            .unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let err = configure_layer0(&store, &untouched_resolver(), &layer0_args())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AlreadyConfigured { .. }));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn missing_name_is_reported_first_and_nothing_is_written() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let args = parse(&["--layer", "0", "--gce-zone", "us-central1-a"]);

        let err = configure_layer0(&store, &untouched_resolver(), &args)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingParameter { ref name } if name == "name"));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn missing_gce_zone_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut args = layer0_args();
        args.gce_zone = None;

        let err = configure_layer0(&store, &untouched_resolver(), &args)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingParameter { ref name } if name == "gce-zone"));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn unknown_channel_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut args = layer0_args();
        args.channel = "nightly".to_string();

        let mut source = MockReleaseSource::new();
        source
            .expect_fetch_channels()
            .returning(|| Ok(json!({"stable": "v1.0.0", "dev": {}})));
        source.expect_fetch_manifest().never();

        let err = configure_layer0(&store, &ReleaseResolver::new(source), &args)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownChannel { .. }));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn overlapping_networks_are_rejected_before_release_lookup() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut args = layer0_args();
        args.pod_network = "10.96.0.0/16".parse().unwrap();

        let err = configure_layer0(&store, &untouched_resolver(), &args)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(!store.exists());
    }

    // =========================================================================
    // Story: layer 1 builds on layer 0, once
    // =========================================================================

    #[test]
    fn layer1_without_document_is_not_configured() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut rng = StdRng::seed_from_u64(1);

        let err = configure_layer1(&store, &parse(&["--layer", "1"]), &mut rng).unwrap_err();

        assert!(matches!(err, Error::NotConfigured { .. }));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn layer1_adds_platform_settings() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        configure_layer0(&store, &resolver(), &layer0_args())
            .await
            .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let args = parse(&[
            "--layer",
            "1",
            "--router-ip",
            "203.0.113.7",
            "--api-database-disk-type",
            "pd-ssd",
            "--api-database-disk-size",
            "250",
        ]);

        configure_layer1(&store, &args, &mut rng).unwrap();

        let layer1 = store.load_required().unwrap().layer1.unwrap();
        assert_eq!(layer1.api.host, "api.example.com");
        assert_eq!(layer1.router.ip, Some(Ipv4Addr::new(203, 0, 113, 7)));
        assert_eq!(layer1.api.database.disk.disk_type, DiskType::PdSsd);
        assert_eq!(layer1.api.database.disk.disk_size, 250);
        assert_eq!(layer1.api.database.credentials.username.len(), 8);
        assert_eq!(layer1.api.database.credentials.password.len(), 32);
    }

    #[tokio::test]
    async fn layer1_twice_is_already_configured_and_keeps_credentials() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        configure_layer0(&store, &resolver(), &layer0_args())
            .await
            .unwrap();
        let args = parse(&["--layer", "1"]);
        configure_layer1(&store, &args, &mut StdRng::seed_from_u64(1)).unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let err = configure_layer1(&store, &args, &mut StdRng::seed_from_u64(2)).unwrap_err();

        assert!(matches!(err, Error::AlreadyConfigured { .. }));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn layer1_without_domain_is_missing_parameter() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut args = layer0_args();
        args.domain = None;
        configure_layer0(&store, &resolver(), &args).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let err = configure_layer1(&store, &parse(&["--layer", "1"]), &mut StdRng::seed_from_u64(1))
            .unwrap_err();

        assert!(matches!(err, Error::MissingParameter { ref name } if name == "domain"));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    // =========================================================================
    // Story: the layer must be chosen
    // =========================================================================

    #[tokio::test]
    async fn missing_layer_is_missing_parameter() {
        let dir = TempDir::new().unwrap();
        let global = GlobalArgs {
            config: dir.path().join("cluster.yml"),
            release_url: "http://127.0.0.1:1".to_string(),
            release_timeout_secs: 1,
            cluster_bin: "kel-cluster".to_string(),
        };

        let err = run(&global, parse(&["--name", "prod"])).await.unwrap_err();

        assert!(matches!(err, Error::MissingParameter { ref name } if name == "layer"));
        assert!(!dir.path().join("cluster.yml").exists());
    }
}
