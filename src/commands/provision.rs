//! `kelctl provision` and `kelctl destroy` - layer-0 infrastructure.
//!
//! Both hand the document to the cluster program. Provisioning may return
//! an updated document (addresses and other facts learned while creating
//! resources), which replaces the one on disk.

use tracing::info;

use super::GlobalArgs;
use crate::cluster::ClusterBackend;
use crate::config::DocumentStore;
use crate::Result;

/// Run the provision command.
pub async fn run_provision(global: &GlobalArgs) -> Result<()> {
    println!("Provisioning...");
    provision(&global.store(), &global.cluster()).await?;
    println!("Done.");
    Ok(())
}

/// Run the destroy command.
pub async fn run_destroy(global: &GlobalArgs) -> Result<()> {
    println!("Destroying...");
    destroy(&global.store(), &global.cluster()).await?;
    println!("Done.");
    Ok(())
}

/// Provision layer 0 and persist the collaborator's document
pub async fn provision<B: ClusterBackend>(store: &DocumentStore, backend: &B) -> Result<()> {
    let document = store.load_required()?;
    info!(cluster = %document.cluster_name(), "Provisioning layer 0");

    if let Some(updated) = backend.create().await? {
        store.save(&updated)?;
        info!(path = %store.path().display(), "Saved provisioned cluster document");
    }
    Ok(())
}

/// Tear down layer 0
pub async fn destroy<B: ClusterBackend>(store: &DocumentStore, backend: &B) -> Result<()> {
    let document = store.load_required()?;
    info!(cluster = %document.cluster_name(), "Destroying layer 0");
    backend.destroy().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockClusterBackend;
    use crate::config::ConfigDocument;
    use crate::Error;
    use tempfile::TempDir;

    fn store_with_document(dir: &TempDir) -> DocumentStore {
        let store = DocumentStore::new(dir.path().join("cluster.yml"));
        store
            .save(&ConfigDocument::default().set_identity("prod"))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn provision_persists_updated_document() {
        let dir = TempDir::new().unwrap();
        let store = store_with_document(&dir);
        let mut backend = MockClusterBackend::new();
        backend.expect_create().times(1).returning(|| {
            let mut doc = ConfigDocument::default().set_identity("prod");
            doc.extra.insert(
                "provisioned".to_string(),
                serde_yaml::Value::Bool(true),
            );
            Ok(Some(doc))
        });

        provision(&store, &backend).await.unwrap();

        let doc = store.load_required().unwrap();
        assert_eq!(doc.extra["provisioned"], serde_yaml::Value::Bool(true));
    }

    #[tokio::test]
    async fn provision_without_update_keeps_document() {
        let dir = TempDir::new().unwrap();
        let store = store_with_document(&dir);
        let before = std::fs::read(store.path()).unwrap();
        let mut backend = MockClusterBackend::new();
        backend.expect_create().times(1).returning(|| Ok(None));

        provision(&store, &backend).await.unwrap();

        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn failed_provision_keeps_document() {
        let dir = TempDir::new().unwrap();
        let store = store_with_document(&dir);
        let before = std::fs::read(store.path()).unwrap();
        let mut backend = MockClusterBackend::new();
        backend
            .expect_create()
            .returning(|| Err(Error::cluster("quota exceeded")));

        assert!(provision(&store, &backend).await.is_err());
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn unconfigured_cluster_is_never_touched() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path().join("cluster.yml"));
        let mut backend = MockClusterBackend::new();
        backend.expect_create().never();
        backend.expect_destroy().never();

        assert!(matches!(
            provision(&store, &backend).await,
            Err(Error::NotConfigured { .. })
        ));
        assert!(matches!(
            destroy(&store, &backend).await,
            Err(Error::NotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn destroy_delegates_to_backend() {
        let dir = TempDir::new().unwrap();
        let store = store_with_document(&dir);
        let mut backend = MockClusterBackend::new();
        backend.expect_destroy().times(1).returning(|| Ok(()));

        destroy(&store, &backend).await.unwrap();
    }
}
