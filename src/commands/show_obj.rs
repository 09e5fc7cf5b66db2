//! `kelctl show-obj` - write a component's API objects to stdout.

use clap::Args;
use serde_json::Value;

use super::GlobalArgs;
use crate::cluster::ClusterBackend;
use crate::component::ComponentOrchestrator;
use crate::config::DocumentStore;
use crate::Result;

/// Write layer-1 API objects to stdout
#[derive(Args, Debug, Clone)]
pub struct ShowObjArgs {
    /// API group
    pub group: String,
    /// Manifest, named after the component that owns it
    pub manifest: String,
    /// Object kind (e.g. Deployment)
    pub kind: String,
}

/// Run the show-obj command.
pub async fn run(global: &GlobalArgs, args: ShowObjArgs) -> Result<()> {
    for object in execute(&global.store(), &global.orchestrator(), &args).await? {
        println!("{}", serde_json::to_string_pretty(&object)?);
    }
    Ok(())
}

/// Look up the requested objects
pub async fn execute<B: ClusterBackend>(
    store: &DocumentStore,
    orchestrator: &ComponentOrchestrator<B>,
    args: &ShowObjArgs,
) -> Result<Vec<Value>> {
    store.load_required()?;
    orchestrator
        .api_objects(&args.manifest, &args.group, &args.manifest, &args.kind)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ApiObjects, MockClusterBackend};
    use crate::component::{Component, ComponentRegistry};
    use crate::config::ConfigDocument;
    use crate::Error;
    use serde_json::json;
    use tempfile::TempDir;

    fn args(manifest: &str, kind: &str) -> ShowObjArgs {
        ShowObjArgs {
            group: "default".to_string(),
            manifest: manifest.to_string(),
            kind: kind.to_string(),
        }
    }

    fn configured(dir: &TempDir) -> DocumentStore {
        let store = DocumentStore::new(dir.path().join("cluster.yml"));
        store
            .save(&ConfigDocument::default().set_identity("prod"))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn manifest_names_the_component() {
        let dir = TempDir::new().unwrap();
        let mut backend = MockClusterBackend::new();
        backend
            .expect_api_objects()
            .withf(|c, group, manifest| {
                *c == Component::ApiDatabase && group == "default" && manifest == "api-database"
            })
            .times(1)
            .returning(|_, _, _| {
                let mut objects = ApiObjects::new();
                objects.insert(
                    "StatefulSet".to_string(),
                    vec![json!({"metadata": {"name": "db-0"}}), json!({"metadata": {"name": "db-1"}})],
                );
                Ok(objects)
            });
        let orchestrator = ComponentOrchestrator::new(ComponentRegistry::standard(), backend);

        let objects = execute(&configured(&dir), &orchestrator, &args("api-database", "StatefulSet"))
            .await
            .unwrap();

        assert_eq!(objects.len(), 2);
    }

    #[tokio::test]
    async fn unknown_manifest_is_unknown_component() {
        let dir = TempDir::new().unwrap();
        let mut backend = MockClusterBackend::new();
        backend.expect_api_objects().never();
        let orchestrator = ComponentOrchestrator::new(ComponentRegistry::standard(), backend);

        let err = execute(&configured(&dir), &orchestrator, &args("nginx", "Service"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownComponent { .. }));
    }
}
