//! Cluster backend that shells out to the cluster-management program
//!
//! Every call runs `<program> --config <document> <subcommand...>`:
//!
//! | Operation | Subcommand | stdout |
//! |---|---|---|
//! | create | `create` | updated document as YAML, or nothing |
//! | destroy | `destroy` | ignored |
//! | create component | `component create <name>` | ignored |
//! | API objects | `component objects <name> <group> <manifest>` | JSON kind map |
//! | provider resource | `resource get <component>` | JSON resource spec |
//! | startup script | `resource startup-script <component>` | script text |
//!
//! The startup-script request carries the resource and its [`ScriptContext`]
//! as JSON on stdin. A non-zero exit maps to [`Error::Cluster`] with stderr.

use std::path::PathBuf;
use std::process::{Output, Stdio};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{ApiObjects, ClusterBackend, ProviderComponent, ProviderResource, ScriptContext};
use crate::component::Component;
use crate::config::ConfigDocument;
use crate::{Error, Result};

/// Captured output of an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Whether command succeeded
    pub success: bool,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Trait for executing external commands (allows mocking in tests)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, feeding `stdin` if given
    async fn run(&self, program: &str, args: &[String], stdin: Option<String>)
        -> Result<CommandOutput>;
}

/// Real command runner that spawns processes
#[derive(Default, Clone)]
pub struct RealCommandRunner;

#[async_trait]
impl CommandRunner for RealCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<String>,
    ) -> Result<CommandOutput> {
        debug!(program = %program, args = ?args, "Executing cluster command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::cluster(format!("failed to execute {}: {}", program, e)))?;

        // A program that exits without draining stdin closes the pipe; its
        // exit status and stderr are what gets reported
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            if let Err(e) = pipe.write_all(input.as_bytes()).await {
                debug!(program = %program, error = %e, "Cluster command closed stdin early");
            }
        }

        let output = child.wait_with_output().await?;
        Ok(CommandOutput::from(output))
    }
}

#[derive(Serialize)]
struct ScriptRequest<'a> {
    resource: &'a ProviderResource,
    #[serde(flatten)]
    context: &'a ScriptContext,
}

/// [`ClusterBackend`] backed by the external cluster-management program
pub struct ExternalCluster<R: CommandRunner = RealCommandRunner> {
    program: String,
    config_path: PathBuf,
    runner: R,
}

impl ExternalCluster<RealCommandRunner> {
    /// Drive `program` against the document at `config_path`
    pub fn new(program: impl Into<String>, config_path: impl Into<PathBuf>) -> Self {
        Self::with_runner(program, config_path, RealCommandRunner)
    }
}

impl<R: CommandRunner> ExternalCluster<R> {
    /// Create a backend with a custom command runner
    pub fn with_runner(
        program: impl Into<String>,
        config_path: impl Into<PathBuf>,
        runner: R,
    ) -> Self {
        Self {
            program: program.into(),
            config_path: config_path.into(),
            runner,
        }
    }

    async fn invoke(&self, subcommand: &[&str], stdin: Option<String>) -> Result<String> {
        let mut args = vec![
            "--config".to_string(),
            self.config_path.display().to_string(),
        ];
        args.extend(subcommand.iter().map(|s| s.to_string()));

        let output = self.runner.run(&self.program, &args, stdin).await?;
        if !output.success {
            return Err(Error::cluster(format!(
                "{} {} failed: {}",
                self.program,
                subcommand.join(" "),
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl<R: CommandRunner> ClusterBackend for ExternalCluster<R> {
    async fn create(&self) -> Result<Option<ConfigDocument>> {
        let stdout = self.invoke(&["create"], None).await?;
        if stdout.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_yaml::from_str(&stdout)?))
    }

    async fn destroy(&self) -> Result<()> {
        self.invoke(&["destroy"], None).await?;
        Ok(())
    }

    async fn create_component(&self, component: Component) -> Result<()> {
        self.invoke(&["component", "create", component.name()], None)
            .await?;
        Ok(())
    }

    async fn api_objects(
        &self,
        component: Component,
        group: &str,
        manifest: &str,
    ) -> Result<ApiObjects> {
        let stdout = self
            .invoke(
                &["component", "objects", component.name(), group, manifest],
                None,
            )
            .await?;
        Ok(serde_json::from_str(&stdout)?)
    }

    async fn provider_resource(&self, component: &ProviderComponent) -> Result<ProviderResource> {
        let stdout = self
            .invoke(&["resource", "get", component.name()], None)
            .await?;
        Ok(ProviderResource {
            component: component.name().to_string(),
            spec: serde_json::from_str(&stdout)?,
        })
    }

    async fn startup_script(
        &self,
        resource: &ProviderResource,
        context: &ScriptContext,
    ) -> Result<String> {
        let request = serde_json::to_string(&ScriptRequest { resource, context })?;
        self.invoke(
            &["resource", "startup-script", resource.component.as_str()],
            Some(request),
        )
        .await
    }
}
