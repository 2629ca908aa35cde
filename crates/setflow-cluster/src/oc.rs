//! `oc` CLI backed client and renderer
//!
//! Wraps the OpenShift client binary. Every call runs `oc` as a child
//! process and classifies its stderr into benign, not-found, conflict and
//! hard failures.

use crate::client::{ClusterClient, Route};
use crate::error::{ClusterError, Result};
use crate::render::{Renderer, declared_parameters};
use crate::retry::retry_on_conflict;
use crate::scale::scale_resources;
use async_trait::async_trait;
use serde_json::Value;
use setflow_core::{ComponentVariables, RenderedTemplate, ResourceType, Template};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Kinds removed by [`ClusterClient::delete_all`]
const WIPE_KINDS: &[&str] = &["all", "configmap", "secret", "pvc"];

/// Error classes that do not fail a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenignError {
    ImmutableField,
    AlreadyInProgress,
    AlreadyPaused,
}

/// Output of a command that exited successfully or only hit a benign error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub ignored: Option<BenignError>,
}

/// How a failed command's stderr is interpreted
#[derive(Debug, PartialEq, Eq)]
enum Failure {
    Benign(BenignError),
    NotFound,
    Conflict,
    Failed,
}

fn classify_failure(stderr: &str) -> Failure {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("Warning:"))
        .collect();

    if !lines.is_empty()
        && lines
            .iter()
            .all(|line| line.contains("field is immutable after creation"))
    {
        return Failure::Benign(BenignError::ImmutableField);
    }
    if stderr.contains("already in progress") {
        return Failure::Benign(BenignError::AlreadyInProgress);
    }
    if stderr.contains("already paused") {
        return Failure::Benign(BenignError::AlreadyPaused);
    }
    if stderr.contains("the object has been modified") {
        return Failure::Conflict;
    }
    if stderr.contains("NotFound") || stderr.contains("not found") {
        return Failure::NotFound;
    }
    Failure::Failed
}

/// `oc` command runner
#[derive(Debug, Clone)]
pub struct Oc {
    binary: String,
}

impl Default for Oc {
    fn default() -> Self {
        Self::new()
    }
}

impl Oc {
    pub fn new() -> Self {
        Self {
            binary: "oc".to_string(),
        }
    }

    /// Use a different binary, e.g. `kubectl`-compatible wrappers in tests
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run an `oc` command and return its stdout
    pub async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput> {
        let command = args.join(" ");
        debug!("Running: {} {}", self.binary, command);

        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ClusterError::OcNotFound,
            _ => ClusterError::IoError(e),
        })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if output.status.success() {
            return Ok(CommandOutput {
                stdout,
                ignored: None,
            });
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match classify_failure(&stderr) {
            Failure::Benign(kind) => {
                warn!(command = %command, ?kind, "Ignoring benign oc error");
                Ok(CommandOutput {
                    stdout,
                    ignored: Some(kind),
                })
            }
            Failure::NotFound => Err(ClusterError::NotFound(stderr)),
            Failure::Conflict => Err(ClusterError::Conflict(stderr)),
            Failure::Failed => Err(ClusterError::CommandFailed { command, stderr }),
        }
    }

    async fn run_json(&self, args: &[&str]) -> Result<Option<Value>> {
        match self.run(args, None).await {
            Ok(output) if output.stdout.trim().is_empty() => Ok(None),
            Ok(output) => Ok(Some(serde_json::from_str(&output.stdout)?)),
            Err(ClusterError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// [`ClusterClient`] backed by the `oc` CLI
#[derive(Debug, Clone, Default)]
pub struct OcClient {
    oc: Oc,
}

impl OcClient {
    pub fn new(oc: Oc) -> Self {
        Self { oc }
    }
}

#[async_trait]
impl ClusterClient for OcClient {
    async fn apply(&self, manifest: &Value, namespace: &str) -> Result<()> {
        let body = serde_json::to_string(manifest)?;
        let args = ["apply", "-n", namespace, "-f", "-"];
        retry_on_conflict("apply", || self.oc.run(&args, Some(&body))).await?;
        Ok(())
    }

    async fn get(&self, restype: ResourceType, name: &str) -> Result<Option<Value>> {
        self.oc
            .run_json(&["get", restype.as_str(), name, "-o", "json"])
            .await
    }

    async fn get_from(
        &self,
        namespace: &str,
        restype: ResourceType,
        name: &str,
    ) -> Result<Option<Value>> {
        self.oc
            .run_json(&["get", "-n", namespace, restype.as_str(), name, "-o", "json"])
            .await
    }

    async fn delete(&self, restype: ResourceType, name: &str) -> Result<()> {
        self.oc
            .run(&["delete", "--ignore-not-found", restype.as_str(), name], None)
            .await?;
        Ok(())
    }

    async fn delete_all(&self, namespace: &str, label: Option<&str>) -> Result<()> {
        for kind in WIPE_KINDS {
            let mut args = vec!["delete", *kind, "-n", namespace];
            match label {
                Some(selector) => args.extend(["--selector", selector]),
                None => args.push("--all"),
            }
            if let Err(e) = self.oc.run(&args, None).await {
                warn!(kind = %kind, namespace = %namespace, error = %e, "Delete failed, continuing");
            }
        }
        Ok(())
    }

    async fn start_build(&self, build_config: &str) -> Result<String> {
        let output = self
            .oc
            .run(&["start-build", build_config, "-o", "name"], None)
            .await?;
        let name = output.stdout.trim();
        let name = name.rsplit('/').next().unwrap_or(name);
        if name.is_empty() {
            return Err(ClusterError::UnexpectedOutput {
                command: format!("start-build {}", build_config),
                message: "no build name returned".to_string(),
            });
        }
        info!(build_config = %build_config, build = %name, "Started build");
        Ok(name.to_string())
    }

    async fn cancel_build(&self, build_config: &str) -> Result<()> {
        let target = format!("bc/{}", build_config);
        self.oc
            .run(
                &[
                    "cancel-build",
                    &target,
                    "--state=new",
                    "--state=pending",
                    "--state=running",
                ],
                None,
            )
            .await?;
        Ok(())
    }

    async fn tag_image(&self, from: &str, istag: &str, scheduled: bool) -> Result<()> {
        let scheduled = format!("--scheduled={}", scheduled);
        self.oc
            .run(&["tag", &scheduled, "--source=docker", from, istag], None)
            .await?;
        Ok(())
    }

    async fn import_image(&self, istag: &str, from: Option<&str>, scheduled: bool) -> Result<()> {
        match from {
            Some(from) => {
                let from = format!("--from={}", from);
                let scheduled = format!("--scheduled={}", scheduled);
                self.oc
                    .run(
                        &["import-image", istag, &from, "--confirm", &scheduled],
                        None,
                    )
                    .await?
            }
            None => self.oc.run(&["import-image", istag], None).await?,
        };
        Ok(())
    }

    async fn create_project(&self, name: &str) -> Result<()> {
        self.oc.run(&["new-project", name], None).await?;
        Ok(())
    }

    async fn switch_project(&self, name: &str) -> Result<()> {
        self.oc.run(&["project", name], None).await?;
        Ok(())
    }

    async fn list_routes(&self) -> Result<Vec<Route>> {
        let Some(list) = self.oc.run_json(&["get", "route", "-o", "json"]).await? else {
            return Ok(Vec::new());
        };
        Ok(list
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Route::from_object).collect())
            .unwrap_or_default())
    }

    async fn link_secret(&self, service_account: &str, secret: &str) -> Result<()> {
        self.oc
            .run(
                &["secrets", "link", service_account, secret, "--for=pull,mount"],
                None,
            )
            .await?;
        Ok(())
    }

    async fn rollout_latest(&self, deployment_config: &str) -> Result<bool> {
        let target = format!("dc/{}", deployment_config);
        let output = self.oc.run(&["rollout", "latest", &target], None).await?;
        Ok(output.ignored != Some(BenignError::AlreadyInProgress))
    }
}

/// [`Renderer`] backed by `oc process`
#[derive(Debug, Clone, Default)]
pub struct OcRenderer {
    oc: Oc,
}

impl OcRenderer {
    pub fn new(oc: Oc) -> Self {
        Self { oc }
    }
}

#[async_trait]
impl Renderer for OcRenderer {
    async fn render(
        &self,
        template: &Template,
        variables: &ComponentVariables,
        scale_factor: f64,
        label: Option<&str>,
    ) -> Result<RenderedTemplate> {
        let path = template.path.to_string_lossy().to_string();
        let params: Vec<String> = declared_parameters(template, variables)
            .into_iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();

        let mut args = vec!["process", "-f", path.as_str(), "-o", "json"];
        for param in &params {
            args.extend(["-p", param.as_str()]);
        }
        if let Some(label) = label {
            args.extend(["-l", label]);
        }

        info!(template = %template.name, params = params.len(), "Processing template");
        let output = self.oc.run(&args, None).await?;
        if output.stdout.trim().is_empty() {
            return Ok(RenderedTemplate::empty());
        }

        let mut document: Value = serde_json::from_str(&output.stdout)?;
        scale_resources(&mut document, scale_factor);
        Ok(RenderedTemplate::new(document))
    }
}
