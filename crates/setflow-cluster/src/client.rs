//! Cluster client abstraction

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use setflow_core::ResourceType;
use tracing::{info, warn};

/// Operations the deploy engine needs from a cluster
///
/// Implementations must treat "field is immutable" errors on apply and
/// "already in progress"/"already paused" errors as successful no-ops.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create or update every object in `manifest` inside `namespace`
    async fn apply(&self, manifest: &Value, namespace: &str) -> Result<()>;

    /// Fetch a single resource, `None` if it does not exist
    async fn get(&self, restype: ResourceType, name: &str) -> Result<Option<Value>>;

    /// Fetch a single resource from another namespace
    async fn get_from(
        &self,
        namespace: &str,
        restype: ResourceType,
        name: &str,
    ) -> Result<Option<Value>>;

    /// Delete a resource, ignoring it if it is already gone
    async fn delete(&self, restype: ResourceType, name: &str) -> Result<()>;

    /// Delete all deployable objects in `namespace`, optionally limited by label selector
    async fn delete_all(&self, namespace: &str, label: Option<&str>) -> Result<()>;

    /// Start a build for a build config, returning the build name
    async fn start_build(&self, build_config: &str) -> Result<String>;

    /// Cancel new, pending and running builds of a build config
    async fn cancel_build(&self, build_config: &str) -> Result<()>;

    /// Point an image stream tag at an external image
    async fn tag_image(&self, from: &str, istag: &str, scheduled: bool) -> Result<()>;

    /// Import an image stream tag, creating it from `from` when given
    async fn import_image(&self, istag: &str, from: Option<&str>, scheduled: bool) -> Result<()>;

    async fn create_project(&self, name: &str) -> Result<()>;

    async fn switch_project(&self, name: &str) -> Result<()>;

    async fn list_routes(&self) -> Result<Vec<Route>>;

    /// Bind a secret to a service account for pulling and mounting
    async fn link_secret(&self, service_account: &str, secret: &str) -> Result<()>;

    /// Trigger a new rollout of a deployment config
    ///
    /// Returns `false` when a rollout was already in progress.
    async fn rollout_latest(&self, deployment_config: &str) -> Result<bool>;
}

/// An exposed route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub host: String,
}

impl Route {
    /// Build from a route object, skipping ones without a host
    pub fn from_object(object: &Value) -> Option<Self> {
        let name = object.pointer("/metadata/name")?.as_str()?;
        let host = object.pointer("/spec/host")?.as_str()?;
        Some(Self {
            name: name.to_string(),
            host: host.to_string(),
        })
    }
}

/// Switch to `project`, creating it first when it cannot be fetched
pub async fn ensure_project(client: &dyn ClusterClient, project: &str) -> Result<()> {
    let existing = match client.get(ResourceType::Project, project).await {
        Ok(existing) => existing,
        Err(e) => {
            warn!(project = %project, error = %e, "Unable to get project");
            None
        }
    };

    if existing.is_none() {
        info!(project = %project, "Project not found, creating it");
        client.create_project(project).await?;
    }
    client.switch_project(project).await
}
