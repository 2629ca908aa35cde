//! Deployment config rollouts

use crate::client::ClusterClient;
use crate::error::Result;
use crate::waiter::{ReadinessWaiter, WaitOutcome, WaitTarget};
use serde_json::Value;
use setflow_core::ResourceType;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// How many times to look for the new revision before waiting anyway
const REVISION_CHECKS: u32 = 60;

const REVISION_CHECK_INTERVAL: Duration = Duration::from_secs(1);

async fn latest_version(client: &dyn ClusterClient, name: &str) -> Option<i64> {
    client
        .get(ResourceType::DeploymentConfig, name)
        .await
        .ok()
        .flatten()
        .and_then(|dc| dc.pointer("/status/latestVersion").and_then(Value::as_i64))
}

/// Roll out a deployment config and wait for the new revision to become ready
///
/// If a rollout is already in progress, waits for that one instead.
pub async fn rollout(
    client: &dyn ClusterClient,
    waiter: &ReadinessWaiter,
    deployment_config: &str,
    timeout: Duration,
) -> Result<WaitOutcome> {
    let old_revision = latest_version(client, deployment_config).await;

    if client.rollout_latest(deployment_config).await? {
        for _ in 0..REVISION_CHECKS {
            if latest_version(client, deployment_config).await != old_revision {
                break;
            }
            info!(dc = %deployment_config, "Waiting for rollout to begin");
            sleep(REVISION_CHECK_INTERVAL).await;
        }
    } else {
        info!(dc = %deployment_config, "Rollout already in progress");
    }

    let target = WaitTarget::new(ResourceType::DeploymentConfig, deployment_config);
    Ok(waiter.wait_for(&target, timeout).await)
}
