//! Readiness polling
//!
//! After a stage is applied, the deploy engine waits for its deployments,
//! stateful sets, daemon sets and builds to become ready. Every target is
//! polled concurrently with its own timeout.

use crate::client::ClusterClient;
use crate::error::{ClusterError, Result};
use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use setflow_core::ResourceType;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// Default delay between two status checks of one target
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A resource whose readiness is polled
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WaitTarget {
    pub restype: ResourceType,
    pub name: String,
}

impl WaitTarget {
    pub fn new(restype: ResourceType, name: impl Into<String>) -> Self {
        Self {
            restype,
            name: name.into(),
        }
    }

    /// Parse `type/name`, e.g. `dc/api`
    pub fn parse(value: &str) -> setflow_core::Result<Self> {
        let (restype, name) = value
            .split_once('/')
            .ok_or_else(|| setflow_core::CoreError::UnknownResourceType(value.to_string()))?;
        Ok(Self::new(ResourceType::parse(restype)?, name))
    }
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.restype, self.name)
    }
}

/// Result of one readiness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady,
    /// Terminal failure, no point in waiting further
    Failed(String),
}

/// Final outcome for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut,
    Failed(String),
    /// Not waited on to completion because a sibling failed in fail-fast mode
    Abandoned,
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, WaitOutcome::Ready)
    }
}

/// Aggregated result of [`ReadinessWaiter::wait_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitReport {
    pub results: Vec<(WaitTarget, WaitOutcome)>,
}

impl WaitReport {
    pub fn all_ready(&self) -> bool {
        self.results.iter().all(|(_, outcome)| outcome.is_ready())
    }

    pub fn failed(&self) -> Vec<&WaitTarget> {
        self.results
            .iter()
            .filter(|(_, outcome)| !outcome.is_ready())
            .map(|(target, _)| target)
            .collect()
    }
}

fn count(value: &Value, pointer: &str) -> i64 {
    value.pointer(pointer).and_then(Value::as_i64).unwrap_or(0)
}

fn desired_replicas(resource: &Value) -> i64 {
    resource
        .pointer("/spec/replicas")
        .and_then(Value::as_i64)
        .unwrap_or(1)
}

/// Evaluate the readiness predicate for a fetched resource
///
/// Build configs are not evaluated here; the waiter resolves them to their
/// latest build first.
pub fn check_readiness(restype: ResourceType, resource: &Value) -> Result<Readiness> {
    let ready = |ok: bool| {
        if ok {
            Readiness::Ready
        } else {
            Readiness::NotReady
        }
    };

    if resource.get("status").is_none_or(|status| status.is_null()) {
        return Ok(Readiness::NotReady);
    }

    match restype {
        ResourceType::Deployment | ResourceType::DeploymentConfig => {
            let desired = desired_replicas(resource);
            Ok(ready(
                count(resource, "/status/updatedReplicas") == desired
                    && count(resource, "/status/availableReplicas") == desired
                    && count(resource, "/status/unavailableReplicas") == 0,
            ))
        }
        ResourceType::StatefulSet => Ok(ready(
            count(resource, "/status/readyReplicas") == desired_replicas(resource),
        )),
        ResourceType::DaemonSet => Ok(ready(
            resource.pointer("/status/desiredNumberScheduled").is_some()
                && count(resource, "/status/desiredNumberScheduled")
                    == count(resource, "/status/numberAvailable"),
        )),
        ResourceType::Pod => Ok(ready(
            resource.pointer("/status/phase").and_then(Value::as_str) == Some("Running"),
        )),
        ResourceType::Build => {
            let phase = resource
                .pointer("/status/phase")
                .and_then(Value::as_str)
                .unwrap_or_default();
            match phase {
                "Complete" | "Completed" => Ok(Readiness::Ready),
                "Cancelled" => {
                    let name = resource
                        .pointer("/metadata/name")
                        .and_then(Value::as_str)
                        .unwrap_or("<unknown>");
                    warn!(build = %name, "Build was cancelled");
                    Ok(Readiness::Ready)
                }
                "Failed" | "Error" => Ok(Readiness::Failed(format!("build phase is {}", phase))),
                _ => Ok(Readiness::NotReady),
            }
        }
        other => Err(ClusterError::UnsupportedResourceType(other.to_string())),
    }
}

/// Polls cluster resources until they are ready
#[derive(Clone)]
pub struct ReadinessWaiter {
    client: Arc<dyn ClusterClient>,
    poll_interval: Duration,
}

impl ReadinessWaiter {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Check a target once
    async fn check(&self, target: &WaitTarget) -> Result<Readiness> {
        if target.restype == ResourceType::BuildConfig {
            let Some(build_config) = self.client.get(target.restype, &target.name).await? else {
                return Ok(Readiness::NotReady);
            };
            let last_version = count(&build_config, "/status/lastVersion");
            if last_version == 0 {
                // nothing triggered yet
                return Ok(Readiness::NotReady);
            }
            let build_name = format!("{}-{}", target.name, last_version);
            return match self.client.get(ResourceType::Build, &build_name).await? {
                Some(build) => check_readiness(ResourceType::Build, &build),
                None => Ok(Readiness::NotReady),
            };
        }

        match self.client.get(target.restype, &target.name).await? {
            Some(resource) => check_readiness(target.restype, &resource),
            None => Ok(Readiness::NotReady),
        }
    }

    /// Wait for a single target until it is ready, fails, or `timeout` elapses
    #[tracing::instrument(skip(self, target), fields(target = %target))]
    pub async fn wait_for(&self, target: &WaitTarget, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        info!(timeout_secs = timeout.as_secs(), "Waiting for resource to be ready");

        loop {
            debug!("Checking readiness");
            match self.check(target).await {
                Ok(Readiness::Ready) => {
                    info!("Resource is ready");
                    return WaitOutcome::Ready;
                }
                Ok(Readiness::Failed(reason)) => {
                    warn!(reason = %reason, "Resource failed");
                    return WaitOutcome::Failed(reason);
                }
                Ok(Readiness::NotReady) => {}
                Err(e @ ClusterError::UnsupportedResourceType(_)) => {
                    return WaitOutcome::Failed(e.to_string());
                }
                Err(e) => {
                    warn!(error = %e, "Status check failed, will retry");
                }
            }

            if Instant::now() >= deadline {
                warn!(timeout_secs = timeout.as_secs(), "Timed out waiting for resource");
                return WaitOutcome::TimedOut;
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Wait for every target concurrently
    ///
    /// Each target gets the full `timeout` independently. With `fail_fast`
    /// the remaining targets are abandoned as soon as one does not become
    /// ready.
    pub async fn wait_all(
        &self,
        targets: &[WaitTarget],
        timeout: Duration,
        fail_fast: bool,
    ) -> WaitReport {
        if targets.is_empty() {
            return WaitReport::default();
        }

        let report = if fail_fast {
            self.wait_fail_fast(targets, timeout).await
        } else {
            let outcomes =
                join_all(targets.iter().map(|target| self.wait_for(target, timeout))).await;
            WaitReport {
                results: targets.iter().cloned().zip(outcomes).collect(),
            }
        };

        let failed = report.failed();
        if !failed.is_empty() {
            let names: Vec<String> = failed.iter().map(|target| target.to_string()).collect();
            warn!(failed = %names.join(", "), "Some resources failed to become ready");
        }
        report
    }

    async fn wait_fail_fast(&self, targets: &[WaitTarget], timeout: Duration) -> WaitReport {
        let mut outcomes: Vec<Option<WaitOutcome>> = vec![None; targets.len()];
        let mut pending: FuturesUnordered<_> = targets
            .iter()
            .enumerate()
            .map(|(index, target)| async move { (index, self.wait_for(target, timeout).await) })
            .collect();

        while let Some((index, outcome)) = pending.next().await {
            let stop = !outcome.is_ready();
            outcomes[index] = Some(outcome);
            if stop {
                break;
            }
        }
        drop(pending);

        WaitReport {
            results: targets
                .iter()
                .cloned()
                .zip(outcomes)
                .map(|(target, outcome)| (target, outcome.unwrap_or(WaitOutcome::Abandoned)))
                .collect(),
        }
    }
}
