//! Cluster collaborators for setflow
//!
//! This crate holds everything that talks to a cluster: the
//! [`ClusterClient`] and [`Renderer`] seams used by the deploy engine, their
//! `oc` CLI backed implementations, the resource scaling pass applied to
//! rendered templates, and the concurrent [`ReadinessWaiter`].
//!
//! # Requirements
//!
//! - `oc` CLI must be installed and logged in to the target cluster

pub mod client;
pub mod error;
pub mod oc;
pub mod render;
pub mod retry;
pub mod rollout;
pub mod scale;
pub mod waiter;

#[cfg(test)]
mod testing;

pub use client::{ClusterClient, Route, ensure_project};
pub use error::{ClusterError, Result};
pub use oc::{Oc, OcClient, OcRenderer};
pub use render::{Renderer, declared_parameters};
pub use retry::retry_on_conflict;
pub use rollout::rollout;
pub use scale::{scale_quantity, scale_resources};
pub use waiter::{
    DEFAULT_POLL_INTERVAL, Readiness, ReadinessWaiter, WaitOutcome, WaitReport, WaitTarget,
    check_readiness,
};
