//! Cluster error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("oc not found. Please install the OpenShift client and make sure it is on PATH")]
    OcNotFound,

    #[error("oc {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource was modified concurrently: {0}")]
    Conflict(String),

    #[error("Unexpected output from oc {command}: {message}")]
    UnexpectedOutput { command: String, message: String },

    #[error("Waiting on resource type '{0}' is not supported")]
    UnsupportedResourceType(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
