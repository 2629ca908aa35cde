//! リソースタイプとショートカットの対応表

use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// クラスタ上のリソースタイプ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Build,
    BuildConfig,
    ConfigMap,
    DaemonSet,
    Deployment,
    DeploymentConfig,
    Event,
    ImageStream,
    ImageStreamImage,
    ImageStreamTag,
    Job,
    LimitRange,
    Node,
    PersistentVolume,
    PersistentVolumeClaim,
    Pod,
    Project,
    ReplicationController,
    ResourceQuota,
    Route,
    Secret,
    Service,
    ServiceAccount,
    StatefulSet,
}

/// (正式名, ショートカット)
const ALIASES: &[(ResourceType, &str, Option<&str>)] = &[
    (ResourceType::Build, "build", None),
    (ResourceType::BuildConfig, "buildconfig", Some("bc")),
    (ResourceType::ConfigMap, "configmap", Some("cm")),
    (ResourceType::DaemonSet, "daemonset", Some("ds")),
    (ResourceType::Deployment, "deployment", Some("deploy")),
    (ResourceType::DeploymentConfig, "deploymentconfig", Some("dc")),
    (ResourceType::Event, "event", Some("ev")),
    (ResourceType::ImageStream, "imagestream", Some("is")),
    (ResourceType::ImageStreamImage, "imagestreamimage", Some("isimage")),
    (ResourceType::ImageStreamTag, "imagestreamtag", Some("istag")),
    (ResourceType::Job, "job", None),
    (ResourceType::LimitRange, "limitrange", Some("limits")),
    (ResourceType::Node, "node", None),
    (ResourceType::PersistentVolume, "persistentvolume", Some("pv")),
    (ResourceType::PersistentVolumeClaim, "persistentvolumeclaim", Some("pvc")),
    (ResourceType::Pod, "pod", Some("po")),
    (ResourceType::Project, "project", None),
    (ResourceType::ReplicationController, "replicationcontroller", Some("rc")),
    (ResourceType::ResourceQuota, "resourcequota", Some("quota")),
    (ResourceType::Route, "route", None),
    (ResourceType::Secret, "secret", Some("secrets")),
    (ResourceType::Service, "service", Some("svc")),
    (ResourceType::ServiceAccount, "serviceaccount", Some("sa")),
    (ResourceType::StatefulSet, "statefulset", Some("sts")),
];

impl ResourceType {
    /// 正式名またはショートカットからパース（大文字小文字は区別しない）
    pub fn parse(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        ALIASES
            .iter()
            .find(|(_, name, shortcut)| *name == lower || *shortcut == Some(lower.as_str()))
            .map(|(restype, _, _)| *restype)
            .ok_or_else(|| CoreError::UnknownResourceType(s.to_string()))
    }

    /// 正式名（`oc get` に渡す名前）
    pub fn as_str(&self) -> &'static str {
        ALIASES
            .iter()
            .find(|(restype, _, _)| restype == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("unknown")
    }

    /// マニフェストの `kind` がこのタイプか判定
    pub fn matches_kind(&self, kind: &str) -> bool {
        Self::parse(kind).map(|parsed| parsed == *self).unwrap_or(false)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ResourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
