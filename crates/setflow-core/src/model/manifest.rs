//! サービスセットのマニフェスト（`_cfg`）

use crate::error::{CoreError, Result};
use crate::merge::ConfigTree;
use crate::model::image::{ImageSpec, parse_images};
use crate::model::secret::{SecretSpec, parse_secrets};
use crate::model::stage::StageSpec;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// ベースまたはサービスセットの `_cfg`
///
/// `deploy_order` のキーは文字列として昇順に並べられ、その順序が
/// そのままデプロイ順になります。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceSetManifest {
    pub deploy_order: BTreeMap<String, StageSpec>,
    /// 先にデプロイ済みである必要があるサービスセット
    pub requires: Vec<String>,
    pub secrets: Vec<SecretSpec>,
    pub images: Vec<ImageSpec>,
    /// ホストが登録したフックを使う
    pub custom_deploy_logic: bool,
    /// BuildConfig を再トリガーする組み込みフックを使う
    pub trigger_builds: bool,
    /// post_deploy フックに渡すタイムアウト（秒）
    pub post_deploy_timeout: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawManifest {
    deploy_order: Option<BTreeMap<String, StageSpec>>,
    requires: Option<Vec<String>>,
    custom_deploy_logic: bool,
    trigger_builds: bool,
    post_deploy_timeout: u64,
}

impl ServiceSetManifest {
    /// マージ済みの `_cfg` ツリーからマニフェストを構築
    pub fn from_tree(tree: &ConfigTree) -> Result<Self> {
        // secrets/images は独自の書式を持つので別に解釈する
        let mut rest = tree.clone();
        rest.remove("secrets");
        rest.remove("images");

        let raw: RawManifest =
            serde_json::from_value(Value::Object(rest)).map_err(|e| CoreError::InvalidManifest {
                section: "deploy_order".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            deploy_order: raw.deploy_order.unwrap_or_default(),
            requires: raw.requires.unwrap_or_default(),
            secrets: parse_secrets(tree)?,
            images: parse_images(tree)?,
            custom_deploy_logic: raw.custom_deploy_logic,
            trigger_builds: raw.trigger_builds,
            post_deploy_timeout: raw.post_deploy_timeout,
        })
    }

    /// ステージを昇順で返す
    pub fn stages(&self) -> impl Iterator<Item = (&String, &StageSpec)> {
        self.deploy_order.iter()
    }

    /// すべてのステージに現れる要素（重複除去、出現順）
    pub fn all_components(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for stage in self.deploy_order.values() {
            for component in &stage.components {
                if !seen.contains(component) {
                    seen.push(component.clone());
                }
            }
        }
        seen
    }

    /// `name` がいずれかのステージに含まれるか
    pub fn lists(&self, name: &str) -> bool {
        self.deploy_order
            .values()
            .any(|stage| stage.components.iter().any(|c| c == name))
    }
}
