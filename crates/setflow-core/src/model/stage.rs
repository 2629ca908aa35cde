//! ステージ定義

use serde::{Deserialize, Serialize};

/// `wait` のデフォルト値
pub const DEFAULT_STAGE_WAIT: bool = true;

/// `timeout` のデフォルト値（秒）
pub const DEFAULT_STAGE_TIMEOUT: u64 = 300;

/// `deploy_order` 内の1ステージ
///
/// ベースの `_cfg` ではサービスセット名、サービスセットの `_cfg` では
/// コンポーネント名が `components` に並びます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// このステージでデプロイする要素
    #[serde(default)]
    pub components: Vec<String>,
    /// デプロイ後に準備完了を待機するか
    #[serde(default = "default_wait")]
    pub wait: bool,
    /// 待機タイムアウト（秒）
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_wait() -> bool {
    DEFAULT_STAGE_WAIT
}

fn default_timeout() -> u64 {
    DEFAULT_STAGE_TIMEOUT
}

impl Default for StageSpec {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            wait: default_wait(),
            timeout: default_timeout(),
        }
    }
}

impl StageSpec {
    pub fn new(components: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            components: components.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}
