//! デプロイ実行オプション

use crate::error::{DeployError, Result};
use setflow_cluster::DEFAULT_POLL_INTERVAL;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// `service_set/component` 形式の指定
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    pub service_set: String,
    pub component: String,
}

impl ComponentRef {
    pub fn new(service_set: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            service_set: service_set.into(),
            component: component.into(),
        }
    }
}

impl FromStr for ComponentRef {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((set, component))
                if !set.is_empty() && !component.is_empty() && !component.contains('/') =>
            {
                Ok(Self::new(set, component))
            }
            _ => Err(DeployError::InvalidComponentRef(s.to_string())),
        }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service_set, self.component)
    }
}

/// ドライランの出力形式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    /// 出力ファイルの拡張子
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// ドライランの出力先
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DryRunOptions {
    pub output: OutputFormat,
    /// 指定時は `<to_dir>/<set>/<component>.<ext>` に書き出す（未指定は標準出力）
    pub to_dir: Option<PathBuf>,
}

/// 準備待ちが失敗したときの扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnWaitFailure {
    /// 実行全体を中断
    #[default]
    Abort,
    /// 警告を出して続行
    Continue,
}

/// 1回のデプロイ実行の設定
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// テンプレートのルートディレクトリ
    pub template_dir: PathBuf,
    /// デプロイ先のプロジェクト（namespace）
    pub project_name: String,
    /// `requires` のチェックを省略する
    pub ignore_requires: bool,
    /// 丸ごとデプロイするサービスセット
    pub service_sets_selected: Vec<String>,
    /// CPU/メモリの requests/limits の倍率（0 以下は削除）
    pub resources_scale_factor: f64,
    /// スクリプトフックを探すディレクトリ
    pub root_custom_dir: PathBuf,
    /// 個別に選択したコンポーネント
    pub specific_components: Vec<ComponentRef>,
    /// すべてのオブジェクトに付与する `key=value` ラベル
    pub label: Option<String>,
    /// 除外するコンポーネント
    pub skip: Vec<ComponentRef>,
    /// `Some` ならドライラン
    pub dry_run: Option<DryRunOptions>,
    pub on_wait_failure: OnWaitFailure,
    /// シークレットのインポート元プロジェクト
    pub secrets_project: Option<String>,
    /// シークレットファイルのディレクトリ
    pub secrets_local_dir: Option<PathBuf>,
    /// 準備待ちのポーリング間隔
    pub poll_interval: Duration,
}

impl DeployOptions {
    pub fn new(template_dir: impl Into<PathBuf>, project_name: impl Into<String>) -> Self {
        let template_dir = template_dir.into();
        Self {
            root_custom_dir: template_dir.join("custom"),
            template_dir,
            project_name: project_name.into(),
            ignore_requires: false,
            service_sets_selected: Vec::new(),
            resources_scale_factor: 1.0,
            specific_components: Vec::new(),
            label: None,
            skip: Vec::new(),
            dry_run: None,
            on_wait_failure: OnWaitFailure::default(),
            secrets_project: None,
            secrets_local_dir: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run.is_some()
    }

    /// 丸ごと、または個別指定で選択されているサービスセット
    pub fn sets_for_deploy(&self) -> Vec<String> {
        let mut sets: Vec<String> = Vec::new();
        let picked = self
            .specific_components
            .iter()
            .map(|pick| &pick.service_set);
        for set in self.service_sets_selected.iter().chain(picked) {
            if !sets.contains(set) {
                sets.push(set.clone());
            }
        }
        sets
    }

    /// ステージのコンポーネントのうち、今回デプロイするもの
    ///
    /// 丸ごと選択されたセットはステージの全コンポーネント、それ以外は
    /// 個別指定と一致するものだけを選び、`skip` を除外します。
    pub fn select_components(&self, service_set: &str, stage_components: &[String]) -> Vec<String> {
        let selected: Vec<String> = if self.service_sets_selected.iter().any(|s| s == service_set)
        {
            stage_components.to_vec()
        } else {
            self.specific_components
                .iter()
                .filter(|pick| {
                    pick.service_set == service_set && stage_components.contains(&pick.component)
                })
                .map(|pick| pick.component.clone())
                .collect()
        };

        selected
            .into_iter()
            .filter(|component| {
                !self
                    .skip
                    .iter()
                    .any(|skip| skip.service_set == service_set && &skip.component == component)
            })
            .collect()
    }
}
