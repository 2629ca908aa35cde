//! 環境ファイルの解決
//!
//! 環境ファイルは2つのスコープに置けます。
//!
//! ```text
//! templates/
//! ├── env/
//! │   └── prod.yml          # ベース: global / <set> / <set>/<component> / _cfg
//! └── api/
//!     └── env/
//!         └── prod.yml      # サービスセット: <component> / global / _cfg
//! ```
//!
//! 複数の環境が指定された場合は先に指定された環境が優先されます。

use crate::cfg::merge_cfgs;
use crate::error::{CoreError, Result};
use crate::files::{cfg_files_in_dir, file_stem, load_cfg_tree};
use crate::merge::{ConfigTree, as_tree, merge_trees};
use crate::model::ComponentVariables;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 全サービスセット共通、またはサービスセット内共通の変数を表すキー
pub const GLOBAL_KEY: &str = "global";

/// `_cfg` の上書きブロックを表すキー
pub const CFG_KEY: &str = "_cfg";

/// 環境ディレクトリ名のデフォルト
pub const DEFAULT_ENV_DIR_NAME: &str = "env";

/// 環境データの読み込み元
#[derive(Debug, Clone, PartialEq)]
pub enum EnvSource {
    /// 名前で指定（テンプレートツリーの env ディレクトリから探す）
    Named {
        template_dir: PathBuf,
        env_dir_name: String,
    },
    /// ファイルを直接指定（ファイル名が環境名になる）
    Legacy { files: Vec<PathBuf> },
}

/// サービスセットごとの解決済みデータ（直前の1件だけ保持）
#[derive(Debug, Clone)]
struct SetLayers {
    name: String,
    dir: PathBuf,
    /// 全環境をマージした変数ツリー
    merged: ConfigTree,
    /// 全環境をマージしたサービスセットの `_cfg`
    cfg: ConfigTree,
}

/// 環境ごとの変数と `_cfg` 上書きを解決する
#[derive(Debug)]
pub struct EnvResolver {
    source: EnvSource,
    env_names: Vec<String>,
    /// ベースの環境データ（`env_names` と同じ順序）
    base: Option<Vec<ConfigTree>>,
    last_set: Option<SetLayers>,
}

impl EnvResolver {
    /// 名前で環境を指定
    pub fn named(
        template_dir: impl Into<PathBuf>,
        env_names: Vec<String>,
        env_dir_name: impl Into<String>,
    ) -> Self {
        Self {
            source: EnvSource::Named {
                template_dir: template_dir.into(),
                env_dir_name: env_dir_name.into(),
            },
            env_names: dedup_names(env_names),
            base: None,
            last_set: None,
        }
    }

    /// 環境ファイルを直接指定
    pub fn legacy(files: Vec<PathBuf>) -> Self {
        let env_names = dedup_names(files.iter().map(|path| file_stem(path)).collect());
        Self {
            source: EnvSource::Legacy { files },
            env_names,
            base: None,
            last_set: None,
        }
    }

    /// `--env` の値から適切なモードを選ぶ
    ///
    /// 値がすべて既存ファイルならファイル指定、すべて名前なら名前指定です。
    /// 混在している場合はエラーになります。
    pub fn from_values(
        template_dir: impl Into<PathBuf>,
        values: &[String],
        env_dir_name: impl Into<String>,
    ) -> Result<Self> {
        let file_count = values
            .iter()
            .filter(|value| Path::new(value.as_str()).is_file())
            .count();

        if !values.is_empty() && file_count == values.len() {
            info!("Env files given explicitly, using legacy env processing");
            return Ok(Self::legacy(values.iter().map(PathBuf::from).collect()));
        }
        if file_count > 0 {
            return Err(CoreError::InvalidEnvSelection(
                "--env にはすべてファイルパスか、すべて環境名を指定してください".to_string(),
            ));
        }

        Ok(Self::named(template_dir, values.to_vec(), env_dir_name))
    }

    /// 有効な環境名（優先順）
    pub fn env_names(&self) -> &[String] {
        &self.env_names
    }

    pub fn source(&self) -> &EnvSource {
        &self.source
    }

    /// (サービスセット, コンポーネント) の変数
    ///
    /// コンポーネント > サービスセットの global > ベースの global の順に優先されます。
    pub fn resolve_component(
        &mut self,
        set_dir: &Path,
        set: &str,
        component: &str,
    ) -> Result<ComponentVariables> {
        if self.env_names.is_empty() {
            return Ok(ComponentVariables::default());
        }

        let merged = &self.set_layers(set_dir, set)?.merged;
        let set_data = as_tree(merged.get(set));
        let component_vars = as_tree(set_data.get(component));
        let set_global = as_tree(set_data.get(GLOBAL_KEY));
        let global = as_tree(merged.get(GLOBAL_KEY));

        let variables = merge_trees(set_global, component_vars);
        let variables = merge_trees(global, variables);
        Ok(ComponentVariables::new(variables))
    }

    /// ベーススコープの `_cfg` 上書き
    pub fn base_env_cfg(&mut self) -> Result<ConfigTree> {
        let layers = self.base_layers()?.to_vec();
        combine_cfgs(layers.iter().map(|layer| layer.get(CFG_KEY)))
    }

    /// サービスセットスコープの `_cfg` 上書き
    pub fn service_set_env_cfg(&mut self, set_dir: &Path, set: &str) -> Result<ConfigTree> {
        if self.env_names.is_empty() {
            return Ok(ConfigTree::new());
        }
        Ok(self.set_layers(set_dir, set)?.cfg.clone())
    }

    fn base_layers(&mut self) -> Result<&[ConfigTree]> {
        let layers = match self.base.take() {
            Some(layers) => layers,
            None => self.load_base_layers()?,
        };
        Ok(self.base.insert(layers).as_slice())
    }

    #[tracing::instrument(skip(self))]
    fn load_base_layers(&self) -> Result<Vec<ConfigTree>> {
        let raw = match &self.source {
            EnvSource::Named {
                template_dir,
                env_dir_name,
            } => {
                let raw = load_env_files(&template_dir.join(env_dir_name), &self.env_names)?;
                for (name, data) in self.env_names.iter().zip(&raw) {
                    if data.is_none() {
                        warn!(env = %name, "No base env file found for environment");
                    }
                }
                raw
            }
            EnvSource::Legacy { files } => {
                // 同名の環境は最初のファイルだけを使う
                self.env_names
                    .iter()
                    .map(|name| {
                        files
                            .iter()
                            .find(|path| file_stem(path) == *name)
                            .map(|path| load_cfg_tree(path))
                            .transpose()
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };

        Ok(raw
            .into_iter()
            .map(|data| base_layer(data.unwrap_or_default()))
            .collect())
    }

    fn set_layers(&mut self, set_dir: &Path, set: &str) -> Result<&SetLayers> {
        let layers = match self.last_set.take() {
            Some(layers) if layers.name == set && layers.dir == set_dir => layers,
            _ => self.build_set_layers(set_dir, set)?,
        };
        Ok(&*self.last_set.insert(layers))
    }

    #[tracing::instrument(skip(self, set_dir), fields(set_dir = %set_dir.display()))]
    fn build_set_layers(&mut self, set_dir: &Path, set: &str) -> Result<SetLayers> {
        let set_raw = match &self.source {
            EnvSource::Named { env_dir_name, .. } => {
                load_env_files(&set_dir.join(env_dir_name), &self.env_names)?
            }
            EnvSource::Legacy { .. } => vec![None; self.env_names.len()],
        };
        let base = self.base_layers()?.to_vec();

        // 環境ごとにベースの上へサービスセットのデータを重ねる
        let per_env: Vec<ConfigTree> = base
            .into_iter()
            .zip(set_raw)
            .map(|(base, raw)| merge_trees(base, set_layer(set, raw.unwrap_or_default())))
            .collect();

        let cfg = combine_cfgs(per_env.iter().map(|layer| {
            layer
                .get(set)
                .and_then(|set_data| set_data.get(CFG_KEY))
        }))?;

        // 先に指定された環境が優先される
        let merged = per_env
            .into_iter()
            .fold(ConfigTree::new(), |acc, layer| merge_trees(layer, acc));

        debug!(service_set = %set, envs = self.env_names.len(), "Merged env data for service set");
        Ok(SetLayers {
            name: set.to_string(),
            dir: set_dir.to_path_buf(),
            merged,
            cfg,
        })
    }
}

/// 重複した環境名を除去（最初の出現を残す）
fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if unique.contains(&name) {
            warn!(env = %name, "Duplicate environment name ignored");
        } else {
            unique.push(name);
        }
    }
    unique
}

/// env ディレクトリから各環境のファイルを読み込む（`env_names` と同じ順序）
fn load_env_files(dir: &Path, env_names: &[String]) -> Result<Vec<Option<ConfigTree>>> {
    let files = cfg_files_in_dir(dir);
    env_names
        .iter()
        .map(|name| {
            files
                .iter()
                .find(|path| file_stem(path) == *name)
                .map(|path| {
                    debug!(path = %path.display(), env = %name, "Loading env file");
                    load_cfg_tree(path)
                })
                .transpose()
        })
        .collect()
}

/// ベース環境ファイルを内部構造に変換
///
/// `<set>/<component>` は `{set: {component: ..}}`、`<set>` は
/// `{set: {global: ..}}` に置き換えます。
fn base_layer(raw: ConfigTree) -> ConfigTree {
    let mut layer = ConfigTree::new();
    let mut sets: BTreeMap<String, ConfigTree> = BTreeMap::new();

    for (key, value) in raw {
        if key == GLOBAL_KEY || key == CFG_KEY {
            layer.insert(key, value);
        } else if let Some((set, component)) = key.split_once('/') {
            sets.entry(set.to_string())
                .or_default()
                .insert(component.to_string(), value);
        } else {
            sets.entry(key)
                .or_default()
                .insert(GLOBAL_KEY.to_string(), value);
        }
    }

    for (set, data) in sets {
        layer.insert(set, Value::Object(data));
    }
    layer
}

/// サービスセットの環境ファイルを内部構造に変換
fn set_layer(set: &str, raw: ConfigTree) -> ConfigTree {
    let mut components = ConfigTree::new();
    for (key, value) in raw {
        // `<set>/<component>` と書かれていてもコンポーネント名として扱う
        let component = match key.split_once('/') {
            Some((_, component)) => component.to_string(),
            None => key,
        };
        components.insert(component, value);
    }

    let mut layer = ConfigTree::new();
    layer.insert(set.to_string(), Value::Object(components));
    layer
}

/// 環境ごとの `_cfg` ブロックを優先順にマージ
fn combine_cfgs<'a>(blocks: impl Iterator<Item = Option<&'a Value>>) -> Result<ConfigTree> {
    let mut combined = ConfigTree::new();
    for block in blocks.flatten() {
        let Value::Object(block) = block else {
            return Err(CoreError::InvalidConfig(format!(
                "環境ファイルの '{}' はマッピングである必要があります",
                CFG_KEY
            )));
        };
        combined = merge_cfgs(block.clone(), combined)?;
    }
    Ok(combined)
}
