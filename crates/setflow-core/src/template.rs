//! テンプレートファイルとレンダリング結果

use crate::error::{CoreError, Result};
use crate::files::{cfg_files_in_dir, file_stem, load_cfg_tree};
use crate::merge::ConfigTree;
use crate::restype::ResourceType;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// `kind: Template` のファイル
///
/// コンポーネント名はファイル名から拡張子を除いたものです。
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub path: PathBuf,
    pub content: ConfigTree,
}

impl Template {
    /// ファイルを読み込み、テンプレートとして妥当か検証する
    pub fn load(path: &Path) -> Result<Self> {
        let content = load_cfg_tree(path)?;

        let is_template = content
            .get("kind")
            .and_then(Value::as_str)
            .map(|kind| kind.eq_ignore_ascii_case("template"))
            .unwrap_or(false);
        if !is_template {
            return Err(CoreError::TemplateError {
                file: path.to_path_buf(),
                message: "kind が 'Template' ではありません".to_string(),
            });
        }
        if !content.contains_key("objects") {
            return Err(CoreError::TemplateError {
                file: path.to_path_buf(),
                message: "'objects' がありません".to_string(),
            });
        }

        Ok(Self {
            name: file_stem(path),
            path: path.to_path_buf(),
            content,
        })
    }

    /// テンプレートが宣言しているパラメータ名
    pub fn parameter_names(&self) -> Vec<String> {
        self.content
            .get("parameters")
            .and_then(Value::as_array)
            .map(|params| {
                params
                    .iter()
                    .filter_map(|param| param.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// ディレクトリ内のテンプレートを名前ごとに読み込む
pub fn templates_in_dir(dir: &Path) -> Result<BTreeMap<String, Template>> {
    cfg_files_in_dir(dir)
        .iter()
        .map(|path| Template::load(path).map(|template| (template.name.clone(), template)))
        .collect()
}

/// レンダラーが返した `List` ドキュメント
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTemplate(Value);

impl RenderedTemplate {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// 空の `List`
    pub fn empty() -> Self {
        Self::from_items(Vec::new())
    }

    /// オブジェクトの配列から `List` を組み立てる
    pub fn from_items(items: Vec<Value>) -> Self {
        Self(serde_json::json!({
            "kind": "List",
            "apiVersion": "v1",
            "metadata": {},
            "items": items,
        }))
    }

    pub fn items(&self) -> &[Value] {
        self.0
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// 指定タイプのトップレベルオブジェクト
    pub fn items_for_restype(&self, restype: ResourceType) -> Vec<&Value> {
        self.items()
            .iter()
            .filter(|item| {
                item.get("kind")
                    .and_then(Value::as_str)
                    .map(|kind| restype.matches_kind(kind))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// 指定タイプのトップレベルオブジェクト名
    pub fn names_for_restype(&self, restype: ResourceType) -> Vec<String> {
        self.items_for_restype(restype)
            .into_iter()
            .filter_map(|item| item.pointer("/metadata/name").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}
