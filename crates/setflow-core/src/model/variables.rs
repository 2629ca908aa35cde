//! コンポーネント変数

use crate::merge::ConfigTree;
use serde_json::Value;

/// テンプレートパラメータを格納する予約キー
pub const PARAMETERS_KEY: &str = "parameters";

/// 1つの (サービスセット, コンポーネント) に解決された変数
///
/// `parameters` はレンダラーに渡す置換パラメータで、それ以外のキーは
/// フックが参照する任意のフラグです。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentVariables {
    parameters: ConfigTree,
    extra: ConfigTree,
}

impl ComponentVariables {
    /// ツリーから作成（`parameters` がマッピングでなければ空として扱う）
    pub fn new(mut tree: ConfigTree) -> Self {
        let parameters = match tree.remove(PARAMETERS_KEY) {
            Some(Value::Object(parameters)) => parameters,
            _ => ConfigTree::new(),
        };
        Self {
            parameters,
            extra: tree,
        }
    }

    /// `NAMESPACE` と `SECRETS_PROJECT` を注入（既存の値は上書き）
    pub fn inject(&mut self, namespace: &str, secrets_project: &str) {
        self.parameters
            .insert("NAMESPACE".to_string(), Value::from(namespace));
        self.parameters
            .insert("SECRETS_PROJECT".to_string(), Value::from(secrets_project));
    }

    pub fn parameters(&self) -> &ConfigTree {
        &self.parameters
    }

    /// パラメータを文字列として取得
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.parameters.get(name).map(value_to_param)
    }

    /// `parameters` 以外のキーの参照
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// 真偽値フラグ（未設定は false）
    pub fn flag(&self, key: &str) -> bool {
        self.extra.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// `parameters` を含む完全なツリー
    pub fn to_tree(&self) -> ConfigTree {
        let mut tree = ConfigTree::new();
        tree.insert(
            PARAMETERS_KEY.to_string(),
            Value::Object(self.parameters.clone()),
        );
        tree.extend(self.extra.clone());
        tree
    }
}

/// テンプレートパラメータとして渡す文字列表現
pub fn value_to_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
