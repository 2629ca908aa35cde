//! secrets セクション

use crate::error::{CoreError, Result};
use crate::merge::ConfigTree;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `secrets` の1エントリ（正規化済み）
///
/// `_cfg` では名前だけの短縮形と、`name`/`link`/`envs` を持つ詳細形の
/// どちらでも書けます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSpec {
    pub name: String,
    /// secret をリンクするサービスアカウント
    #[serde(default)]
    pub link: Vec<String>,
    /// 適用する環境（空ならすべて）
    #[serde(default)]
    pub envs: Vec<String>,
}

impl SecretSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: Vec::new(),
            envs: Vec::new(),
        }
    }
}

/// `_cfg` ツリーから secrets を取り出して正規化
pub fn parse_secrets(tree: &ConfigTree) -> Result<Vec<SecretSpec>> {
    let entries = match tree.get("secrets") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(invalid("リストである必要があります")),
    };

    entries
        .iter()
        .map(|entry| match entry {
            Value::String(name) => Ok(SecretSpec::named(name.clone())),
            Value::Object(fields) => {
                let name = fields
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| invalid("'name' がありません"))?;
                Ok(SecretSpec {
                    name: name.to_string(),
                    link: string_list(fields, "link")?,
                    envs: string_list(fields, "envs")?,
                })
            }
            _ => Err(invalid("エントリは文字列かマッピングである必要があります")),
        })
        .collect()
}

/// `key` に文字列のリストがあれば取り出す
pub(crate) fn string_list(fields: &ConfigTree, key: &str) -> Result<Vec<String>> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    CoreError::InvalidManifest {
                        section: key.to_string(),
                        message: "文字列のリストである必要があります".to_string(),
                    }
                })
            })
            .collect(),
        Some(_) => Err(CoreError::InvalidManifest {
            section: key.to_string(),
            message: "文字列のリストである必要があります".to_string(),
        }),
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::InvalidManifest {
        section: "secrets".to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> ConfigTree {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_short_and_long_form() {
        let cfg = tree(json!({
            "secrets": [
                "plain",
                {"name": "linked", "link": ["builder", "default"], "envs": ["prod"]}
            ]
        }));

        let secrets = parse_secrets(&cfg).unwrap();
        assert_eq!(secrets[0], SecretSpec::named("plain"));
        assert_eq!(secrets[1].name, "linked");
        assert_eq!(secrets[1].link, vec!["builder", "default"]);
        assert_eq!(secrets[1].envs, vec!["prod"]);
    }

    #[test]
    fn test_missing_secrets_section() {
        assert!(parse_secrets(&ConfigTree::new()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_name_is_error() {
        let cfg = tree(json!({"secrets": [{"link": ["builder"]}]}));
        assert!(matches!(
            parse_secrets(&cfg),
            Err(CoreError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_link_must_be_strings() {
        let cfg = tree(json!({"secrets": [{"name": "x", "link": [1, 2]}]}));
        assert!(parse_secrets(&cfg).is_err());
    }

    #[test]
    fn test_wrong_entry_type() {
        let cfg = tree(json!({"secrets": [42]}));
        assert!(parse_secrets(&cfg).is_err());
    }
}
