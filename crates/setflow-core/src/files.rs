//! 設定ファイルの読み込み
//!
//! テンプレート、`_cfg`、環境ファイルはすべて YAML か JSON です。
//! YAML のマッピングキーは文字列に正規化してから [`ConfigTree`] に変換します。

use crate::error::{CoreError, Result};
use crate::merge::ConfigTree;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 設定ファイルとして扱う拡張子
const CFG_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// `_cfg` で始まるファイルはマニフェストとして扱う
const MANIFEST_PREFIX: &str = "_cfg";

/// ディレクトリ内の YAML/JSON ファイルを列挙（`_cfg*` は除外）
///
/// 結果はパス順にソートされます。ディレクトリが無い場合は空です。
pub fn cfg_files_in_dir(dir: &Path) -> Vec<PathBuf> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files = Vec::new();

    for ext in CFG_EXTENSIONS {
        let pattern = format!("{}/*.{}", escaped, ext);
        let Ok(entries) = glob::glob(&pattern) else {
            continue;
        };
        files.extend(entries.filter_map(|entry| entry.ok()).filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| !name.starts_with(MANIFEST_PREFIX))
                .unwrap_or(false)
        }));
    }

    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "Discovered config files");
    files
}

/// ファイル名から拡張子を除いた名前
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// YAML/JSON ファイルを読み込んで値を返す
pub fn load_cfg_file(path: &Path) -> Result<Value> {
    if !path.is_file() {
        return Err(CoreError::IoError {
            path: path.to_path_buf(),
            message: "ファイルが存在しません".to_string(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();

    let value = match ext {
        "yaml" | "yml" => {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(&content).map_err(|source| CoreError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?;
            yaml_to_json(yaml)
        }
        "json" => serde_json::from_str(&content).map_err(|source| CoreError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        _ => return Err(CoreError::UnsupportedFormat(path.to_path_buf())),
    };

    if is_empty_document(&value) {
        return Err(CoreError::EmptyFile(path.to_path_buf()));
    }

    Ok(value)
}

/// トップレベルがマッピングであるファイルを読み込む
pub fn load_cfg_tree(path: &Path) -> Result<ConfigTree> {
    match load_cfg_file(path)? {
        Value::Object(tree) => Ok(tree),
        _ => Err(CoreError::InvalidConfig(format!(
            "'{}' のトップレベルはマッピングである必要があります",
            path.display()
        ))),
    }
}

fn is_empty_document(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// serde_yaml の値を JSON 値に変換する
pub fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => {
            let mut tree = ConfigTree::new();
            for (key, value) in mapping {
                tree.insert(yaml_key_to_string(key), yaml_to_json(value));
            }
            Value::Object(tree)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key_to_string(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => s,
        Yaml::Number(n) => n.to_string(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
