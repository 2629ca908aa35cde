//! `_cfg` ドキュメントのマージ
//!
//! secrets と images は書式を正規化したうえで識別キー単位でマージし、
//! それ以外のキーは通常の [`merge`](crate::merge::merge) で扱います。

use crate::error::{CoreError, Result};
use crate::merge::{ConfigTree, merge_keyed_list, merge_trees};
use crate::model::{parse_images, parse_secrets};
use serde::Serialize;
use serde_json::Value;

/// images エントリの識別キー
pub const IMAGE_KEY: &str = "istag";

/// secrets エントリの識別キー
pub const SECRET_KEY: &str = "name";

/// 2つの `_cfg` ツリーをマージ（`new` 優先）
///
/// 結果には常に正規化済みの `images` と `secrets` リストが含まれます。
pub fn merge_cfgs(old: ConfigTree, new: ConfigTree) -> Result<ConfigTree> {
    let old_images = canonical(&parse_images(&old)?)?;
    let new_images = canonical(&parse_images(&new)?)?;
    let old_secrets = canonical(&parse_secrets(&old)?)?;
    let new_secrets = canonical(&parse_secrets(&new)?)?;

    let mut merged = merge_trees(strip_sections(old), strip_sections(new));
    merged.insert(
        "images".to_string(),
        Value::Array(merge_keyed_list(old_images, new_images, IMAGE_KEY)),
    );
    merged.insert(
        "secrets".to_string(),
        Value::Array(merge_keyed_list(old_secrets, new_secrets, SECRET_KEY)),
    );
    Ok(merged)
}

fn strip_sections(mut tree: ConfigTree) -> ConfigTree {
    tree.remove("images");
    tree.remove("secrets");
    tree
}

fn canonical<T: Serialize>(entries: &[T]) -> Result<Vec<Value>> {
    entries
        .iter()
        .map(|entry| {
            serde_json::to_value(entry).map_err(|e| CoreError::InvalidConfig(e.to_string()))
        })
        .collect()
}
