//! 設定ツリーのディープマージ
//!
//! すべての設定レイヤー（環境、サービスセット、secrets/images）は
//! ここで定義する非対称マージの組み合わせで構成されます。
//!
//! - 両方がマッピング: 再帰的にマージ
//! - 両方がリスト: `old` の要素を先頭に連結（重複は除去しない）
//! - それ以外: `new` にキーがあれば `new` の値を採用し、無ければ `old` の値で埋める

use serde_json::{Map, Value};

/// 任意にネストしたキー/値の設定ツリー
pub type ConfigTree = Map<String, Value>;

/// 二つの値をマージして結果を返す
///
/// `new` が優先され、`old` は `new` に存在しないキーだけを補います。
pub fn merge(old: Value, new: Value) -> Value {
    match (old, new) {
        (Value::Object(old), Value::Object(new)) => Value::Object(merge_trees(old, new)),
        (Value::Array(mut old), Value::Array(new)) => {
            old.extend(new);
            Value::Array(old)
        }
        (_, new) => new,
    }
}

/// マッピング同士のマージ
///
/// `new` のキー順を保ったまま、`old` にしか無いキーを末尾に追加します。
pub fn merge_trees(old: ConfigTree, mut new: ConfigTree) -> ConfigTree {
    for (key, old_value) in old {
        match new.get_mut(&key) {
            Some(new_value) => {
                let current = std::mem::take(new_value);
                *new_value = merge(old_value, current);
            }
            None => {
                new.insert(key, old_value);
            }
        }
    }
    new
}

/// 識別キーでマッピングのリストをマージ
///
/// 同じ `key` の値を持つ要素同士は [`merge`] で結合され（`new` 優先）、
/// 対応する要素が無い `old` の要素は元の順序のまま末尾に追加されます。
pub fn merge_keyed_list(old: Vec<Value>, mut new: Vec<Value>, key: &str) -> Vec<Value> {
    let mut unmatched = Vec::new();

    for old_item in old {
        let identity = old_item.get(key).cloned();
        let slot = identity
            .as_ref()
            .and_then(|id| new.iter_mut().find(|item| item.get(key) == Some(id)));

        match slot {
            Some(slot) => {
                let current = std::mem::take(slot);
                *slot = merge(old_item, current);
            }
            None => unmatched.push(old_item),
        }
    }

    new.extend(unmatched);
    new
}

/// 値をツリーとして取り出す（マッピング以外は空ツリー）
pub fn as_tree(value: Option<&Value>) -> ConfigTree {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => ConfigTree::new(),
    }
}
