//! images セクション

use crate::error::{CoreError, Result};
use crate::merge::ConfigTree;
use crate::model::secret::string_list;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 長い形式で予約されているキー
const LONG_FORM_KEYS: &[&str] = &["istag", "from", "envs", "scheduled"];

/// `images` の1エントリ（正規化済み）
///
/// 3種類の書き方をすべてこの形に揃えます:
///
/// ```yaml
/// # 旧形式
/// images:
///   app: "quay.io/org/app:1.0"
/// # 新形式（短縮）
/// images:
///   - "app:1.0": "quay.io/org/app:1.0"
/// # 新形式（詳細）
/// images:
///   - istag: "app:1.0"
///     from: "quay.io/org/app:1.0"
///     envs: ["prod"]
///     scheduled: false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub istag: String,
    pub from: String,
    #[serde(default)]
    pub envs: Vec<String>,
    #[serde(default = "default_scheduled")]
    pub scheduled: bool,
}

fn default_scheduled() -> bool {
    true
}

impl ImageSpec {
    pub fn new(istag: &str, from: impl Into<String>) -> Self {
        Self {
            istag: normalize_istag(istag),
            from: from.into(),
            envs: Vec::new(),
            scheduled: true,
        }
    }

    /// (イメージストリーム名, タグ)
    pub fn split_istag(&self) -> (&str, &str) {
        self.istag
            .split_once(':')
            .unwrap_or((self.istag.as_str(), "latest"))
    }
}

/// タグの無い istag に `:latest` を付与
pub fn normalize_istag(istag: &str) -> String {
    if istag.contains(':') {
        istag.to_string()
    } else {
        format!("{}:latest", istag)
    }
}

/// `_cfg` ツリーから images を取り出して正規化
pub fn parse_images(tree: &ConfigTree) -> Result<Vec<ImageSpec>> {
    match tree.get("images") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(old_style)) => parse_old_style(old_style),
        Some(Value::Array(entries)) => entries.iter().map(parse_new_style).collect(),
        Some(_) => Err(invalid(
            "マッピングまたはリストである必要があります",
        )),
    }
}

fn parse_old_style(images: &ConfigTree) -> Result<Vec<ImageSpec>> {
    images
        .iter()
        .map(|(istag, from)| {
            let from = from
                .as_str()
                .ok_or_else(|| invalid("キーと値は文字列である必要があります"))?;
            Ok(ImageSpec::new(istag, from))
        })
        .collect()
}

fn parse_new_style(entry: &Value) -> Result<ImageSpec> {
    let fields = entry
        .as_object()
        .ok_or_else(|| invalid("エントリはマッピングである必要があります"))?;

    if fields.contains_key("istag") && fields.contains_key("from") {
        let istag = fields
            .get("istag")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("'istag' は文字列である必要があります"))?;
        let from = fields
            .get("from")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("'from' は文字列である必要があります"))?;
        let scheduled = match fields.get("scheduled") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(scheduled)) => *scheduled,
            Some(_) => return Err(invalid("'scheduled' は真偽値である必要があります")),
        };

        return Ok(ImageSpec {
            istag: normalize_istag(istag),
            from: from.to_string(),
            envs: string_list(fields, "envs")?,
            scheduled,
        });
    }

    if fields.len() == 1 && !LONG_FORM_KEYS.iter().any(|key| fields.contains_key(*key)) {
        if let Some((istag, from)) = fields.iter().next() {
            let from = from
                .as_str()
                .ok_or_else(|| invalid("'from' は文字列である必要があります"))?;
            return Ok(ImageSpec::new(istag, from));
        }
    }

    Err(invalid("不明な書式です"))
}

fn invalid(message: &str) -> CoreError {
    CoreError::InvalidManifest {
        section: "images".to_string(),
        message: message.to_string(),
    }
}
