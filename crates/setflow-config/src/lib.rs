pub mod error;

pub use error::*;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// `key=value` 形式のラベル
static LABEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+=\w+$").expect("label pattern is valid"));

/// setflow が参照するディレクトリの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirKind {
    Templates,
    Custom,
    Secrets,
}

impl DirKind {
    /// ディレクトリ名（キャッシュディレクトリ、カレントディレクトリ内の名前）
    pub fn name(&self) -> &'static str {
        match self {
            DirKind::Templates => "templates",
            DirKind::Custom => "custom",
            DirKind::Secrets => "secrets",
        }
    }

    /// 上書き用の環境変数名
    pub fn env_var(&self) -> &'static str {
        match self {
            DirKind::Templates => "SETFLOW_TEMPLATES_DIR",
            DirKind::Custom => "SETFLOW_CUSTOM_DIR",
            DirKind::Secrets => "SETFLOW_SECRETS_DIR",
        }
    }
}

/// setflow のキャッシュディレクトリ（`~/.cache/setflow` など）
pub fn cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("setflow"))
}

/// ディレクトリを決定する
///
/// 以下の優先順位で決定:
/// 1. 明示的な指定（CLI フラグ）
/// 2. 環境変数 `SETFLOW_<KIND>_DIR`
/// 3. キャッシュディレクトリ内の `<kind>`（存在する場合）
/// 4. カレントディレクトリ内の `<kind>`
pub fn resolve_dir(kind: DirKind, explicit: Option<&Path>) -> Result<PathBuf> {
    let current_dir = std::env::current_dir()?;

    // 1. 明示的な指定
    if let Some(path) = explicit {
        return Ok(absolute(&current_dir, path));
    }

    // 2. 環境変数
    if let Ok(value) = std::env::var(kind.env_var()) {
        if !value.is_empty() {
            return Ok(absolute(&current_dir, Path::new(&value)));
        }
    }

    // 3. キャッシュディレクトリ
    if let Some(cached) = cache_dir().map(|dir| dir.join(kind.name())) {
        if cached.is_dir() {
            return Ok(cached);
        }
    }

    // 4. カレントディレクトリ
    Ok(current_dir.join(kind.name()))
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// ラベルが `key=value` 形式か検証
pub fn validate_label(label: &str) -> Result<()> {
    if LABEL_PATTERN.is_match(label) {
        Ok(())
    } else {
        Err(ConfigError::InvalidLabel(label.to_string()))
    }
}
