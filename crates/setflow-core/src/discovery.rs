//! テンプレートツリー内のマニフェストとサービスセットの探索

use crate::error::{CoreError, Result};
use crate::files::load_cfg_tree;
use crate::merge::ConfigTree;
use std::path::{Path, PathBuf};
use tracing::debug;

/// マニフェストとして認識するファイル名（優先順）
const MANIFEST_FILES: &[&str] = &["_cfg.yml", "_cfg.yaml", "_cfg.json"];

/// ディレクトリ内のマニフェストファイルのパス
pub fn manifest_path(dir: &Path) -> Option<PathBuf> {
    MANIFEST_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// ディレクトリのマニフェストを読み込む
pub fn load_manifest_tree(dir: &Path) -> Result<ConfigTree> {
    let path = manifest_path(dir).ok_or_else(|| CoreError::ManifestNotFound(dir.to_path_buf()))?;
    debug!(path = %path.display(), "Loading manifest");
    load_cfg_tree(&path)
}

/// テンプレートルート直下でマニフェストを持つディレクトリ名（ソート済み）
pub fn all_sets(template_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(template_dir).map_err(|e| CoreError::IoError {
        path: template_dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut sets: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && manifest_path(path).is_some())
        .filter_map(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_string())
        })
        .collect();

    sets.sort();
    Ok(sets)
}
