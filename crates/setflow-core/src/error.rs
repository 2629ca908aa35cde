use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("YAMLパースエラー: {path}\n理由: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("JSONパースエラー: {path}\n理由: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO エラー: {path}\n理由: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("ファイル '{0}' はYAMLまたはJSONである必要があります")]
    UnsupportedFormat(PathBuf),

    #[error("ファイル '{0}' が空です")]
    EmptyFile(PathBuf),

    #[error("設定ファイルが見つかりません: {0}")]
    ManifestNotFound(PathBuf),

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("_cfg の '{section}' セクションが不正です: {message}")]
    InvalidManifest { section: String, message: String },

    #[error("テンプレートエラー: {file}\n理由: {message}")]
    TemplateError { file: PathBuf, message: String },

    #[error("不明なリソースタイプです: {0}")]
    UnknownResourceType(String),

    #[error("環境ファイルの指定が不正です: {0}")]
    InvalidEnvSelection(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
