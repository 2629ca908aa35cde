//! デプロイエラー型

use setflow_cluster::ClusterError;
use setflow_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("サービスセット '{service_set}' は '{required}' のデプロイを必要としています")]
    MissingRequire {
        service_set: String,
        required: String,
    },

    #[error("サービスセット '{0}' はベースの _cfg の deploy_order にありません")]
    UnknownServiceSet(String),

    #[error("サービスセット '{service_set}' にコンポーネント '{component}' のテンプレートがありません")]
    MissingTemplate {
        service_set: String,
        component: String,
    },

    #[error("'{0}' の形式が不正です。'service_set/component' の形式で指定してください")]
    InvalidComponentRef(String),

    #[error("選択したサービスセット/コンポーネントの組み合わせに一致するものがありません")]
    NothingSelected,

    #[error("サービスセット '{service_set}' のステージ '{stage}' で準備が完了しませんでした: {targets}")]
    WaitFailed {
        service_set: String,
        stage: String,
        targets: String,
    },

    #[error("サービスセット '{service_set}' のフックが失敗しました: {message}")]
    Hook {
        service_set: String,
        message: String,
    },

    #[error("シークレット '{0}' がクラスタに存在せず、インポート元も設定されていません")]
    SecretMissing(String),

    #[error("シークレット '{name}' がプロジェクト '{project}' に見つかりません")]
    SecretNotInProject { name: String, project: String },

    #[error("シークレットファイルが不正です: {path}\n理由: {message}")]
    InvalidSecretFile { path: PathBuf, message: String },

    #[error("シークレット '{0}' が複数のファイルで定義されています")]
    DuplicateSecret(String),

    #[error("出力のシリアライズに失敗しました: {0}")]
    Serialize(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeployError>;
