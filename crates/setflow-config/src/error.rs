use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "ラベル '{0}' が不正です\nヒント: 'mylabel=myvalue' の形式で指定してください"
    )]
    InvalidLabel(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
