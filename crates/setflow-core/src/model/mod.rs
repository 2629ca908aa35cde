//! モデル定義
//!
//! setflow で使用されるデータモデルを定義します。
//! 各モデルは機能ごとにモジュールに分離されています。

mod image;
mod manifest;
mod registry;
mod secret;
mod stage;
mod variables;

// Re-exports
pub use image::*;
pub use manifest::*;
pub use registry::*;
pub use secret::*;
pub use stage::*;
pub use variables::*;

/// `envs` 指定が有効な環境に該当するか判定
///
/// 空のリストはすべての環境に適用されます。
pub fn applies_to_envs(envs: &[String], active_envs: &[String]) -> bool {
    envs.is_empty() || envs.iter().any(|env| active_envs.contains(env))
}
