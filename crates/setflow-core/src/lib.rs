//! setflow のコア機能
//!
//! 設定ツリーのマージ、`_cfg` マニフェストの解釈、環境ファイルの解決、
//! テンプレートツリーの探索を提供します。クラスタとの通信は行いません。

pub mod cfg;
pub mod discovery;
pub mod env;
pub mod error;
pub mod files;
pub mod merge;
pub mod model;
pub mod restype;
pub mod template;

pub use cfg::merge_cfgs;
pub use discovery::{all_sets, load_manifest_tree, manifest_path};
pub use env::{DEFAULT_ENV_DIR_NAME, EnvResolver, EnvSource};
pub use error::{CoreError, Result};
pub use merge::{ConfigTree, merge, merge_keyed_list, merge_trees};
pub use model::*;
pub use restype::ResourceType;
pub use template::{RenderedTemplate, Template, templates_in_dir};
