//! setflow-deploy
//!
//! ステージ順のデプロイ実行、フック、シークレット/イメージのインポート、
//! ドライラン出力を提供します。

pub mod builds;
pub mod error;
pub mod hooks;
pub mod images;
pub mod options;
pub mod output;
pub mod runner;
pub mod secrets;

pub use builds::trigger_builds;
pub use error::{DeployError, Result};
pub use hooks::{
    DefaultDeploy, DeployContext, DeployHook, DeployHooks, DryRunDeploy, HookRegistry,
    PostDeployHook, PreDeployHook, ResolvedHooks, StageOutput, StagePlan, TriggerBuilds,
};
pub use images::{ImageImporter, image_stream_config, image_stream_configs};
pub use options::{ComponentRef, DeployOptions, DryRunOptions, OnWaitFailure, OutputFormat};
pub use output::{IMAGESTREAMS_COMPONENT, ProcessedComponent, emit_dry_run};
pub use runner::{DeployRunner, RunReport};
pub use secrets::{SecretImporter, load_secrets_dir};
