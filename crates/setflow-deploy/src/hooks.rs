//! デプロイフック
//!
//! サービスセットのデプロイは `pre_deploy` / `deploy` / `post_deploy` の
//! 3つの差し替え可能な処理で構成されます。独自処理はホスト側が
//! [`HookRegistry`] にサービスセット名で登録し、エンジンはマニフェストの
//! `custom_deploy_logic` / `trigger_builds` に応じて解決した関数だけを呼び出します。

use crate::builds::trigger_builds;
use crate::error::{DeployError, Result};
use crate::output::ProcessedComponent;
use async_trait::async_trait;
use setflow_cluster::{ClusterClient, ReadinessWaiter, Renderer, WaitTarget};
use setflow_core::{
    ComponentVariables, DEFAULT_STAGE_TIMEOUT, RenderedTemplate, ResourceType, ServiceSetManifest,
    Template,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 準備待ちの対象になるリソースタイプ
const WAITABLE_TYPES: &[ResourceType] = &[
    ResourceType::Deployment,
    ResourceType::DeploymentConfig,
    ResourceType::StatefulSet,
    ResourceType::DaemonSet,
];

/// フックに渡すサービスセット単位のコンテキスト
pub struct DeployContext<'a> {
    pub project: &'a str,
    pub service_set: &'a str,
    pub set_dir: &'a Path,
    /// サービスセットのテンプレート（コンポーネント名 → テンプレート）
    pub templates: &'a BTreeMap<String, Template>,
    /// 解決済みのコンポーネント変数
    pub variables: &'a BTreeMap<String, ComponentVariables>,
    pub cluster: &'a dyn ClusterClient,
    pub renderer: &'a dyn Renderer,
    pub waiter: &'a ReadinessWaiter,
    pub scale_factor: f64,
    pub label: Option<&'a str>,
}

impl DeployContext<'_> {
    /// コンポーネントの変数（未解決なら空）
    pub fn variables_for(&self, component: &str) -> ComponentVariables {
        self.variables.get(component).cloned().unwrap_or_default()
    }

    /// コンポーネントをレンダリングする
    ///
    /// 結果が空の場合は `None` を返します。
    pub async fn render(&self, component: &str) -> Result<Option<RenderedTemplate>> {
        let template =
            self.templates
                .get(component)
                .ok_or_else(|| DeployError::MissingTemplate {
                    service_set: self.service_set.to_string(),
                    component: component.to_string(),
                })?;
        let variables = self.variables_for(component);

        let rendered = self
            .renderer
            .render(template, &variables, self.scale_factor, self.label)
            .await?;

        if rendered.is_empty() {
            info!(
                service_set = %self.service_set,
                component = %component,
                "Template rendered no objects, skipping"
            );
            return Ok(None);
        }
        Ok(Some(rendered))
    }
}

/// 1ステージ分のデプロイ対象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    pub key: String,
    pub components: Vec<String>,
    pub wait: bool,
    /// 秒
    pub timeout: u64,
}

/// `deploy` フックの結果
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    /// (コンポーネント名, レンダリング結果)
    pub processed: Vec<(String, RenderedTemplate)>,
    /// ステージの `wait` が有効なときに待機する対象
    pub wait_targets: Vec<WaitTarget>,
}

#[async_trait]
pub trait PreDeployHook: Send + Sync {
    async fn pre_deploy(&self, ctx: &DeployContext<'_>) -> Result<()>;
}

#[async_trait]
pub trait DeployHook: Send + Sync {
    async fn deploy(&self, ctx: &DeployContext<'_>, stage: &StagePlan) -> Result<StageOutput>;
}

#[async_trait]
pub trait PostDeployHook: Send + Sync {
    /// `processed` はこのサービスセットで処理した全コンポーネント
    async fn post_deploy(
        &self,
        ctx: &DeployContext<'_>,
        processed: &[ProcessedComponent],
        timeout: u64,
    ) -> Result<()>;
}

/// レンダリングして適用し、待機対象を集める標準の処理
///
/// ビルド設定が含まれる場合は保留中のビルドを取り消して新しいビルドを開始し、
/// そのビルドも待機対象にします。ビルドを post_deploy の [`TriggerBuilds`] に
/// 任せる場合は [`DefaultDeploy::deferring_builds`] を使います。
#[derive(Debug, Clone, Copy)]
pub struct DefaultDeploy {
    start_builds: bool,
}

impl DefaultDeploy {
    pub fn new() -> Self {
        Self { start_builds: true }
    }

    /// ビルドを開始しない（適用のみ）
    pub fn deferring_builds() -> Self {
        Self {
            start_builds: false,
        }
    }
}

impl Default for DefaultDeploy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeployHook for DefaultDeploy {
    async fn deploy(&self, ctx: &DeployContext<'_>, stage: &StagePlan) -> Result<StageOutput> {
        let mut output = StageOutput::default();

        for component in &stage.components {
            let Some(rendered) = ctx.render(component).await? else {
                continue;
            };

            info!(
                service_set = %ctx.service_set,
                component = %component,
                stage = %stage.key,
                "Applying component"
            );
            ctx.cluster.apply(rendered.as_value(), ctx.project).await?;

            for restype in WAITABLE_TYPES {
                output.wait_targets.extend(
                    rendered
                        .names_for_restype(*restype)
                        .into_iter()
                        .map(|name| WaitTarget::new(*restype, name)),
                );
            }
            if self.start_builds {
                let build_configs = rendered.names_for_restype(ResourceType::BuildConfig);
                output
                    .wait_targets
                    .extend(trigger_builds(ctx.cluster, &build_configs).await?);
            }

            output.processed.push((component.clone(), rendered));
        }

        Ok(output)
    }
}

/// レンダリングのみ行うドライラン用の処理
pub struct DryRunDeploy;

#[async_trait]
impl DeployHook for DryRunDeploy {
    async fn deploy(&self, ctx: &DeployContext<'_>, stage: &StagePlan) -> Result<StageOutput> {
        let mut output = StageOutput::default();
        for component in &stage.components {
            if let Some(rendered) = ctx.render(component).await? {
                debug!(service_set = %ctx.service_set, component = %component, "Rendered component");
                output.processed.push((component.clone(), rendered));
            }
        }
        Ok(output)
    }
}

/// `trigger_builds: true` のセットで使う post_deploy
///
/// セットがレンダリングしたビルド設定を再トリガーし、ビルドの完了を待ちます。
pub struct TriggerBuilds;

#[async_trait]
impl PostDeployHook for TriggerBuilds {
    async fn post_deploy(
        &self,
        ctx: &DeployContext<'_>,
        processed: &[ProcessedComponent],
        timeout: u64,
    ) -> Result<()> {
        let build_configs: Vec<String> = processed
            .iter()
            .flat_map(|item| item.rendered.names_for_restype(ResourceType::BuildConfig))
            .collect();
        if build_configs.is_empty() {
            debug!(service_set = %ctx.service_set, "No build configs to trigger");
            return Ok(());
        }

        let builds = trigger_builds(ctx.cluster, &build_configs).await?;
        let timeout = if timeout == 0 {
            DEFAULT_STAGE_TIMEOUT
        } else {
            timeout
        };
        let report = ctx
            .waiter
            .wait_all(&builds, Duration::from_secs(timeout), true)
            .await;

        if !report.all_ready() {
            let targets: Vec<String> = report.failed().iter().map(|t| t.to_string()).collect();
            return Err(DeployError::WaitFailed {
                service_set: ctx.service_set.to_string(),
                stage: "post_deploy".to_string(),
                targets: targets.join(", "),
            });
        }
        Ok(())
    }
}

/// ホストが提供するフックの組（未設定の関数は標準の動作）
#[derive(Clone, Default)]
pub struct DeployHooks {
    pub pre_deploy: Option<Arc<dyn PreDeployHook>>,
    pub deploy: Option<Arc<dyn DeployHook>>,
    pub post_deploy: Option<Arc<dyn PostDeployHook>>,
}

impl DeployHooks {
    pub fn is_empty(&self) -> bool {
        self.pre_deploy.is_none() && self.deploy.is_none() && self.post_deploy.is_none()
    }
}

/// 実際に呼び出すフック
#[derive(Clone)]
pub struct ResolvedHooks {
    pub pre_deploy: Option<Arc<dyn PreDeployHook>>,
    pub deploy: Arc<dyn DeployHook>,
    pub post_deploy: Option<Arc<dyn PostDeployHook>>,
}

impl ResolvedHooks {
    /// 標準の処理のみ
    pub fn builtin() -> Self {
        Self {
            pre_deploy: None,
            deploy: Arc::new(DefaultDeploy::new()),
            post_deploy: None,
        }
    }

    /// ドライラン（pre/post は呼ばない）
    pub fn dry_run() -> Self {
        Self {
            pre_deploy: None,
            deploy: Arc::new(DryRunDeploy),
            post_deploy: None,
        }
    }
}

/// サービスセット名をキーにしたフックの登録先
#[derive(Clone, Default)]
pub struct HookRegistry {
    by_set: HashMap<String, DeployHooks>,
    fallback: Option<DeployHooks>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// サービスセット専用のフックを登録
    pub fn register(&mut self, service_set: impl Into<String>, hooks: DeployHooks) {
        self.by_set.insert(service_set.into(), hooks);
    }

    /// 専用のフックが無いセットで使うフックを登録
    pub fn register_default(&mut self, hooks: DeployHooks) {
        self.fallback = Some(hooks);
    }

    /// 登録済みのフック（セット専用 → 共通の順）
    pub fn lookup(&self, service_set: &str) -> Option<&DeployHooks> {
        self.by_set.get(service_set).or(self.fallback.as_ref())
    }

    /// マニフェストのフラグから呼び出すフックを決める
    pub fn resolve(&self, service_set: &str, manifest: &ServiceSetManifest) -> ResolvedHooks {
        let mut resolved = ResolvedHooks::builtin();
        let mut custom_deploy = false;

        if manifest.custom_deploy_logic {
            match self.lookup(service_set) {
                Some(hooks) => {
                    info!(service_set = %service_set, "Using custom deploy logic");
                    resolved.pre_deploy = hooks.pre_deploy.clone();
                    if let Some(deploy) = &hooks.deploy {
                        resolved.deploy = Arc::clone(deploy);
                        custom_deploy = true;
                    }
                    resolved.post_deploy = hooks.post_deploy.clone();
                }
                None => {
                    warn!(
                        service_set = %service_set,
                        "custom_deploy_logic is set but no hooks were found, using defaults"
                    );
                }
            }
        }

        if manifest.trigger_builds && resolved.post_deploy.is_none() {
            resolved.post_deploy = Some(Arc::new(TriggerBuilds));
            // ビルドは post_deploy で1回だけ開始する
            if !custom_deploy {
                resolved.deploy = Arc::new(DefaultDeploy::deferring_builds());
            }
        }

        resolved
    }
}
