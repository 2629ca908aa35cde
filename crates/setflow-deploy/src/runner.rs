//! デプロイの実行
//!
//! ベースの `_cfg` のステージ順にサービスセットを、サービスセットの `_cfg` の
//! ステージ順にコンポーネントをデプロイします。ステージは常に1つずつ順番に
//! 処理され、並行に動くのはステージ内の準備待ちだけです。

use crate::error::{DeployError, Result};
use crate::hooks::{DeployContext, HookRegistry, ResolvedHooks, StagePlan};
use crate::images::{ImageImporter, image_stream_configs};
use crate::options::{DeployOptions, OnWaitFailure};
use crate::output::{IMAGESTREAMS_COMPONENT, ProcessedComponent, emit_dry_run};
use crate::secrets::SecretImporter;
use serde_json::Value;
use setflow_cluster::{ClusterClient, ReadinessWaiter, Renderer};
use setflow_core::{
    ComponentVariables, DeployedSetRegistry, EnvResolver, RenderedTemplate, ServiceSetManifest,
    load_manifest_tree, merge_cfgs, templates_in_dir,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// 実行結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// デプロイが完了したサービスセット（完了順）
    pub deployed: Vec<String>,
    /// 処理したコンポーネント（処理順）
    pub processed: Vec<ProcessedComponent>,
}

/// 1回のデプロイ実行
///
/// シークレット/イメージのインポート済み記録とデプロイ済みセットの記録は
/// このインスタンスが持ち、実行をまたいで共有されません。
pub struct DeployRunner {
    options: DeployOptions,
    resolver: EnvResolver,
    cluster: Arc<dyn ClusterClient>,
    renderer: Arc<dyn Renderer>,
    hooks: HookRegistry,
    waiter: ReadinessWaiter,
    registry: DeployedSetRegistry,
    secrets: SecretImporter,
    images: ImageImporter,
}

impl DeployRunner {
    pub fn new(
        options: DeployOptions,
        resolver: EnvResolver,
        cluster: Arc<dyn ClusterClient>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let waiter =
            ReadinessWaiter::new(Arc::clone(&cluster)).with_poll_interval(options.poll_interval);
        let secrets = SecretImporter::new(
            Arc::clone(&cluster),
            options.project_name.clone(),
            options.secrets_project.clone(),
            options.secrets_local_dir.clone(),
        );
        let images = ImageImporter::new(Arc::clone(&cluster));

        Self {
            options,
            resolver,
            cluster,
            renderer,
            hooks: HookRegistry::new(),
            waiter,
            registry: DeployedSetRegistry::new(),
            secrets,
            images,
        }
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// 実行してドライランの結果を標準出力に書き出す
    pub async fn run(self) -> Result<RunReport> {
        let mut stdout = std::io::stdout();
        self.run_with_output(&mut stdout).await
    }

    /// 実行してドライランの結果を `out` に書き出す
    pub async fn run_with_output(mut self, out: &mut (dyn Write + Send)) -> Result<RunReport> {
        info!(
            project = %self.options.project_name,
            dry_run = self.options.is_dry_run(),
            "Starting deploy"
        );
        let template_dir = self.options.template_dir.clone();
        let base_tree = load_manifest_tree(&template_dir)?;
        let base_env_cfg = self.resolver.base_env_cfg()?;
        let base = ServiceSetManifest::from_tree(&merge_cfgs(base_tree, base_env_cfg)?)?;
        let env_names = self.resolver.env_names().to_vec();

        let base_image_streams = image_stream_configs(&base.images, &env_names);
        if !self.options.is_dry_run() {
            self.secrets.import_all(&base.secrets, &env_names).await?;
            self.images.import_all(&base.images, &env_names).await?;
        }

        let sets_for_deploy = self.options.sets_for_deploy();
        if let Some(unknown) = sets_for_deploy.iter().find(|set| !base.lists(set)) {
            return Err(DeployError::UnknownServiceSet(unknown.clone()));
        }

        let mut processed = Vec::new();
        for (stage, spec) in base.stages() {
            info!(stage = %stage, "Entering stage");
            for service_set in &spec.components {
                if !sets_for_deploy.contains(service_set) {
                    info!(service_set = %service_set, "Service set not selected, skipping");
                    continue;
                }
                let set_processed = self
                    .deploy_service_set(service_set, &base_image_streams, &env_names)
                    .await?;
                processed.extend(set_processed);
            }
        }

        if processed.is_empty() {
            return Err(DeployError::NothingSelected);
        }

        if let Some(dry_run) = &self.options.dry_run {
            emit_dry_run(&processed, dry_run, out)?;
        }

        Ok(RunReport {
            deployed: self.registry.into_sets(),
            processed,
        })
    }

    #[instrument(skip(self, base_image_streams, env_names))]
    async fn deploy_service_set(
        &mut self,
        service_set: &str,
        base_image_streams: &[(String, Value)],
        env_names: &[String],
    ) -> Result<Vec<ProcessedComponent>> {
        let set_dir = self.options.template_dir.join(service_set);
        let manifest = self.load_set_manifest(&set_dir, service_set)?;

        if !self.options.ignore_requires {
            if let Some(required) = self.registry.first_missing(&manifest.requires) {
                return Err(DeployError::MissingRequire {
                    service_set: service_set.to_string(),
                    required: required.to_string(),
                });
            }
        }

        let mut processed = Vec::new();
        let hooks = if self.options.is_dry_run() {
            let mut image_streams = base_image_streams.to_vec();
            for (istag, config) in image_stream_configs(&manifest.images, env_names) {
                if !image_streams.iter().any(|(existing, _)| *existing == istag) {
                    image_streams.push((istag, config));
                }
            }
            if !image_streams.is_empty() {
                let items = image_streams.into_iter().map(|(_, config)| config).collect();
                processed.push(ProcessedComponent::new(
                    service_set,
                    IMAGESTREAMS_COMPONENT,
                    RenderedTemplate::from_items(items),
                ));
            }
            ResolvedHooks::dry_run()
        } else {
            self.secrets.import_all(&manifest.secrets, env_names).await?;
            self.images.import_all(&manifest.images, env_names).await?;
            self.hooks.resolve(service_set, &manifest)
        };

        let secrets_project = self.options.secrets_project.clone().unwrap_or_default();
        let mut variables = BTreeMap::new();
        for component in manifest.all_components() {
            let mut resolved: ComponentVariables = self
                .resolver
                .resolve_component(&set_dir, service_set, &component)?;
            resolved.inject(&self.options.project_name, &secrets_project);
            variables.insert(component, resolved);
        }
        let templates = templates_in_dir(&set_dir)?;

        let ctx = DeployContext {
            project: &self.options.project_name,
            service_set,
            set_dir: &set_dir,
            templates: &templates,
            variables: &variables,
            cluster: self.cluster.as_ref(),
            renderer: self.renderer.as_ref(),
            waiter: &self.waiter,
            scale_factor: self.options.resources_scale_factor,
            label: self.options.label.as_deref(),
        };

        if let Some(pre_deploy) = &hooks.pre_deploy {
            info!("Running pre_deploy hook");
            pre_deploy.pre_deploy(&ctx).await?;
        }

        for (stage, spec) in manifest.stages() {
            let components = self.options.select_components(service_set, &spec.components);
            if components.is_empty() {
                info!(stage = %stage, "No components selected in stage, skipping");
                continue;
            }
            if let Some(missing) = components.iter().find(|c| !templates.contains_key(*c)) {
                return Err(DeployError::MissingTemplate {
                    service_set: service_set.to_string(),
                    component: missing.clone(),
                });
            }

            let plan = StagePlan {
                key: stage.clone(),
                components,
                wait: spec.wait,
                timeout: spec.timeout,
            };
            info!(stage = %stage, components = %plan.components.join(", "), "Deploying stage");
            let output = hooks.deploy.deploy(&ctx, &plan).await?;
            processed.extend(
                output
                    .processed
                    .into_iter()
                    .map(|(component, rendered)| {
                        ProcessedComponent::new(service_set, component, rendered)
                    }),
            );

            if self.options.is_dry_run() || !plan.wait || output.wait_targets.is_empty() {
                continue;
            }
            let report = self
                .waiter
                .wait_all(
                    &output.wait_targets,
                    Duration::from_secs(plan.timeout),
                    false,
                )
                .await;
            if !report.all_ready() {
                let targets: Vec<String> =
                    report.failed().iter().map(|target| target.to_string()).collect();
                match self.options.on_wait_failure {
                    OnWaitFailure::Abort => {
                        return Err(DeployError::WaitFailed {
                            service_set: service_set.to_string(),
                            stage: stage.clone(),
                            targets: targets.join(", "),
                        });
                    }
                    OnWaitFailure::Continue => {
                        warn!(
                            stage = %stage,
                            failed = %targets.join(", "),
                            "Resources not ready, continuing"
                        );
                    }
                }
            }
        }

        if let Some(post_deploy) = &hooks.post_deploy {
            info!("Running post_deploy hook");
            post_deploy
                .post_deploy(&ctx, &processed, manifest.post_deploy_timeout)
                .await?;
        }

        info!("Service set deployed");
        self.registry.record(service_set);
        Ok(processed)
    }

    /// サービスセットの `_cfg` に環境の `_cfg` を重ねる
    fn load_set_manifest(&mut self, set_dir: &Path, service_set: &str) -> Result<ServiceSetManifest> {
        let tree = load_manifest_tree(set_dir)?;
        let env_cfg = self.resolver.service_set_env_cfg(set_dir, service_set)?;
        Ok(ServiceSetManifest::from_tree(&merge_cfgs(tree, env_cfg)?)?)
    }
}
