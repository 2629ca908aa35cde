//! スクリプトフック
//!
//! `custom_deploy_logic: true` のサービスセットでは、次の順に探した最初の
//! ディレクトリにある `pre_deploy` / `deploy` / `post_deploy` スクリプトを
//! フックとして使います（拡張子は任意）。
//!
//! 1. `<template_dir>/<set>/custom/`
//! 2. `<custom_dir>/<set>/`
//! 3. `<custom_dir>/`
//!
//! スクリプトには `SETFLOW_PROJECT`、`SETFLOW_SERVICE_SET`、`SETFLOW_TEMPLATE_DIR`、
//! `SETFLOW_TIMEOUT` が渡され、標準入力にコンテキストの JSON が流れます。
//! `deploy` スクリプトは最後の行に `{"wait_for": ["dc/name"], "processed": {..}}`
//! を出力すると、待機対象と処理結果をエンジンに返せます。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use setflow_cluster::WaitTarget;
use setflow_core::{RenderedTemplate, all_sets};
use setflow_deploy::{
    DeployContext, DeployError, DeployHook, DeployHooks, HookRegistry, PostDeployHook,
    PreDeployHook, ProcessedComponent, StageOutput, StagePlan,
};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

const PRE_DEPLOY: &str = "pre_deploy";
const DEPLOY: &str = "deploy";
const POST_DEPLOY: &str = "post_deploy";

/// 外部スクリプトとして実行するフック
#[derive(Debug, Clone)]
pub struct ScriptHook {
    path: PathBuf,
}

/// `deploy` スクリプトの出力
#[derive(Debug, Default, Deserialize)]
struct DeployScriptOutput {
    #[serde(default)]
    wait_for: Vec<String>,
    #[serde(default)]
    processed: Map<String, Value>,
}

fn hook_error(ctx: &DeployContext<'_>, message: impl Into<String>) -> DeployError {
    DeployError::Hook {
        service_set: ctx.service_set.to_string(),
        message: message.into(),
    }
}

fn variables_json(ctx: &DeployContext<'_>) -> Value {
    Value::Object(
        ctx.variables
            .iter()
            .map(|(component, variables)| (component.clone(), Value::Object(variables.to_tree())))
            .collect(),
    )
}

impl ScriptHook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn run(
        &self,
        ctx: &DeployContext<'_>,
        timeout: Option<u64>,
        input: Value,
    ) -> setflow_deploy::Result<String> {
        info!(script = %self.path.display(), service_set = %ctx.service_set, "Running hook script");

        let mut cmd = Command::new(&self.path);
        cmd.current_dir(ctx.set_dir)
            .env("SETFLOW_PROJECT", ctx.project)
            .env("SETFLOW_SERVICE_SET", ctx.service_set)
            .env("SETFLOW_TEMPLATE_DIR", ctx.set_dir)
            .env(
                "SETFLOW_TIMEOUT",
                timeout.map(|t| t.to_string()).unwrap_or_default(),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|e| {
            hook_error(
                ctx,
                format!("{} を実行できません: {}", self.path.display(), e),
            )
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.to_string().as_bytes()).await?;
            drop(stdin);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(hook_error(
                ctx,
                format!("{} が失敗しました ({})", self.path.display(), output.status),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// スクリプトの標準出力から最後の JSON 行を取り出す
fn parse_deploy_output(stdout: &str) -> Result<StageOutput, String> {
    let Some(line) = stdout
        .lines()
        .map(str::trim)
        .rfind(|line| line.starts_with('{'))
    else {
        return Ok(StageOutput::default());
    };

    let parsed: DeployScriptOutput =
        serde_json::from_str(line).map_err(|e| format!("出力の JSON が不正です: {}", e))?;

    let wait_targets = parsed
        .wait_for
        .iter()
        .map(|target| WaitTarget::parse(target).map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    let processed = parsed
        .processed
        .into_iter()
        .map(|(component, value)| (component, RenderedTemplate::new(value)))
        .collect();

    Ok(StageOutput {
        processed,
        wait_targets,
    })
}

#[async_trait]
impl PreDeployHook for ScriptHook {
    async fn pre_deploy(&self, ctx: &DeployContext<'_>) -> setflow_deploy::Result<()> {
        let input = json!({ "variables": variables_json(ctx) });
        self.run(ctx, None, input).await?;
        Ok(())
    }
}

#[async_trait]
impl DeployHook for ScriptHook {
    async fn deploy(
        &self,
        ctx: &DeployContext<'_>,
        stage: &StagePlan,
    ) -> setflow_deploy::Result<StageOutput> {
        let input = json!({
            "stage": stage.key,
            "components": stage.components,
            "wait": stage.wait,
            "timeout": stage.timeout,
            "variables": variables_json(ctx),
        });
        let stdout = self.run(ctx, Some(stage.timeout), input).await?;
        parse_deploy_output(&stdout).map_err(|message| hook_error(ctx, message))
    }
}

#[async_trait]
impl PostDeployHook for ScriptHook {
    async fn post_deploy(
        &self,
        ctx: &DeployContext<'_>,
        processed: &[ProcessedComponent],
        timeout: u64,
    ) -> setflow_deploy::Result<()> {
        let processed: Map<String, Value> = processed
            .iter()
            .map(|item| (item.component.clone(), item.rendered.as_value().clone()))
            .collect();
        let input = json!({
            "processed": processed,
            "timeout": timeout,
            "variables": variables_json(ctx),
        });
        self.run(ctx, Some(timeout), input).await?;
        Ok(())
    }
}

/// `name` または `name.<ext>` のファイル
fn find_script(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy() == name)
                    .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// ディレクトリ内のフックスクリプト（1つも無ければ `None`）
fn hooks_in_dir(dir: &Path) -> Option<DeployHooks> {
    if !dir.is_dir() {
        return None;
    }

    let script = |name: &str| find_script(dir, name).map(ScriptHook::new);
    let hooks = DeployHooks {
        pre_deploy: script(PRE_DEPLOY).map(|hook| Arc::new(hook) as Arc<dyn PreDeployHook>),
        deploy: script(DEPLOY).map(|hook| Arc::new(hook) as Arc<dyn DeployHook>),
        post_deploy: script(POST_DEPLOY).map(|hook| Arc::new(hook) as Arc<dyn PostDeployHook>),
    };

    if hooks.is_empty() {
        None
    } else {
        debug!(dir = %dir.display(), "Found hook scripts");
        Some(hooks)
    }
}

/// テンプレートツリーとカスタムディレクトリからフックを集める
pub fn discover(template_dir: &Path, custom_dir: &Path) -> anyhow::Result<HookRegistry> {
    let mut registry = HookRegistry::new();

    for set in all_sets(template_dir)? {
        let found = hooks_in_dir(&template_dir.join(&set).join("custom"))
            .or_else(|| hooks_in_dir(&custom_dir.join(&set)));
        if let Some(hooks) = found {
            registry.register(set, hooks);
        }
    }
    if let Some(hooks) = hooks_in_dir(custom_dir) {
        registry.register_default(hooks);
    }

    Ok(registry)
}
