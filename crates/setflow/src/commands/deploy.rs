use super::Selection;
use crate::{SelectionArgs, WaitFailure, scripts, utils};
use colored::Colorize;
use setflow_cluster::{Oc, OcRenderer, ensure_project};
use setflow_config::{DirKind, resolve_dir, validate_label};
use setflow_deploy::{DeployRunner, OnWaitFailure};
use std::path::PathBuf;
use std::sync::Arc;

pub struct DeployArgs {
    pub dst_project: String,
    pub selection: SelectionArgs,
    pub no_confirm: bool,
    pub secrets_local_dir: Option<PathBuf>,
    pub secrets_src_project: String,
    pub ignore_requires: bool,
    pub custom_dir: Option<PathBuf>,
    pub label: Option<String>,
    pub on_wait_failure: WaitFailure,
}

pub async fn handle(args: DeployArgs) -> anyhow::Result<()> {
    if let Some(label) = &args.label {
        validate_label(label)?;
    }
    let selection = Selection::from_args(&args.selection)?;
    let custom_dir = resolve_dir(DirKind::Custom, args.custom_dir.as_deref())?;
    let secrets_dir = resolve_dir(DirKind::Secrets, args.secrets_local_dir.as_deref())?;

    let message = format!(
        "'{}' をプロジェクト '{}' にデプロイします。続行しますか？",
        selection.describe(),
        args.dst_project
    );
    if !args.no_confirm && !utils::confirm(&message)? {
        println!("{}", "中止しました".yellow());
        return Ok(());
    }

    let oc = Oc::new();
    let cluster = utils::cluster_client(&oc);
    ensure_project(cluster.as_ref(), &args.dst_project).await?;

    let (mut options, resolver) = selection.into_parts(&args.dst_project);
    options.ignore_requires = args.ignore_requires;
    options.root_custom_dir = custom_dir;
    options.label = args.label;
    options.secrets_project = Some(args.secrets_src_project).filter(|project| !project.is_empty());
    options.secrets_local_dir = secrets_dir.is_dir().then_some(secrets_dir);
    options.on_wait_failure = match args.on_wait_failure {
        WaitFailure::Abort => OnWaitFailure::Abort,
        WaitFailure::Continue => OnWaitFailure::Continue,
    };

    let hooks = scripts::discover(&options.template_dir, &options.root_custom_dir)?;

    println!("{}", "デプロイを開始します...".blue().bold());
    let report = DeployRunner::new(
        options,
        resolver,
        Arc::clone(&cluster),
        Arc::new(OcRenderer::new(oc)),
    )
    .with_hooks(hooks)
    .run()
    .await?;

    println!();
    println!("{}", "✓ デプロイが完了しました".green().bold());
    for set in &report.deployed {
        println!("  • {}", set.cyan());
    }

    println!();
    super::routes::print_routes(cluster.as_ref(), None).await
}
