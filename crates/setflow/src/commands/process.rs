use super::Selection;
use crate::{Output, SelectionArgs, utils};
use setflow_cluster::{Oc, OcRenderer};
use setflow_deploy::{DeployRunner, DryRunOptions, OutputFormat};
use std::path::PathBuf;
use std::sync::Arc;

pub async fn handle(
    dst_project: &str,
    args: &SelectionArgs,
    output: Output,
    to_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let selection = Selection::from_args(args)?;
    let (mut options, resolver) = selection.into_parts(dst_project);

    // ドライランでは requires を確認しない
    options.ignore_requires = true;
    options.dry_run = Some(DryRunOptions {
        output: match output {
            Output::Yaml => OutputFormat::Yaml,
            Output::Json => OutputFormat::Json,
        },
        to_dir,
    });

    let oc = Oc::new();
    DeployRunner::new(
        options,
        resolver,
        utils::cluster_client(&oc),
        Arc::new(OcRenderer::new(oc)),
    )
    .run()
    .await?;
    Ok(())
}
