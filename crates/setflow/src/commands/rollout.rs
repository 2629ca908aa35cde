use crate::utils;
use anyhow::bail;
use colored::Colorize;
use setflow_cluster::{Oc, ReadinessWaiter, WaitOutcome, rollout};
use std::sync::Arc;
use std::time::Duration;

pub async fn handle(
    deployment_config: &str,
    project: Option<&str>,
    timeout: u64,
) -> anyhow::Result<()> {
    let cluster = utils::cluster_client(&Oc::new());
    if let Some(project) = project {
        cluster.switch_project(project).await?;
    }

    let waiter = ReadinessWaiter::new(Arc::clone(&cluster));
    let outcome = rollout(
        cluster.as_ref(),
        &waiter,
        deployment_config,
        Duration::from_secs(timeout),
    )
    .await?;

    match outcome {
        WaitOutcome::Ready => {
            println!(
                "{} {}",
                "✓ ロールアウトが完了しました:".green(),
                deployment_config.cyan()
            );
            Ok(())
        }
        WaitOutcome::TimedOut => bail!(
            "'{}' のロールアウトが {} 秒以内に完了しませんでした",
            deployment_config,
            timeout
        ),
        WaitOutcome::Failed(reason) => bail!(
            "'{}' のロールアウトに失敗しました: {}",
            deployment_config,
            reason
        ),
        WaitOutcome::Abandoned => bail!("'{}' の待機が中断されました", deployment_config),
    }
}
