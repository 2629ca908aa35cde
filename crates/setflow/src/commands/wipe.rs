use crate::utils;
use colored::Colorize;
use setflow_cluster::{Oc, ensure_project};
use setflow_config::validate_label;

pub async fn handle(project: &str, no_confirm: bool, label: Option<&str>) -> anyhow::Result<()> {
    if let Some(label) = label {
        validate_label(label)?;
    }

    let scope = label
        .map(|label| format!("（ラベル '{}'）", label))
        .unwrap_or_default();
    let message = format!(
        "プロジェクト '{}' のリソースをすべて削除します{}。続行しますか？",
        project, scope
    );
    if !no_confirm && !utils::confirm(&message)? {
        println!("{}", "中止しました".yellow());
        return Ok(());
    }

    let cluster = utils::cluster_client(&Oc::new());
    ensure_project(cluster.as_ref(), project).await?;

    println!("{}", "削除中...".yellow());
    cluster.delete_all(project, label).await?;
    println!("{}", "✓ 削除しました".green());
    Ok(())
}
