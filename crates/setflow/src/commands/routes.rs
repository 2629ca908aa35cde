use crate::{Output, utils};
use colored::Colorize;
use serde_json::{Map, Value};
use setflow_cluster::{ClusterClient, Oc, ensure_project};

/// 最小の名前列の幅
const MIN_NAME_WIDTH: usize = 10;

pub async fn handle(project: &str, output: Option<Output>) -> anyhow::Result<()> {
    let cluster = utils::cluster_client(&Oc::new());
    ensure_project(cluster.as_ref(), project).await?;
    print_routes(cluster.as_ref(), output).await
}

/// 現在のプロジェクトのルートを表示
pub async fn print_routes(
    cluster: &dyn ClusterClient,
    output: Option<Output>,
) -> anyhow::Result<()> {
    let routes = cluster.list_routes().await?;

    let Some(output) = output else {
        println!("{}", "ルート一覧:".bold());
        let width = routes
            .iter()
            .map(|route| route.name.len())
            .max()
            .unwrap_or(0)
            .max(MIN_NAME_WIDTH);
        for route in &routes {
            let name = format!("{:<width$}", route.name, width = width);
            println!("  {} {}", name.cyan(), route.host);
        }
        return Ok(());
    };

    let by_name: Map<String, Value> = routes
        .into_iter()
        .map(|route| (route.name, Value::String(route.host)))
        .collect();
    utils::print_as(&by_name, output)
}
