use crate::Output;
use colored::Colorize;
use serde::Serialize;
use setflow_cluster::{ClusterClient, Oc, OcClient};
use std::io::Write;
use std::sync::Arc;

/// y/N で確認する（y 以外はすべて No）
pub fn confirm(message: &str) -> anyhow::Result<bool> {
    print!("{} {} ", message.yellow(), "[y/N]".dimmed());
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// oc をバックエンドにしたクラスタクライアント
pub fn cluster_client(oc: &Oc) -> Arc<dyn ClusterClient> {
    Arc::new(OcClient::new(oc.clone()))
}

/// 値を yaml/json で標準出力に書き出す
pub fn print_as<T: Serialize>(value: &T, output: Output) -> anyhow::Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Output::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
