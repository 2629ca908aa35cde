//! ビルドの再トリガー

use crate::error::Result;
use setflow_cluster::{ClusterClient, WaitTarget};
use setflow_core::ResourceType;
use tracing::info;

/// 保留中のビルドを取り消してから新しいビルドを開始する
///
/// 開始したビルドを待機対象として返します。
pub async fn trigger_builds(
    client: &dyn ClusterClient,
    build_configs: &[String],
) -> Result<Vec<WaitTarget>> {
    let mut builds = Vec::with_capacity(build_configs.len());
    for build_config in build_configs {
        client.cancel_build(build_config).await?;
        let build = client.start_build(build_config).await?;
        info!(build_config = %build_config, build = %build, "Started build");
        builds.push(WaitTarget::new(ResourceType::Build, build));
    }
    Ok(builds)
}
